//! Cadence Motion
//!
//! The time-driven engine of Cadence. Every motion is a [`Moveable`] advanced by
//! beats from a [`cadence_core::Tempo`], usually through a [`MotionScheduler`].
//!
//! # Features
//!
//! - **Motions**: duration-based tweens with easing, delay, reversal, repeats
//! - **Additive Blending**: overlapping motions on one property sum their deltas
//! - **Composition**: parallel groups and serial sequences, contiguous reversal
//! - **Paths**: arc-length sampling along lines and Bézier curves, lookup tables
//! - **Physics**: friction-decayed velocity with collision bounds and restitution
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{into_target, Animatable, PropertyData, PropertyValue, ValueStore};
//! use cadence_motion::{Easing, Motion, MotionScheduler};
//!
//! let target = into_target(ValueStore::new().with("opacity", PropertyValue::scalar(0.0)));
//! let fade = Motion::new(&target, vec![PropertyData::from_to("opacity", 0.0, 1.0)], 0.5, Easing::EaseInOut);
//!
//! let mut scheduler = MotionScheduler::new();
//! let id = scheduler.add(fade);
//! scheduler.start(id);
//! scheduler.tick(0.0);
//! scheduler.tick(0.5);
//!
//! assert_eq!(target.borrow().value("opacity"), Some(PropertyValue::scalar(1.0)));
//! ```

pub mod additive;
pub mod easing;
pub mod group;
pub mod motion;
pub mod moveable;
pub mod path;
pub mod path_motion;
pub mod physics;
pub mod scheduler;
pub mod sequence;

pub use additive::{Additive, AdditiveKey, AdditiveRegistration, AdditiveRegistry};
pub use easing::Easing;
pub use group::Group;
pub use motion::Motion;
pub use moveable::{Moveable, StatusEvents};
pub use path::{EdgeBehavior, Path, PathBuilder, PathElement, PathError, PathState, Point};
pub use path_motion::{PathMotion, PathPhysicsMotion};
pub use physics::{friction_decay, PhysicsConfiguration, PhysicsMotion, PhysicsSystem};
pub use scheduler::{MotionScheduler, MoveableId};
pub use sequence::{ReversingMode, Sequence};

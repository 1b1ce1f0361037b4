//! Cadence Core
//!
//! This crate provides the host-facing primitives of the Cadence motion engine:
//!
//! - **Value Model**: `PropertyValue` and the `Animatable` capability for host objects
//! - **Property Data**: per-component interpolation units and their state descriptors
//! - **Value Assistants**: conversion between host properties and scalar components
//! - **Tempo**: the periodic clock abstraction that drives every motion
//! - **Events**: lifecycle events, listener lists, and the status channel
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{into_target, PropertyState, PropertyValue, StructuredAssistant, ValueAssistant, ValueStore};
//!
//! let store = into_target(ValueStore::new().with("position", PropertyValue::point(0.0, 0.0)));
//!
//! let assistant = StructuredAssistant::new();
//! let state = PropertyState::new("position", PropertyValue::point(100.0, 50.0));
//! let properties = assistant.generate_properties(&store, &state).unwrap();
//!
//! assert_eq!(properties.len(), 2);
//! assert_eq!(properties[0].path(), "position.x");
//! assert_eq!(properties[1].end(), 50.0);
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod events;
pub mod property;
pub mod state;
pub mod tempo;
pub mod value;

pub use assistant::{AssistantGroup, StructuredAssistant, ValueAssistant};
pub use config::{EngineConfig, MotionConfig, PathConfig, PhysicsConfig, TempoConfig};
pub use error::{ConfigError, ValueError};
pub use events::{EventKind, EventListeners, EventQueue, MotionEvent};
pub use property::{PropertyData, PropertyObserver, PropertyState};
pub use state::{MotionDirection, MotionOptions, MotionState, REPEAT_INFINITE};
pub use tempo::{ManualTempo, SharedDelegate, Tempo, TempoDelegate, TimerTempo};
pub use value::{into_target, same_target, Animatable, PropertyValue, Target, ValueKind, ValueStore, WeakTarget};

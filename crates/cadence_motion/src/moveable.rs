//! The `Moveable` capability shared by every motion kind

use crate::additive::AdditiveRegistry;
use cadence_core::{EngineConfig, MotionDirection, MotionEvent, MotionState};
use smallvec::SmallVec;

/// Drained status events
pub type StatusEvents = SmallVec<[MotionEvent; 4]>;

/// A controllable, tick-driven motion
///
/// Control calls never take a timestamp. A moveable picks up its start time from the
/// first `update` after `start()`, and measures pauses between beats.
pub trait Moveable {
    /// Begin playing. A no-op unless the state is `Stopped`.
    fn start(&mut self);

    /// Begin playing with `timestamp` as the start time instead of the next beat.
    ///
    /// Collections use this to re-arm a child on the instant a phase ended, so the
    /// time already past that instant is not lost.
    fn start_at(&mut self, _timestamp: f64) {
        self.start();
    }

    /// Stop immediately. Idempotent.
    fn stop(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Return to `Stopped` with configured orientation and no progress.
    ///
    /// Does not write to any target.
    fn reset(&mut self);

    /// Advance to `timestamp` (seconds)
    fn update(&mut self, timestamp: f64);

    fn motion_state(&self) -> MotionState;

    /// Cumulative progress across every reverse and repeat cycle, in 0..=1
    fn total_progress(&self) -> f64;

    fn reverses(&self) -> bool;

    fn set_reverses(&mut self, reverses: bool);

    fn repeats(&self) -> bool;

    fn set_repeats(&mut self, repeats: bool);

    /// Direction used by the next `start()`
    fn set_direction(&mut self, direction: MotionDirection);

    /// Attach the additive registry used by additive motions
    fn bind_registry(&mut self, _registry: &AdditiveRegistry) {}

    /// Apply engine defaults to every setting not chosen explicitly at construction
    fn apply_config(&mut self, _config: &EngineConfig) {}

    /// Instant the last run completed, when known
    fn finished_at(&self) -> Option<f64> {
        None
    }

    /// Take the status events emitted since the last drain
    fn drain_events(&mut self) -> StatusEvents;

    fn is_complete(&self) -> bool {
        self.motion_state() == MotionState::Complete
    }
}

//! Motion states, directions, and options
//!
//! Every moveable runs the same flat state machine:
//!
//! ```text
//! Stopped -> Starting -> Moving <-> Paused
//!                          |          ^
//!                          v          |
//!                      Reversing -----+
//! any running state -> Complete -> Stopped
//! ```

/// `repeat_cycles` value meaning "repeat forever"
pub const REPEAT_INFINITE: u32 = 0;

/// Lifecycle state of a moveable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MotionState {
    /// Not running; `start()` is accepted
    #[default]
    Stopped,
    /// Started but waiting for its delay to elapse
    Starting,
    /// Travelling from start to end
    Moving,
    Paused,
    /// Travelling from end back to start
    Reversing,
    /// Finished its last cycle
    Complete,
}

impl MotionState {
    /// Whether ticks advance this state
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Starting | Self::Moving | Self::Reversing)
    }

    /// Whether the moveable has been started and not yet finished or stopped
    pub fn is_active(&self) -> bool {
        self.is_running() || *self == Self::Paused
    }

    /// Transition table for the motion state machine
    pub fn can_transition_to(&self, next: MotionState) -> bool {
        use MotionState::*;

        match (*self, next) {
            (Stopped, Starting | Moving | Reversing) => true,
            (Starting, Moving | Reversing | Paused) => true,
            (Moving, Reversing | Paused | Complete) => true,
            (Reversing, Moving | Paused | Complete) => true,
            (Paused, Starting | Moving | Reversing) => true,
            (Complete, Stopped) => true,
            (from, Stopped) => from != Stopped,
            _ => false,
        }
    }
}

/// Direction a moveable plays on its next `start()`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MotionDirection {
    #[default]
    Forward,
    Reverse,
}

impl MotionDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

/// Boolean options shared by tween-style moveables
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MotionOptions {
    /// Play back to the start after reaching the end
    pub reverses: bool,
    /// Run additional cycles
    pub repeats: bool,
    /// Add deltas to the live value instead of replacing it
    pub additive: bool,
}

impl MotionOptions {
    pub const NONE: MotionOptions = MotionOptions {
        reverses: false,
        repeats: false,
        additive: false,
    };

    pub fn reversing() -> Self {
        Self {
            reverses: true,
            ..Self::NONE
        }
    }

    pub fn repeating() -> Self {
        Self {
            repeats: true,
            ..Self::NONE
        }
    }

    pub fn additive() -> Self {
        Self {
            additive: true,
            ..Self::NONE
        }
    }

    /// Builder: enable reversing
    pub fn with_reverses(mut self) -> Self {
        self.reverses = true;
        self
    }

    /// Builder: enable repeating
    pub fn with_repeats(mut self) -> Self {
        self.repeats = true;
        self
    }

    /// Builder: enable additive blending
    pub fn with_additive(mut self) -> Self {
        self.additive = true;
        self
    }
}

//! Parallel composition
//!
//! A [`Group`] starts every child together and completes once each child has
//! reported completion on its status channel. It has no duration or easing of its own.
//!
//! Children re-armed for a reverse or repeat phase are timed from the instant the
//! previous phase ended, so a group turns around on the same beat its children
//! would on their own.

use crate::additive::AdditiveRegistry;
use crate::moveable::{Moveable, StatusEvents};
use cadence_core::{
    EngineConfig, EventKind, EventListeners, EventQueue, MotionDirection, MotionEvent, MotionOptions, MotionState,
    REPEAT_INFINITE,
};
use std::mem;
use tracing::trace;

/// Runs a set of moveables concurrently
pub struct Group {
    children: Vec<Box<dyn Moveable>>,
    finished: Vec<bool>,
    state: MotionState,
    resume_state: MotionState,
    options: MotionOptions,
    repeat_cycles: u32,
    cycles_completed: u32,
    direction: MotionDirection,
    in_second_phase: bool,
    phase_index: u32,
    total_progress: f64,
    finished_at: Option<f64>,
    registry: Option<AdditiveRegistry>,
    listeners: EventListeners<Group>,
    events: EventQueue,
}

impl Group {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            finished: Vec::new(),
            state: MotionState::Stopped,
            resume_state: MotionState::Moving,
            options: MotionOptions::NONE,
            repeat_cycles: REPEAT_INFINITE,
            cycles_completed: 0,
            direction: MotionDirection::Forward,
            in_second_phase: false,
            phase_index: 0,
            total_progress: 0.0,
            finished_at: None,
            registry: None,
            listeners: EventListeners::new(),
            events: EventQueue::new(),
        }
    }

    /// Builder: add a child
    pub fn with(mut self, child: impl Moveable + 'static) -> Self {
        self.add(child);
        self
    }

    pub fn with_options(mut self, options: MotionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_repeat_cycles(mut self, cycles: u32) -> Self {
        self.repeat_cycles = cycles;
        self
    }

    pub fn add(&mut self, child: impl Moveable + 'static) {
        self.add_boxed(Box::new(child));
    }

    pub fn add_boxed(&mut self, mut child: Box<dyn Moveable>) {
        if let Some(registry) = &self.registry {
            child.bind_registry(registry);
        }
        self.children.push(child);
        self.finished.push(false);
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&Group, &MotionEvent) + 'static,
    {
        self.listeners.on(kind, listener);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[Box<dyn Moveable>] {
        &self.children
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    fn emit(&mut self, event: MotionEvent) {
        self.events.push(event);
        let mut listeners = mem::take(&mut self.listeners);
        listeners.dispatch(self, &event);
        self.listeners = listeners;
    }

    /// Restart every child in `direction` from a clean state, timed from `at` when known
    fn rearm_children(&mut self, direction: MotionDirection, at: Option<f64>) {
        for (child, finished) in self.children.iter_mut().zip(self.finished.iter_mut()) {
            child.reset();
            child.set_direction(direction);
            match at {
                Some(timestamp) => child.start_at(timestamp),
                None => child.start(),
            }
            child.drain_events();
            *finished = false;
        }
    }

    /// Instant the slowest child ended the phase, falling back to the current beat
    fn phase_end(&self, timestamp: Option<f64>) -> Option<f64> {
        self.children
            .iter()
            .filter_map(|child| child.finished_at())
            .reduce(f64::max)
            .or(timestamp)
    }

    fn phases_per_cycle(&self) -> u32 {
        if self.options.reverses && self.direction == MotionDirection::Forward {
            2
        } else {
            1
        }
    }

    fn record_progress(&mut self) {
        let count = self.children.len().max(1) as f64;
        let phase = self.children.iter().map(|c| c.total_progress()).sum::<f64>() / count;
        let phases = if self.options.repeats && self.repeat_cycles != REPEAT_INFINITE {
            (self.repeat_cycles + 1) * self.phases_per_cycle()
        } else {
            self.phases_per_cycle()
        };
        let total = (self.phase_index as f64 + phase) / phases as f64;
        self.total_progress = self.total_progress.max(total.clamp(0.0, 1.0));
    }

    fn finish_phase(&mut self, timestamp: Option<f64>) {
        let boundary = self.phase_end(timestamp);
        self.phase_index += 1;

        if self.options.reverses && !self.in_second_phase {
            self.in_second_phase = true;
            self.rearm_children(self.direction.reversed(), boundary);
            self.state = MotionState::Reversing;
            trace!("group reversed");
            self.emit(MotionEvent::Reversed);
            return;
        }

        let remaining = self.options.repeats
            && (self.repeat_cycles == REPEAT_INFINITE || self.cycles_completed < self.repeat_cycles);
        if remaining {
            self.cycles_completed += 1;
            self.in_second_phase = self.direction == MotionDirection::Reverse;
            self.rearm_children(self.direction, boundary);
            self.state = self.direction_state();
            trace!(cycle = self.cycles_completed, "group repeated");
            self.emit(MotionEvent::Repeated);
            return;
        }

        self.state = MotionState::Complete;
        self.total_progress = 1.0;
        self.finished_at = boundary;
        trace!("group complete");
        self.emit(MotionEvent::Completed);
    }

    fn direction_state(&self) -> MotionState {
        match self.direction {
            MotionDirection::Forward => MotionState::Moving,
            MotionDirection::Reverse => MotionState::Reversing,
        }
    }

    fn begin(&mut self, at: Option<f64>) {
        if self.state != MotionState::Stopped {
            return;
        }

        self.cycles_completed = 0;
        self.phase_index = 0;
        self.total_progress = 0.0;
        self.finished_at = None;
        self.in_second_phase = self.direction == MotionDirection::Reverse;
        self.rearm_children(self.direction, at);
        self.state = self.direction_state();
        self.emit(MotionEvent::Started);

        if self.children.is_empty() {
            self.finish_phase(at);
        }
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Moveable for Group {
    fn start(&mut self) {
        self.begin(None);
    }

    fn start_at(&mut self, timestamp: f64) {
        self.begin(Some(timestamp));
    }

    fn stop(&mut self) {
        if self.state == MotionState::Stopped {
            return;
        }
        for child in &mut self.children {
            child.stop();
            child.drain_events();
        }
        self.state = MotionState::Stopped;
        self.emit(MotionEvent::Stopped);
    }

    fn pause(&mut self) {
        for child in &mut self.children {
            child.pause();
            child.drain_events();
        }
        if self.state.is_running() {
            self.resume_state = self.state;
            self.state = MotionState::Paused;
            self.emit(MotionEvent::Paused);
        }
    }

    fn resume(&mut self) {
        for child in &mut self.children {
            child.resume();
            child.drain_events();
        }
        if self.state == MotionState::Paused {
            self.state = self.resume_state;
            self.emit(MotionEvent::Resumed);
        }
    }

    fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
        self.finished.iter_mut().for_each(|f| *f = false);
        self.state = MotionState::Stopped;
        self.cycles_completed = 0;
        self.phase_index = 0;
        self.in_second_phase = false;
        self.total_progress = 0.0;
        self.finished_at = None;
        self.events.clear();
    }

    fn update(&mut self, timestamp: f64) {
        if !self.state.is_running() {
            return;
        }

        for (child, finished) in self.children.iter_mut().zip(self.finished.iter_mut()) {
            if *finished {
                continue;
            }
            child.update(timestamp);
            if child.drain_events().iter().any(|e| *e == MotionEvent::Completed) {
                *finished = true;
            }
        }

        self.record_progress();
        self.emit(MotionEvent::Updated);

        if self.finished.iter().all(|f| *f) {
            self.finish_phase(Some(timestamp));
        }
    }

    /// Derived from the children while running
    fn motion_state(&self) -> MotionState {
        if !self.state.is_active() {
            return self.state;
        }

        let states = self.children.iter().map(|c| c.motion_state());
        let mut any_moving = false;
        let mut any_reversing = false;
        let mut any_starting = false;
        let mut all_paused = true;
        let mut any_active = false;
        for state in states {
            match state {
                MotionState::Moving => any_moving = true,
                MotionState::Reversing => any_reversing = true,
                MotionState::Starting => any_starting = true,
                _ => {}
            }
            if state.is_active() {
                any_active = true;
                all_paused &= state == MotionState::Paused;
            }
        }

        if any_moving {
            MotionState::Moving
        } else if any_reversing {
            MotionState::Reversing
        } else if any_starting {
            MotionState::Starting
        } else if any_active && all_paused {
            MotionState::Paused
        } else {
            self.state
        }
    }

    fn total_progress(&self) -> f64 {
        self.total_progress
    }

    fn reverses(&self) -> bool {
        self.options.reverses
    }

    fn set_reverses(&mut self, reverses: bool) {
        self.options.reverses = reverses;
    }

    fn repeats(&self) -> bool {
        self.options.repeats
    }

    fn set_repeats(&mut self, repeats: bool) {
        self.options.repeats = repeats;
    }

    fn set_direction(&mut self, direction: MotionDirection) {
        self.direction = direction;
    }

    fn bind_registry(&mut self, registry: &AdditiveRegistry) {
        for child in &mut self.children {
            child.bind_registry(registry);
        }
        self.registry = Some(registry.clone());
    }

    fn apply_config(&mut self, config: &EngineConfig) {
        for child in &mut self.children {
            child.apply_config(config);
        }
    }

    fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    fn drain_events(&mut self) -> StatusEvents {
        self.events.drain()
    }
}

//! Serial composition
//!
//! A [`Sequence`] plays its steps one after another. When a step completes, the
//! next one starts at the instant the previous one ended and is updated within the
//! same tick.
//!
//! Reversing comes in two topologies:
//!
//! - [`ReversingMode::Noncontiguous`]: every step reverses in place before the
//!   sequence advances.
//! - [`ReversingMode::Contiguous`]: all steps play forward, then all steps play
//!   backward in reverse order, as one seamless traversal.
//!
//! A sequence that does not reverse leaves each step's own reversing alone.
//! Repeat cycles apply to the whole traversal.

use crate::additive::AdditiveRegistry;
use crate::moveable::{Moveable, StatusEvents};
use cadence_core::{
    EngineConfig, EventKind, EventListeners, EventQueue, MotionDirection, MotionEvent, MotionOptions, MotionState,
    REPEAT_INFINITE,
};
use std::mem;
use tracing::trace;

/// How a reversing sequence plays back
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReversingMode {
    #[default]
    Noncontiguous,
    Contiguous,
}

/// Runs moveables one after another
pub struct Sequence {
    steps: Vec<Box<dyn Moveable>>,
    /// Reversing each step was added with
    step_reverses: Vec<bool>,
    current_step: usize,
    mode: ReversingMode,
    options: MotionOptions,
    repeat_cycles: u32,
    cycles_completed: u32,
    state: MotionState,
    resume_state: MotionState,
    direction: MotionDirection,
    /// In the backward pass of a contiguous traversal
    playing_backward: bool,
    /// Steps finished in the current run
    steps_completed: usize,
    total_progress: f64,
    finished_at: Option<f64>,
    registry: Option<AdditiveRegistry>,
    listeners: EventListeners<Sequence>,
    events: EventQueue,
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            step_reverses: Vec::new(),
            current_step: 0,
            mode: ReversingMode::Noncontiguous,
            options: MotionOptions::NONE,
            repeat_cycles: REPEAT_INFINITE,
            cycles_completed: 0,
            state: MotionState::Stopped,
            resume_state: MotionState::Moving,
            direction: MotionDirection::Forward,
            playing_backward: false,
            steps_completed: 0,
            total_progress: 0.0,
            finished_at: None,
            registry: None,
            listeners: EventListeners::new(),
            events: EventQueue::new(),
        }
    }

    /// Builder: append a step
    pub fn with(mut self, step: impl Moveable + 'static) -> Self {
        self.add(step);
        self
    }

    pub fn with_options(mut self, options: MotionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_reversing_mode(mut self, mode: ReversingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_repeat_cycles(mut self, cycles: u32) -> Self {
        self.repeat_cycles = cycles;
        self
    }

    pub fn add(&mut self, step: impl Moveable + 'static) {
        self.add_boxed(Box::new(step));
    }

    pub fn add_boxed(&mut self, mut step: Box<dyn Moveable>) {
        if let Some(registry) = &self.registry {
            step.bind_registry(registry);
        }
        self.step_reverses.push(step.reverses());
        self.steps.push(step);
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&Sequence, &MotionEvent) + 'static,
    {
        self.listeners.on(kind, listener);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step
    }

    pub fn reversing_mode(&self) -> ReversingMode {
        self.mode
    }

    pub fn set_reversing_mode(&mut self, mode: ReversingMode) {
        self.mode = mode;
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    /// Whether the backward pass of a contiguous traversal is playing
    pub fn is_playing_backward(&self) -> bool {
        self.playing_backward
    }

    fn emit(&mut self, event: MotionEvent) {
        self.events.push(event);
        let mut listeners = mem::take(&mut self.listeners);
        listeners.dispatch(self, &event);
        self.listeners = listeners;
    }

    /// Set each step's reversing for the coming run
    fn configure_steps(&mut self) {
        for (step, own) in self.steps.iter_mut().zip(&self.step_reverses) {
            let reverses = match (self.options.reverses, self.mode) {
                (false, _) => *own,
                (true, ReversingMode::Noncontiguous) => true,
                (true, ReversingMode::Contiguous) => false,
            };
            step.set_reverses(reverses);
        }
    }

    fn contiguous_reverse(&self) -> bool {
        self.options.reverses && self.mode == ReversingMode::Contiguous
    }

    fn start_step(&mut self, index: usize, direction: MotionDirection, at: Option<f64>) {
        self.current_step = index;
        let step = &mut self.steps[index];
        step.reset();
        step.set_direction(direction);
        match at {
            Some(timestamp) => step.start_at(timestamp),
            None => step.start(),
        }
        step.drain_events();
    }

    /// Begin a traversal from the first step, or from the last one when playing in reverse
    fn begin_traversal(&mut self, at: Option<f64>) {
        self.playing_backward = self.direction == MotionDirection::Reverse;
        if self.playing_backward {
            self.start_step(self.steps.len() - 1, MotionDirection::Reverse, at);
            self.state = MotionState::Reversing;
        } else {
            self.start_step(0, MotionDirection::Forward, at);
            self.state = MotionState::Moving;
        }
    }

    fn begin(&mut self, at: Option<f64>) {
        if self.state != MotionState::Stopped {
            return;
        }

        self.cycles_completed = 0;
        self.steps_completed = 0;
        self.total_progress = 0.0;
        self.finished_at = None;
        self.configure_steps();

        if self.steps.is_empty() {
            self.emit(MotionEvent::Started);
            self.state = MotionState::Complete;
            self.total_progress = 1.0;
            self.finished_at = at;
            self.emit(MotionEvent::Completed);
            return;
        }

        self.begin_traversal(at);
        self.emit(MotionEvent::Started);
    }

    fn passes_per_cycle(&self) -> usize {
        if self.contiguous_reverse() && self.direction == MotionDirection::Forward {
            2
        } else {
            1
        }
    }

    fn record_progress(&mut self) {
        let Some(step) = self.steps.get(self.current_step) else {
            return;
        };
        let cycles = if self.options.repeats && self.repeat_cycles != REPEAT_INFINITE {
            self.repeat_cycles as usize + 1
        } else {
            1
        };
        let total_steps = (self.steps.len() * self.passes_per_cycle() * cycles) as f64;
        let total = (self.steps_completed as f64 + step.total_progress()) / total_steps;
        self.total_progress = self.total_progress.max(total.clamp(0.0, 1.0));
    }

    /// Move past a completed step; returns `false` when the sequence finished.
    ///
    /// The next step is timed from the instant the completed one ended.
    fn advance(&mut self, timestamp: f64) -> bool {
        let index = self.current_step;
        let boundary = self.steps[index].finished_at().unwrap_or(timestamp);
        self.steps_completed += 1;
        self.emit(MotionEvent::StepCompleted { index });

        if !self.playing_backward {
            if index + 1 < self.steps.len() {
                self.start_step(index + 1, MotionDirection::Forward, Some(boundary));
                return true;
            }
            if self.contiguous_reverse() && self.direction == MotionDirection::Forward {
                self.playing_backward = true;
                self.state = MotionState::Reversing;
                self.start_step(index, MotionDirection::Reverse, Some(boundary));
                trace!("sequence reversed");
                self.emit(MotionEvent::Reversed);
                return true;
            }
        } else if index > 0 {
            self.start_step(index - 1, MotionDirection::Reverse, Some(boundary));
            return true;
        }

        let remaining = self.options.repeats
            && (self.repeat_cycles == REPEAT_INFINITE || self.cycles_completed < self.repeat_cycles);
        if remaining {
            self.cycles_completed += 1;
            self.begin_traversal(Some(boundary));
            trace!(cycle = self.cycles_completed, "sequence repeated");
            self.emit(MotionEvent::Repeated);
            return true;
        }

        self.state = MotionState::Complete;
        self.total_progress = 1.0;
        self.finished_at = Some(boundary);
        trace!("sequence complete");
        self.emit(MotionEvent::Completed);
        false
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Moveable for Sequence {
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
        if let Some(step) = self.steps.get_mut(self.current_step) {
            step.stop();
            step.drain_events();
        }
        self.state = MotionState::Stopped;
        self.emit(MotionEvent::Stopped);
    }

    fn pause(&mut self) {
        if !self.state.is_running() {
            return;
        }
        if let Some(step) = self.steps.get_mut(self.current_step) {
            step.pause();
            step.drain_events();
        }
        self.resume_state = self.state;
        self.state = MotionState::Paused;
        self.emit(MotionEvent::Paused);
    }

    fn resume(&mut self) {
        if self.state != MotionState::Paused {
            return;
        }
        if let Some(step) = self.steps.get_mut(self.current_step) {
            step.resume();
            step.drain_events();
        }
        self.state = self.resume_state;
        self.emit(MotionEvent::Resumed);
    }

    fn reset(&mut self) {
        for step in &mut self.steps {
            step.reset();
        }
        self.current_step = 0;
        self.cycles_completed = 0;
        self.steps_completed = 0;
        self.playing_backward = false;
        self.total_progress = 0.0;
        self.finished_at = None;
        self.state = MotionState::Stopped;
        self.events.clear();
    }

    fn update(&mut self, timestamp: f64) {
        if !self.state.is_running() {
            return;
        }

        // Bounded so zero-length steps cannot spin forever within one beat
        let mut budget = self.steps.len() * 2 + 1;
        loop {
            let completed = {
                let step = &mut self.steps[self.current_step];
                step.update(timestamp);
                step.drain_events().contains(&MotionEvent::Completed)
            };
            self.record_progress();

            if !completed || !self.advance(timestamp) {
                break;
            }
            budget -= 1;
            if budget == 0 {
                break;
            }
        }

        self.emit(MotionEvent::Updated);
    }

    fn motion_state(&self) -> MotionState {
        self.state
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
        for step in &mut self.steps {
            step.bind_registry(registry);
        }
        self.registry = Some(registry.clone());
    }

    fn apply_config(&mut self, config: &EngineConfig) {
        for step in &mut self.steps {
            step.apply_config(config);
        }
    }

    fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    fn drain_events(&mut self) -> StatusEvents {
        self.events.drain()
    }
}

//! Tween motion
//!
//! A [`Motion`] interpolates a set of [`PropertyData`] from start to end over a
//! duration, shaped by an easing curve. It can wait out a delay, play back to its
//! start, repeat, and blend additively with other motions on the same property.
//!
//! # Timing
//!
//! The start time is taken from the first beat after `start()`. `pause()` remembers
//! the last beat seen; the first beat after `resume()` adds the gap to the paused
//! offset, so the motion continues exactly where it stopped.

use crate::additive::{Additive, AdditiveRegistration, AdditiveRegistry};
use crate::easing::Easing;
use crate::moveable::{Moveable, StatusEvents};
use cadence_core::{
    EngineConfig, EventKind, EventListeners, EventQueue, MotionDirection, MotionEvent, MotionOptions,
    MotionState, PropertyData, PropertyState, StructuredAssistant, Target, ValueAssistant,
    REPEAT_INFINITE,
};
use std::mem;
use tracing::{trace, warn};

/// A duration-based tween over one or more properties
pub struct Motion {
    properties: Vec<PropertyData>,
    duration: f64,
    delay: f64,
    easing: Easing,
    reverse_easing: Option<Easing>,
    options: MotionOptions,
    repeat_cycles: u32,
    cycles_completed: u32,
    state: MotionState,
    /// State to return to on `resume()`
    resume_state: MotionState,
    direction: MotionDirection,
    start_time: Option<f64>,
    paused_duration: f64,
    /// Last beat before a pause, consumed by the first beat after resume
    pause_timestamp: Option<f64>,
    last_timestamp: Option<f64>,
    /// Instant the final phase ended, once complete
    finished_at: Option<f64>,
    /// Phases finished in the current run
    phase_index: u32,
    /// Whether the current cycle already turned around
    in_second_phase: bool,
    /// Whether endpoints are currently swapped relative to construction
    swapped: bool,
    total_progress: f64,
    assistant: Box<dyn ValueAssistant>,
    additive_weighting: f64,
    /// Weighting chosen by the caller rather than taken from configuration
    weighting_set: bool,
    registry: Option<AdditiveRegistry>,
    registration: Option<AdditiveRegistration>,
    listeners: EventListeners<Motion>,
    events: EventQueue,
}

impl Motion {
    /// Create a motion over explicit properties, all addressing `target`
    pub fn new(target: &Target, properties: Vec<PropertyData>, duration: f64, easing: Easing) -> Self {
        let properties = properties
            .into_iter()
            .map(|property| property.with_target(target))
            .collect();
        Self::with_properties(properties, duration, easing)
    }

    /// Create a motion from declared states.
    ///
    /// States whose kind does not match the live value are skipped.
    pub fn from_states(target: &Target, states: &[PropertyState], duration: f64, easing: Easing) -> Self {
        let assistant = StructuredAssistant::new();
        let mut properties = Vec::new();
        for state in states {
            match assistant.generate_properties(target, state) {
                Ok(generated) => properties.extend(generated),
                Err(err) => warn!(path = %state.path, %err, "skipping property"),
            }
        }
        Self::with_properties(properties, duration, easing)
    }

    fn with_properties(properties: Vec<PropertyData>, duration: f64, easing: Easing) -> Self {
        let config = EngineConfig::default();
        let mut assistant = StructuredAssistant::new();
        assistant.set_additive_weighting(config.motion.default_additive_weighting);

        Self {
            properties,
            duration: duration.max(0.0),
            delay: 0.0,
            easing,
            reverse_easing: None,
            options: MotionOptions::NONE,
            repeat_cycles: REPEAT_INFINITE,
            cycles_completed: 0,
            state: MotionState::Stopped,
            resume_state: MotionState::Moving,
            direction: MotionDirection::Forward,
            start_time: None,
            paused_duration: 0.0,
            pause_timestamp: None,
            last_timestamp: None,
            finished_at: None,
            phase_index: 0,
            in_second_phase: false,
            swapped: false,
            total_progress: 0.0,
            assistant: Box::new(assistant),
            additive_weighting: config.motion.default_additive_weighting,
            weighting_set: false,
            registry: None,
            registration: None,
            listeners: EventListeners::new(),
            events: EventQueue::new(),
        }
    }

    /// Builder: set options
    pub fn with_options(mut self, options: MotionOptions) -> Self {
        self.options = options;
        self.assistant.set_additive(options.additive);
        self
    }

    /// Builder: wait `delay` seconds before moving
    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay.max(0.0);
        self
    }

    /// Builder: easing used while playing back to the start
    pub fn with_reverse_easing(mut self, easing: Easing) -> Self {
        self.reverse_easing = Some(easing);
        self
    }

    /// Builder: number of extra cycles when repeating, [`REPEAT_INFINITE`] for no limit
    pub fn with_repeat_cycles(mut self, cycles: u32) -> Self {
        self.repeat_cycles = cycles;
        self
    }

    pub fn with_additive_weighting(mut self, weighting: f64) -> Self {
        self.additive_weighting = weighting.clamp(0.0, 1.0);
        self.assistant.set_additive_weighting(self.additive_weighting);
        self.weighting_set = true;
        self
    }

    /// Builder: take defaults from `config` for settings not chosen explicitly
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.apply_config(config);
        self
    }

    /// Builder: replace the value assistant
    pub fn with_assistant(mut self, mut assistant: Box<dyn ValueAssistant>) -> Self {
        assistant.set_additive(self.options.additive);
        assistant.set_additive_weighting(self.additive_weighting);
        self.assistant = assistant;
        self
    }

    pub fn with_registry(mut self, registry: &AdditiveRegistry) -> Self {
        self.registry = Some(registry.clone());
        self
    }

    /// Register a listener for an event kind
    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&Motion, &MotionEvent) + 'static,
    {
        self.listeners.on(kind, listener);
    }

    pub fn properties(&self) -> &[PropertyData] {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut [PropertyData] {
        &mut self.properties
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn options(&self) -> MotionOptions {
        self.options
    }

    pub fn repeat_cycles(&self) -> u32 {
        self.repeat_cycles
    }

    pub fn set_repeat_cycles(&mut self, cycles: u32) {
        self.repeat_cycles = cycles;
    }

    /// Repeat cycles finished in the current run
    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn direction(&self) -> MotionDirection {
        self.direction
    }

    pub fn is_additive(&self) -> bool {
        self.options.additive
    }

    pub fn set_additive(&mut self, additive: bool) {
        self.options.additive = additive;
        self.assistant.set_additive(additive);
    }

    fn emit(&mut self, event: MotionEvent) {
        self.events.push(event);
        let mut listeners = mem::take(&mut self.listeners);
        listeners.dispatch(self, &event);
        self.listeners = listeners;
    }

    fn set_orientation(&mut self, swapped: bool) {
        if self.swapped != swapped {
            for property in &mut self.properties {
                property.swap_endpoints();
            }
            self.swapped = swapped;
        }
    }

    fn phase_state(&self) -> MotionState {
        if self.swapped {
            MotionState::Reversing
        } else {
            MotionState::Moving
        }
    }

    fn phases_per_cycle(&self) -> u32 {
        if self.options.reverses && self.direction == MotionDirection::Forward {
            2
        } else {
            1
        }
    }

    fn has_cycles_remaining(&self) -> bool {
        self.options.repeats
            && (self.repeat_cycles == REPEAT_INFINITE || self.cycles_completed < self.repeat_cycles)
    }

    /// Read unresolved starts from the target, and seed additive starts from the registry
    fn resolve_starts(&mut self) {
        let additive = self.options.additive;
        for property in &mut self.properties {
            let seeded = match (&self.registry, additive, property.target()) {
                (Some(registry), true, Some(target)) => registry.target_value(&target, property.path()),
                _ => None,
            };

            if let Some(start) = seeded {
                property.set_start(start);
            } else if !property.has_start() {
                match self.assistant.try_retrieve_value(property) {
                    Ok(live) => property.set_start(live),
                    Err(err) => warn!(%err, "unable to read start value"),
                }
            } else if let Some(live) = self.assistant.retrieve_value(property) {
                property.set_current(live);
            }

            if additive {
                property.set_current(property.resolved_start());
            }
        }
    }

    fn register_additive(&mut self) {
        if !self.options.additive || self.registration.is_some() {
            return;
        }
        let Some(registry) = self.registry.clone() else {
            return;
        };

        let registration = registry.register(&*self);
        let observer = registry.observer(&registration);
        for property in &mut self.properties {
            property.set_observer(Some(observer.clone()));
        }
        self.registration = Some(registration);
    }

    fn unregister_additive(&mut self) {
        if let Some(registration) = self.registration.take() {
            for property in &mut self.properties {
                property.set_observer(None);
            }
            if let Some(registry) = &self.registry {
                registry.unregister(&registration);
            }
        }
    }

    fn clear_progress(&mut self) {
        self.start_time = None;
        self.paused_duration = 0.0;
        self.pause_timestamp = None;
        self.last_timestamp = None;
        self.finished_at = None;
        self.phase_index = 0;
        self.cycles_completed = 0;
        self.in_second_phase = false;
        self.total_progress = 0.0;
    }

    /// Begin a new cycle in the configured direction
    fn arm_cycle(&mut self) {
        let reverse = self.direction == MotionDirection::Reverse;
        self.set_orientation(reverse);
        self.in_second_phase = reverse;
    }

    fn write_values(&mut self, eased: f64) {
        for property in &mut self.properties {
            let value = property.interpolate(eased);
            if self.assistant.update(property, value).is_none() {
                trace!(path = property.path(), "value not written");
            }
            property.set_current(value);
        }
    }

    fn record_progress(&mut self, raw: f64) {
        let total = if self.options.repeats && self.repeat_cycles == REPEAT_INFINITE {
            // Unbounded runs saturate after the first cycle
            (self.phase_index as f64 + raw) / self.phases_per_cycle() as f64
        } else {
            let cycles = if self.options.repeats {
                self.repeat_cycles + 1
            } else {
                1
            };
            let phases = (cycles * self.phases_per_cycle()) as f64;
            (self.phase_index as f64 + raw) / phases
        };
        self.total_progress = self.total_progress.max(total.clamp(0.0, 1.0));
    }

    /// Handle the end of a phase; returns `true` when the motion completed
    fn finish_phase(&mut self) -> bool {
        self.phase_index += 1;

        if self.options.reverses && !self.in_second_phase {
            self.set_orientation(!self.swapped);
            self.in_second_phase = true;
            self.state = self.phase_state();
            self.advance_start_time();
            trace!("motion reversed");
            self.emit(MotionEvent::Reversed);
            return false;
        }

        if self.has_cycles_remaining() {
            self.cycles_completed += 1;
            self.arm_cycle();
            self.state = self.phase_state();
            self.advance_start_time();
            trace!(cycle = self.cycles_completed, "motion repeated");
            self.emit(MotionEvent::Repeated);
            return false;
        }

        self.state = MotionState::Complete;
        self.total_progress = 1.0;
        self.finished_at = self.phase_end();
        self.unregister_additive();
        trace!("motion complete");
        self.emit(MotionEvent::Completed);
        true
    }

    /// Instant the current phase reaches its end
    fn phase_end(&self) -> Option<f64> {
        self.start_time
            .map(|start| start + self.paused_duration + self.delay + self.duration)
    }

    fn advance_start_time(&mut self) {
        if let Some(start) = self.start_time.as_mut() {
            *start += self.duration;
        }
    }
}

impl Moveable for Motion {
    fn start(&mut self) {
        if self.state != MotionState::Stopped {
            return;
        }

        self.clear_progress();
        self.set_orientation(false);
        self.resolve_starts();
        self.register_additive();
        self.arm_cycle();

        if self.delay > 0.0 {
            self.state = MotionState::Starting;
        } else {
            self.state = self.phase_state();
            self.emit(MotionEvent::Started);
        }
    }

    fn start_at(&mut self, timestamp: f64) {
        if self.state != MotionState::Stopped {
            return;
        }
        self.start();
        self.start_time = Some(timestamp);
    }

    fn stop(&mut self) {
        if self.state == MotionState::Stopped {
            return;
        }
        self.state = MotionState::Stopped;
        self.unregister_additive();
        self.emit(MotionEvent::Stopped);
    }

    fn pause(&mut self) {
        if !self.state.is_running() {
            return;
        }
        self.resume_state = self.state;
        self.state = MotionState::Paused;
        if self.pause_timestamp.is_none() {
            self.pause_timestamp = self.last_timestamp;
        }
        self.emit(MotionEvent::Paused);
    }

    fn resume(&mut self) {
        if self.state != MotionState::Paused {
            return;
        }
        self.state = self.resume_state;
        self.emit(MotionEvent::Resumed);
    }

    fn reset(&mut self) {
        self.unregister_additive();
        self.set_orientation(false);
        self.clear_progress();
        self.state = MotionState::Stopped;
        self.events.clear();
    }

    fn update(&mut self, timestamp: f64) {
        if !self.state.is_running() {
            return;
        }

        if let Some(paused_at) = self.pause_timestamp.take() {
            self.paused_duration += (timestamp - paused_at).max(0.0);
        }
        self.last_timestamp = Some(timestamp);
        let start_time = *self.start_time.get_or_insert(timestamp);
        let elapsed = timestamp - start_time - self.paused_duration - self.delay;

        if self.state == MotionState::Starting {
            if elapsed < 0.0 {
                return;
            }
            self.state = self.phase_state();
            self.emit(MotionEvent::Started);
        }

        let raw = if self.duration <= 0.0 {
            1.0
        } else {
            (elapsed / self.duration).clamp(0.0, 1.0)
        };
        let easing = match (self.swapped, self.reverse_easing) {
            (true, Some(reverse)) => reverse,
            _ => self.easing,
        };
        let eased = easing.apply(raw);

        self.write_values(eased);
        self.record_progress(raw);
        self.emit(MotionEvent::Updated);

        if raw >= 1.0 {
            self.finish_phase();
        }
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
        self.registry = Some(registry.clone());
    }

    fn apply_config(&mut self, config: &EngineConfig) {
        if self.weighting_set {
            return;
        }
        self.additive_weighting = config.motion.default_additive_weighting.clamp(0.0, 1.0);
        self.assistant.set_additive_weighting(self.additive_weighting);
    }

    fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    fn drain_events(&mut self) -> StatusEvents {
        self.events.drain()
    }
}

impl Additive for Motion {
    fn operation_id(&self) -> u64 {
        self.registration.map(|r| r.operation_id).unwrap_or(0)
    }

    fn additive_weighting(&self) -> f64 {
        self.additive_weighting
    }

    fn additive_properties(&self) -> &[PropertyData] {
        &self.properties
    }
}

impl Drop for Motion {
    fn drop(&mut self) {
        self.unregister_additive();
    }
}

//! Physics-driven motion
//!
//! Velocity decays exponentially with elapsed time, so the result does not depend
//! on the frame rate. A motion comes to rest once its speed drops below the
//! configured epsilon.

use crate::moveable::{Moveable, StatusEvents};
use cadence_core::{
    EngineConfig, EventKind, EventListeners, EventQueue, MotionDirection, MotionEvent, MotionOptions,
    MotionState, PhysicsConfig, PropertyData, StructuredAssistant, Target, ValueAssistant,
    REPEAT_INFINITE,
};
use serde::{Deserialize, Serialize};
use std::mem;
use tracing::{trace, warn};

/// Initial conditions of a physics motion
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfiguration {
    /// Units per second
    pub velocity: f64,
    /// Fraction of velocity lost per second, in 0..=1
    pub friction: f64,
    /// Fraction of velocity kept when bouncing off an edge
    #[serde(default)]
    pub restitution: Option<f64>,
}

impl PhysicsConfiguration {
    pub fn new(velocity: f64, friction: f64) -> Self {
        Self {
            velocity,
            friction: friction.clamp(0.0, 1.0),
            restitution: None,
        }
    }

    /// Builder: bounce off edges, keeping `restitution` of the speed
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = Some(restitution.clamp(0.0, 1.0));
        self
    }
}

/// Velocity multiplier after `elapsed` seconds at `friction` loss per second
pub fn friction_decay(elapsed: f64, friction: f64) -> f64 {
    (1.0 - friction).max(0.0).powf(elapsed.max(0.0))
}

/// One-dimensional velocity integrator with optional collision bounds
#[derive(Clone, Debug)]
pub struct PhysicsSystem {
    configuration: PhysicsConfiguration,
    velocity: f64,
    bounds: Option<(f64, f64)>,
    epsilon: f64,
    collisions: u32,
}

impl PhysicsSystem {
    pub fn new(configuration: PhysicsConfiguration) -> Self {
        Self::with_config(configuration, &EngineConfig::default().physics)
    }

    pub fn with_config(configuration: PhysicsConfiguration, config: &PhysicsConfig) -> Self {
        Self {
            configuration,
            velocity: configuration.velocity,
            bounds: None,
            epsilon: config.velocity_epsilon,
            collisions: 0,
        }
    }

    pub fn configuration(&self) -> &PhysicsConfiguration {
        &self.configuration
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: f64) {
        self.velocity = velocity;
    }

    /// Speed below which the system counts as at rest
    pub fn velocity_epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_velocity_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    /// Constrain positions to `min..=max`
    pub fn set_bounds(&mut self, min: f64, max: f64) {
        self.bounds = Some((min.min(max), min.max(max)));
    }

    pub fn clear_bounds(&mut self) {
        self.bounds = None;
    }

    /// Edge hits since the last reset
    pub fn collisions(&self) -> u32 {
        self.collisions
    }

    /// Restore the configured velocity, negated when `reverse`
    pub fn reset(&mut self, reverse: bool) {
        let velocity = self.configuration.velocity;
        self.velocity = if reverse { -velocity } else { velocity };
        self.collisions = 0;
    }

    pub fn is_at_rest(&self) -> bool {
        self.velocity.abs() < self.epsilon
    }

    /// `1 - |v| / |v0|`
    pub fn progress(&self) -> f64 {
        let initial = self.configuration.velocity.abs();
        if initial <= 0.0 {
            return 1.0;
        }
        (1.0 - self.velocity.abs() / initial).clamp(0.0, 1.0)
    }

    /// Decay the velocity over `dt` and return the displacement
    pub fn advance(&mut self, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        self.velocity *= friction_decay(dt, self.configuration.friction);
        self.velocity * dt
    }

    /// Integrate `position` over `dt`, resolving edge collisions
    pub fn step(&mut self, position: f64, dt: f64) -> f64 {
        let next = position + self.advance(dt);
        self.collide(next)
    }

    fn collide(&mut self, position: f64) -> f64 {
        let Some((min, max)) = self.bounds else {
            return position;
        };
        if (min..=max).contains(&position) {
            return position;
        }

        self.collisions += 1;
        match self.configuration.restitution {
            Some(restitution) => self.velocity = -self.velocity * restitution,
            None => self.velocity = 0.0,
        }
        trace!(position, velocity = self.velocity, "edge collision");
        position.clamp(min, max)
    }
}

/// Drives every property with one shared, decaying velocity
///
/// End values of the properties are ignored; each starts from its start value
/// (or the live value) and travels until the velocity comes to rest.
pub struct PhysicsMotion {
    properties: Vec<PropertyData>,
    assistant: Box<dyn ValueAssistant>,
    system: PhysicsSystem,
    options: MotionOptions,
    repeat_cycles: u32,
    cycles_completed: u32,
    state: MotionState,
    resume_state: MotionState,
    direction: MotionDirection,
    in_second_phase: bool,
    last_timestamp: Option<f64>,
    finished_at: Option<f64>,
    total_progress: f64,
    /// Physics settings were given at construction
    config_set: bool,
    listeners: EventListeners<PhysicsMotion>,
    events: EventQueue,
}

impl PhysicsMotion {
    pub fn new(target: &Target, properties: Vec<PropertyData>, configuration: PhysicsConfiguration) -> Self {
        let mut motion = Self::with_config(target, properties, configuration, &EngineConfig::default().physics);
        motion.config_set = false;
        motion
    }

    pub fn with_config(
        target: &Target,
        properties: Vec<PropertyData>,
        configuration: PhysicsConfiguration,
        config: &PhysicsConfig,
    ) -> Self {
        Self {
            properties: properties
                .into_iter()
                .map(|property| property.with_target(target))
                .collect(),
            assistant: Box::new(StructuredAssistant::new()),
            system: PhysicsSystem::with_config(configuration, config),
            options: MotionOptions::NONE,
            repeat_cycles: REPEAT_INFINITE,
            cycles_completed: 0,
            state: MotionState::Stopped,
            resume_state: MotionState::Moving,
            direction: MotionDirection::Forward,
            in_second_phase: false,
            last_timestamp: None,
            finished_at: None,
            total_progress: 0.0,
            config_set: true,
            listeners: EventListeners::new(),
            events: EventQueue::new(),
        }
    }

    /// Builder: reverse and repeat options; additive blending is not supported
    pub fn with_options(mut self, options: MotionOptions) -> Self {
        if options.additive {
            warn!("physics motions do not blend additively");
        }
        self.options = MotionOptions {
            additive: false,
            ..options
        };
        self
    }

    pub fn with_repeat_cycles(mut self, cycles: u32) -> Self {
        self.repeat_cycles = cycles;
        self
    }

    pub fn with_assistant(mut self, assistant: Box<dyn ValueAssistant>) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&PhysicsMotion, &MotionEvent) + 'static,
    {
        self.listeners.on(kind, listener);
    }

    pub fn properties(&self) -> &[PropertyData] {
        &self.properties
    }

    pub fn velocity(&self) -> f64 {
        self.system.velocity()
    }

    pub fn system(&self) -> &PhysicsSystem {
        &self.system
    }

    fn emit(&mut self, event: MotionEvent) {
        self.events.push(event);
        let mut listeners = mem::take(&mut self.listeners);
        listeners.dispatch(self, &event);
        self.listeners = listeners;
    }

    fn resolve_starts(&mut self) {
        for property in &mut self.properties {
            if !property.has_start() {
                match self.assistant.try_retrieve_value(property) {
                    Ok(live) => property.set_start(live),
                    Err(err) => warn!(%err, "unable to read start value"),
                }
            }
            property.set_current(property.resolved_start());
        }
    }

    fn phase_state(&self) -> MotionState {
        if self.system.velocity() < 0.0 {
            MotionState::Reversing
        } else {
            MotionState::Moving
        }
    }

    fn write(&mut self, displacement: f64) {
        for property in &mut self.properties {
            let value = property.current() + displacement;
            self.assistant.update(property, value);
            property.set_current(value);
        }
    }

    fn restore_starts(&mut self) {
        for property in &mut self.properties {
            let start = property.resolved_start();
            self.assistant.update(property, start);
            property.set_current(start);
        }
    }

    fn record_progress(&mut self) {
        let phases = if self.options.reverses { 2.0 } else { 1.0 };
        let cycles = if self.options.repeats && self.repeat_cycles != REPEAT_INFINITE {
            (self.repeat_cycles + 1) as f64
        } else {
            1.0
        };
        let done = self.cycles_completed as f64 * phases + if self.in_second_phase { 1.0 } else { 0.0 };
        let total = (done + self.system.progress()) / (phases * cycles);
        self.total_progress = self.total_progress.max(total.clamp(0.0, 1.0));
    }

    fn finish_phase(&mut self) {
        let reverse = self.direction == MotionDirection::Reverse;

        if self.options.reverses && !self.in_second_phase {
            self.in_second_phase = true;
            self.system.reset(!reverse);
            self.state = self.phase_state();
            self.emit(MotionEvent::Reversed);
            return;
        }

        let remaining = self.options.repeats
            && (self.repeat_cycles == REPEAT_INFINITE || self.cycles_completed < self.repeat_cycles);
        if remaining {
            self.cycles_completed += 1;
            self.in_second_phase = false;
            self.restore_starts();
            self.system.reset(reverse);
            self.state = self.phase_state();
            self.emit(MotionEvent::Repeated);
            return;
        }

        self.state = MotionState::Complete;
        self.total_progress = 1.0;
        self.finished_at = self.last_timestamp;
        trace!("physics motion at rest");
        self.emit(MotionEvent::Completed);
    }
}

impl Moveable for PhysicsMotion {
    fn start(&mut self) {
        if self.state != MotionState::Stopped {
            return;
        }
        self.resolve_starts();
        self.system.reset(self.direction == MotionDirection::Reverse);
        self.cycles_completed = 0;
        self.in_second_phase = false;
        self.last_timestamp = None;
        self.finished_at = None;
        self.total_progress = 0.0;
        self.state = self.phase_state();
        self.emit(MotionEvent::Started);
    }

    fn start_at(&mut self, timestamp: f64) {
        if self.state != MotionState::Stopped {
            return;
        }
        self.start();
        self.last_timestamp = Some(timestamp);
    }

    fn stop(&mut self) {
        if self.state == MotionState::Stopped {
            return;
        }
        self.state = MotionState::Stopped;
        self.emit(MotionEvent::Stopped);
    }

    fn pause(&mut self) {
        if !self.state.is_running() {
            return;
        }
        self.resume_state = self.state;
        self.state = MotionState::Paused;
        self.emit(MotionEvent::Paused);
    }

    fn resume(&mut self) {
        if self.state != MotionState::Paused {
            return;
        }
        // The first beat after resuming becomes the new baseline
        self.last_timestamp = None;
        self.state = self.resume_state;
        self.emit(MotionEvent::Resumed);
    }

    fn reset(&mut self) {
        self.system.reset(false);
        self.state = MotionState::Stopped;
        self.cycles_completed = 0;
        self.in_second_phase = false;
        self.last_timestamp = None;
        self.finished_at = None;
        self.total_progress = 0.0;
        self.events.clear();
    }

    fn update(&mut self, timestamp: f64) {
        if !self.state.is_running() {
            return;
        }

        let dt = self
            .last_timestamp
            .map_or(0.0, |last| (timestamp - last).max(0.0));
        self.last_timestamp = Some(timestamp);

        let displacement = self.system.advance(dt);
        self.write(displacement);
        self.record_progress();
        self.emit(MotionEvent::Updated);

        if self.system.is_at_rest() {
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

    fn apply_config(&mut self, config: &EngineConfig) {
        if !self.config_set {
            self.system.set_velocity_epsilon(config.physics.velocity_epsilon);
        }
    }

    fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    fn drain_events(&mut self) -> StatusEvents {
        self.events.drain()
    }
}

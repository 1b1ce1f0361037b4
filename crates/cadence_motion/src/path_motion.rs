//! Motions along a path
//!
//! Both motions drive a percent along a [`PathState`] and publish the resolved
//! point. `Updated` fires only for ticks that produced a point.
//!
//! Either one can reverse back along the path and repeat. A physics motion ends a
//! phase when it comes to rest.

use crate::easing::Easing;
use crate::motion::Motion;
use crate::moveable::{Moveable, StatusEvents};
use crate::path::{EdgeBehavior, PathState, Point};
use crate::physics::{PhysicsConfiguration, PhysicsSystem};
use cadence_core::{
    Animatable, EngineConfig, EventKind, EventListeners, EventQueue, MotionDirection, MotionEvent,
    MotionOptions, MotionState, PhysicsConfig, PropertyData, PropertyValue, Target, REPEAT_INFINITE,
};
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;
use tracing::{trace, warn};

const PERCENT: &str = "percent";

/// Host object holding the tweened percent
#[derive(Default)]
struct PathCursor {
    percent: f64,
}

impl Animatable for PathCursor {
    fn value(&self, path: &str) -> Option<PropertyValue> {
        (path == PERCENT).then_some(PropertyValue::scalar(self.percent))
    }

    fn set_value(&mut self, path: &str, value: PropertyValue) -> bool {
        match (path, value.as_scalar()) {
            (PERCENT, Some(percent)) => {
                self.percent = percent;
                true
            }
            _ => false,
        }
    }
}

/// Tween along a path from `start_edge` to `end_edge`
pub struct PathMotion {
    motion: Motion,
    cursor: Rc<RefCell<PathCursor>>,
    path_state: PathState,
    start_edge: f64,
    end_edge: f64,
    current_point: Option<Point>,
    listeners: EventListeners<PathMotion>,
    events: EventQueue,
}

impl PathMotion {
    pub fn new(path_state: PathState, duration: f64, easing: Easing) -> Self {
        let cursor = Rc::new(RefCell::new(PathCursor::default()));
        let target: Target = cursor.clone();
        let motion = Motion::new(
            &target,
            vec![PropertyData::from_to(PERCENT, 0.0, 1.0)],
            duration,
            easing,
        );

        Self {
            motion,
            cursor,
            path_state,
            start_edge: 0.0,
            end_edge: 1.0,
            current_point: None,
            listeners: EventListeners::new(),
            events: EventQueue::new(),
        }
    }

    /// Builder: travel between these percents instead of the full path
    pub fn with_edges(mut self, start_edge: f64, end_edge: f64) -> Self {
        self.start_edge = start_edge;
        self.end_edge = end_edge;
        if let Some(property) = self.motion.properties_mut().first_mut() {
            property.set_start(start_edge);
            property.set_end(end_edge);
        }
        self
    }

    /// Builder: reverse and repeat options
    pub fn with_options(mut self, options: MotionOptions) -> Self {
        self.motion = self.motion.with_options(MotionOptions {
            additive: false,
            ..options
        });
        self
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.motion = self.motion.with_delay(delay);
        self
    }

    pub fn with_reverse_easing(mut self, easing: Easing) -> Self {
        self.motion = self.motion.with_reverse_easing(easing);
        self
    }

    pub fn with_repeat_cycles(mut self, cycles: u32) -> Self {
        self.motion = self.motion.with_repeat_cycles(cycles);
        self
    }

    pub fn with_edge_behavior(mut self, behavior: EdgeBehavior) -> Self {
        self.path_state.set_edge_behavior(behavior);
        self
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&PathMotion, &MotionEvent) + 'static,
    {
        self.listeners.on(kind, listener);
    }

    /// Point resolved by the most recent tick
    pub fn current_point(&self) -> Option<Point> {
        self.current_point
    }

    /// Percent written by the most recent tick, before edge handling
    pub fn percent(&self) -> f64 {
        self.cursor.borrow().percent
    }

    pub fn start_edge(&self) -> f64 {
        self.start_edge
    }

    pub fn end_edge(&self) -> f64 {
        self.end_edge
    }

    pub fn path_state(&self) -> &PathState {
        &self.path_state
    }

    pub fn path_state_mut(&mut self) -> &mut PathState {
        &mut self.path_state
    }

    /// Build the path lookup table; complete before this returns
    pub fn setup_performance_mode(&mut self, capacity: Option<usize>) {
        self.path_state.setup_performance_mode(capacity);
    }

    fn emit(&mut self, event: MotionEvent) {
        self.events.push(event);
        let mut listeners = mem::take(&mut self.listeners);
        listeners.dispatch(self, &event);
        self.listeners = listeners;
    }

    /// Re-emit the inner motion's status events as our own
    fn forward_events(&mut self) {
        for event in self.motion.drain_events() {
            self.emit(event);
        }
    }
}

impl Moveable for PathMotion {
    fn start(&mut self) {
        self.motion.start();
        self.forward_events();
    }

    fn start_at(&mut self, timestamp: f64) {
        self.motion.start_at(timestamp);
        self.forward_events();
    }

    fn stop(&mut self) {
        self.motion.stop();
        self.forward_events();
    }

    fn pause(&mut self) {
        self.motion.pause();
        self.forward_events();
    }

    fn resume(&mut self) {
        self.motion.resume();
        self.forward_events();
    }

    fn reset(&mut self) {
        self.motion.reset();
        self.current_point = None;
        self.events.clear();
    }

    fn update(&mut self, timestamp: f64) {
        if !self.motion.motion_state().is_running() {
            return;
        }

        self.motion.update(timestamp);
        let percent = self.percent();
        let point = self.path_state.move_point(percent, self.start_edge, self.end_edge);

        // Status events from the inner motion follow the point update
        let status = self.motion.drain_events();
        if let Some(point) = point {
            self.current_point = Some(point);
            self.emit(MotionEvent::Updated);
        } else {
            trace!(percent, "no point for percent");
        }
        for event in status {
            self.emit(event);
        }
    }

    fn motion_state(&self) -> MotionState {
        self.motion.motion_state()
    }

    fn total_progress(&self) -> f64 {
        self.motion.total_progress()
    }

    fn reverses(&self) -> bool {
        self.motion.reverses()
    }

    fn set_reverses(&mut self, reverses: bool) {
        self.motion.set_reverses(reverses);
    }

    fn repeats(&self) -> bool {
        self.motion.repeats()
    }

    fn set_repeats(&mut self, repeats: bool) {
        self.motion.set_repeats(repeats);
    }

    fn set_direction(&mut self, direction: MotionDirection) {
        self.motion.set_direction(direction);
    }

    fn apply_config(&mut self, config: &EngineConfig) {
        self.motion.apply_config(config);
        self.path_state.apply_config(&config.path);
    }

    fn finished_at(&self) -> Option<f64> {
        self.motion.finished_at()
    }

    fn drain_events(&mut self) -> StatusEvents {
        self.events.drain()
    }
}

/// Physics-driven travel along a path
///
/// With [`EdgeBehavior::StopAtEdges`] the percent is bounded by the edges: it
/// bounces when the configuration has a restitution and comes to rest at the edge
/// otherwise. With [`EdgeBehavior::ContiguousEdges`] it wraps around.
pub struct PathPhysicsMotion {
    path_state: PathState,
    system: PhysicsSystem,
    percent: f64,
    start_edge: f64,
    end_edge: f64,
    current_point: Option<Point>,
    state: MotionState,
    resume_state: MotionState,
    direction: MotionDirection,
    options: MotionOptions,
    repeat_cycles: u32,
    cycles_completed: u32,
    in_second_phase: bool,
    last_timestamp: Option<f64>,
    finished_at: Option<f64>,
    total_progress: f64,
    /// Physics settings were given at construction
    config_set: bool,
    listeners: EventListeners<PathPhysicsMotion>,
    events: EventQueue,
}

impl PathPhysicsMotion {
    pub fn new(path_state: PathState, configuration: PhysicsConfiguration) -> Self {
        let mut motion = Self::with_config(path_state, configuration, &EngineConfig::default().physics);
        motion.config_set = false;
        motion
    }

    pub fn with_config(path_state: PathState, configuration: PhysicsConfiguration, config: &PhysicsConfig) -> Self {
        Self {
            path_state,
            system: PhysicsSystem::with_config(configuration, config),
            percent: 0.0,
            start_edge: 0.0,
            end_edge: 1.0,
            current_point: None,
            state: MotionState::Stopped,
            resume_state: MotionState::Moving,
            direction: MotionDirection::Forward,
            options: MotionOptions::NONE,
            repeat_cycles: REPEAT_INFINITE,
            cycles_completed: 0,
            in_second_phase: false,
            last_timestamp: None,
            finished_at: None,
            total_progress: 0.0,
            config_set: true,
            listeners: EventListeners::new(),
            events: EventQueue::new(),
        }
    }

    pub fn with_edges(mut self, start_edge: f64, end_edge: f64) -> Self {
        self.start_edge = start_edge;
        self.end_edge = end_edge;
        self
    }

    /// Builder: reverse and repeat options; additive blending is not supported
    pub fn with_options(mut self, options: MotionOptions) -> Self {
        if options.additive {
            warn!("path physics motions do not blend additively");
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

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn with_edge_behavior(mut self, behavior: EdgeBehavior) -> Self {
        self.path_state.set_edge_behavior(behavior);
        self
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&PathPhysicsMotion, &MotionEvent) + 'static,
    {
        self.listeners.on(kind, listener);
    }

    pub fn current_point(&self) -> Option<Point> {
        self.current_point
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn velocity(&self) -> f64 {
        self.system.velocity()
    }

    /// Edge hits in the current run
    pub fn collisions(&self) -> u32 {
        self.system.collisions()
    }

    pub fn path_state(&self) -> &PathState {
        &self.path_state
    }

    pub fn setup_performance_mode(&mut self, capacity: Option<usize>) {
        self.path_state.setup_performance_mode(capacity);
    }

    fn emit(&mut self, event: MotionEvent) {
        self.events.push(event);
        let mut listeners = mem::take(&mut self.listeners);
        listeners.dispatch(self, &event);
        self.listeners = listeners;
    }

    fn configure_bounds(&mut self) {
        match self.path_state.edge_behavior() {
            EdgeBehavior::StopAtEdges => self.system.set_bounds(self.start_edge, self.end_edge),
            EdgeBehavior::ContiguousEdges => self.system.clear_bounds(),
        }
    }

    fn phase_state(&self) -> MotionState {
        if self.system.velocity() < 0.0 {
            MotionState::Reversing
        } else {
            MotionState::Moving
        }
    }

    /// Percent a cycle starts from
    fn origin(&self) -> f64 {
        match self.direction {
            MotionDirection::Forward => self.start_edge,
            MotionDirection::Reverse => self.end_edge,
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
            trace!(percent = self.percent, "path physics reversed");
            self.emit(MotionEvent::Reversed);
            return;
        }

        let remaining = self.options.repeats
            && (self.repeat_cycles == REPEAT_INFINITE || self.cycles_completed < self.repeat_cycles);
        if remaining {
            self.cycles_completed += 1;
            self.in_second_phase = false;
            self.percent = self.origin();
            self.system.reset(reverse);
            self.state = self.phase_state();
            trace!(cycle = self.cycles_completed, "path physics repeated");
            self.emit(MotionEvent::Repeated);
            return;
        }

        self.state = MotionState::Complete;
        self.total_progress = 1.0;
        self.finished_at = self.last_timestamp;
        trace!(percent = self.percent, "path physics at rest");
        self.emit(MotionEvent::Completed);
    }
}

impl Moveable for PathPhysicsMotion {
    fn start(&mut self) {
        if self.state != MotionState::Stopped {
            return;
        }
        self.configure_bounds();
        self.system.reset(self.direction == MotionDirection::Reverse);
        self.percent = self.origin();
        self.cycles_completed = 0;
        self.in_second_phase = false;
        self.last_timestamp = None;
        self.finished_at = None;
        self.total_progress = 0.0;
        self.current_point = None;
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
        self.last_timestamp = None;
        self.state = self.resume_state;
        self.emit(MotionEvent::Resumed);
    }

    fn reset(&mut self) {
        self.system.reset(false);
        self.percent = self.start_edge;
        self.current_point = None;
        self.cycles_completed = 0;
        self.in_second_phase = false;
        self.last_timestamp = None;
        self.finished_at = None;
        self.total_progress = 0.0;
        self.state = MotionState::Stopped;
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

        self.percent = match self.path_state.edge_behavior() {
            EdgeBehavior::StopAtEdges => self.system.step(self.percent, dt),
            EdgeBehavior::ContiguousEdges => (self.percent + self.system.advance(dt)).rem_euclid(1.0),
        };
        self.state = self.phase_state();
        self.record_progress();

        if let Some(point) = self
            .path_state
            .move_point(self.percent, self.start_edge, self.end_edge)
        {
            self.current_point = Some(point);
            self.emit(MotionEvent::Updated);
        }

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
        self.path_state.apply_config(&config.path);
    }

    fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    fn drain_events(&mut self) -> StatusEvents {
        self.events.drain()
    }
}

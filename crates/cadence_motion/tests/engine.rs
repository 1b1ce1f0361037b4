//! Integration tests for the motion engine driven by a tempo
//!
//! These tests verify that:
//! - Motions land exactly on their end values and report completion
//! - Stop is idempotent and pause/resume preserves elapsed-time accounting
//! - Overlapping additive motions seed from the most recent registration
//! - Path length, sampling, lookup tables and contiguous edges agree
//! - Contiguous sequences run forward then backward across step boundaries
//! - A reversing group finishes on the same frame as a lone reversing motion

use cadence_core::{
    into_target, Animatable, EventKind, ManualTempo, MotionOptions, MotionState, PropertyData, PropertyState,
    PropertyValue, SharedDelegate, Target, Tempo, TempoConfig, ValueStore,
};
use cadence_motion::{
    EdgeBehavior, Easing, Group, Motion, MotionScheduler, Moveable, PathBuilder, PathMotion, PathState,
    PhysicsConfiguration, PhysicsMotion, Point, ReversingMode, Sequence,
};
use std::cell::RefCell;
use std::rc::Rc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn scalar_store(path: &str, value: f64) -> (Rc<RefCell<ValueStore>>, Target) {
    let store = Rc::new(RefCell::new(
        ValueStore::new().with(path, PropertyValue::scalar(value)),
    ));
    let target: Target = store.clone();
    (store, target)
}

fn tween(target: &Target, from: f64, to: f64, duration: f64) -> Motion {
    Motion::new(
        target,
        vec![PropertyData::from_to("x", from, to)],
        duration,
        Easing::Linear,
    )
}

/// A scheduler behind a manual tempo ticking at `fps`
fn driven(fps: u32) -> (Rc<RefCell<MotionScheduler>>, ManualTempo) {
    let scheduler = Rc::new(RefCell::new(MotionScheduler::new()));
    let delegate: SharedDelegate = scheduler.clone();
    let mut tempo = ManualTempo::with_config(&TempoConfig { fps });
    tempo.set_delegate(Some(&delegate));
    (scheduler, tempo)
}

#[test]
fn test_motion_lands_on_end_values() {
    init_tracing();
    let target = into_target(ValueStore::new().with("position", PropertyValue::point(0.0, 0.0)));
    let motion = Motion::from_states(
        &target,
        &[PropertyState::new("position", PropertyValue::point(100.0, 50.0))],
        1.0,
        Easing::EaseOutElastic,
    );

    let (scheduler, mut tempo) = driven(60);
    let id = scheduler.borrow_mut().add(motion);
    scheduler.borrow_mut().start(id);

    tempo.beat(0.0);
    tempo.beat(0.4);
    tempo.beat(1.5);

    assert_eq!(
        target.borrow().value("position"),
        Some(PropertyValue::point(100.0, 50.0))
    );
    let scheduler = scheduler.borrow();
    assert_eq!(
        scheduler.get(id).map(|m| m.motion_state()),
        Some(MotionState::Complete)
    );
    assert!(!scheduler.has_active_motions());
}

#[test]
fn test_easing_boundaries_are_exact() {
    let catalogue = [
        Easing::Linear,
        Easing::EaseInOut,
        Easing::EaseInBack,
        Easing::EaseOutBack,
        Easing::EaseInOutElastic,
        Easing::EaseOutBounce,
        Easing::EaseInExpo,
        Easing::CubicBezier(0.68, -0.55, 0.27, 1.55),
    ];

    for easing in catalogue {
        assert_eq!(easing.apply(0.0), 0.0, "{easing:?} at 0");
        assert_eq!(easing.apply(1.0), 1.0, "{easing:?} at 1");
    }
}

#[test]
fn test_stop_twice_matches_stop_once() {
    let (once_values, once_target) = scalar_store("x", 0.0);
    let (twice_values, twice_target) = scalar_store("x", 0.0);
    let mut once = tween(&once_target, 0.0, 10.0, 1.0);
    let mut twice = tween(&twice_target, 0.0, 10.0, 1.0);

    let stops = Rc::new(RefCell::new(0));
    let counter = stops.clone();
    twice.on(EventKind::Stopped, move |_, _| *counter.borrow_mut() += 1);

    for motion in [&mut once, &mut twice] {
        motion.start();
        motion.update(0.0);
        motion.update(0.3);
    }
    once.stop();
    twice.stop();
    twice.stop();

    assert_eq!(once.motion_state(), twice.motion_state());
    assert_eq!(once.motion_state(), MotionState::Stopped);
    assert_eq!(once_values.borrow().scalar("x"), twice_values.borrow().scalar("x"));
    assert_eq!(once.drain_events().as_slice(), twice.drain_events().as_slice());
    assert_eq!(*stops.borrow(), 1);
}

#[test]
fn test_pause_resume_matches_shifted_run() {
    let (paused_values, paused_target) = scalar_store("x", 0.0);
    let (plain_values, plain_target) = scalar_store("x", 0.0);
    let mut paused = tween(&paused_target, 0.0, 10.0, 2.0).with_options(MotionOptions::NONE);
    let mut plain = tween(&plain_target, 0.0, 10.0, 2.0);

    paused.start();
    paused.update(0.0);
    paused.update(0.25);
    paused.pause();
    paused.update(0.5);
    paused.resume();
    paused.update(0.75);
    paused.update(1.25);

    // Pause gap runs from 0.25 to 0.75
    plain.start();
    plain.update(0.0);
    plain.update(0.75);

    assert_eq!(paused_values.borrow().scalar("x"), plain_values.borrow().scalar("x"));
    assert_eq!(paused.total_progress(), plain.total_progress());
}

#[test]
fn test_latest_additive_motion_wins() {
    init_tracing();
    let (values, target) = scalar_store("x", 0.0);
    let additive = MotionOptions::additive();

    let (scheduler, mut tempo) = driven(60);
    let first = scheduler
        .borrow_mut()
        .add(tween(&target, 0.0, 10.0, 1.0).with_options(additive));
    let second = scheduler
        .borrow_mut()
        .add(tween(&target, 0.0, 20.0, 1.0).with_options(additive));

    scheduler.borrow_mut().start(first);
    tempo.beat(0.0);
    assert_eq!(scheduler.borrow().registry().target_value(&target, "x"), Some(10.0));

    scheduler.borrow_mut().start(second);
    tempo.beat(0.5);
    {
        let scheduler = scheduler.borrow();
        let ids = scheduler.registry().operation_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
        assert_eq!(scheduler.registry().target_value(&target, "x"), Some(20.0));
    }

    tempo.beat(2.0);
    // Both deltas of +10 land on the live value
    assert_eq!(values.borrow().scalar("x"), Some(20.0));
    assert!(scheduler.borrow().registry().is_empty());
}

#[test]
fn test_group_and_sequence_share_the_tick() {
    let (a_values, a) = scalar_store("x", 0.0);
    let (b_values, b) = scalar_store("x", 0.0);

    let group = Group::new()
        .with(tween(&a, 0.0, 1.0, 1.0))
        .with(Sequence::new().with(tween(&b, 0.0, 1.0, 0.5)).with(tween(&b, 1.0, 3.0, 0.5)));

    let (scheduler, mut tempo) = driven(4);
    let id = scheduler.borrow_mut().add(group);
    scheduler.borrow_mut().start(id);

    tempo.beat(0.0);
    tempo.advance_frames(2);
    assert_eq!(a_values.borrow().scalar("x"), Some(0.5));
    assert_eq!(b_values.borrow().scalar("x"), Some(1.0));

    tempo.advance_frames(2);
    assert_eq!(a_values.borrow().scalar("x"), Some(1.0));
    assert_eq!(b_values.borrow().scalar("x"), Some(3.0));
    assert!(scheduler.borrow().get(id).is_some_and(|g| g.is_complete()));
}

#[test]
fn test_reversing_group_finishes_with_lone_motion() {
    let (_a_values, a) = scalar_store("x", 0.0);
    let (_b_values, b) = scalar_store("x", 0.0);

    let (scheduler, mut tempo) = driven(60);
    let alone = scheduler
        .borrow_mut()
        .add(tween(&a, 0.0, 1.0, 1.0).with_options(MotionOptions::reversing()));
    let group = scheduler.borrow_mut().add(
        Group::new()
            .with(tween(&b, 0.0, 1.0, 1.0))
            .with_options(MotionOptions::reversing()),
    );
    scheduler.borrow_mut().start(alone);
    scheduler.borrow_mut().start(group);

    tempo.beat(0.0);
    let mut finished = [None, None];
    for frame in 1..=240 {
        tempo.advance_frames(1);
        let scheduler = scheduler.borrow();
        for (slot, id) in finished.iter_mut().zip([alone, group]) {
            if slot.is_none() && scheduler.get(id).is_some_and(|m| m.is_complete()) {
                *slot = Some(frame);
            }
        }
    }

    assert!(finished[0].is_some());
    assert_eq!(finished[0], finished[1]);
}

#[test]
fn test_contiguous_sequence_reversal() {
    let (values, target) = scalar_store("x", 0.0);
    let sequence = Sequence::new()
        .with(tween(&target, 0.0, 10.0, 1.0))
        .with(tween(&target, 10.0, 20.0, 1.0))
        .with_options(MotionOptions::reversing())
        .with_reversing_mode(ReversingMode::Contiguous);

    let (scheduler, mut tempo) = driven(2);
    let id = scheduler.borrow_mut().add(sequence);
    scheduler.borrow_mut().start(id);

    tempo.beat(0.0);
    let mut timeline = vec![values.borrow().scalar("x").unwrap_or_default()];
    for _ in 0..8 {
        tempo.advance_frames(1);
        timeline.push(values.borrow().scalar("x").unwrap_or_default());
    }

    // Step 2's end is visited once, and step 1 never bounces on the way out
    let peak = timeline.iter().position(|x| *x == 20.0);
    assert_eq!(peak, Some(4));
    assert!(timeline[..4].windows(2).all(|w| w[0] <= w[1]));
    assert!(timeline[4..].windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(timeline.last(), Some(&0.0));
    assert!(scheduler.borrow().get(id).is_some_and(|s| s.is_complete()));
}

#[test]
fn test_straight_line_length_and_midpoint() {
    let path = PathBuilder::new().move_to(0.0, 0.0).line_to(3.0, 4.0).build();
    let state = PathState::new(path.clone());

    assert_eq!(state.calculate_length(path.elements()), Ok(5.0));
    let mid = state.point(0.5).unwrap();
    assert!((mid.x - 1.5).abs() < 1e-12);
    assert!((mid.y - 2.0).abs() < 1e-12);
    assert_eq!(state.point(1.5), None);
}

#[test]
fn test_lookup_table_matches_direct_sampling() {
    let path = PathBuilder::new()
        .move_to(0.0, 0.0)
        .cubic_to(100.0, 300.0, 300.0, -200.0, 400.0, 100.0)
        .line_to(600.0, 100.0)
        .quad_to(700.0, 0.0, 800.0, 100.0)
        .build();
    let mut state = PathState::new(path);
    state.setup_performance_mode(None);
    assert!(state.is_performance_mode());

    let tolerance = state.length() * 0.01;
    for i in 0..=200 {
        let p = i as f64 / 200.0;
        let direct = state.point(p).unwrap();
        let lookup = state.lookup_point(p).unwrap();
        assert!(
            direct.distance(lookup) < tolerance,
            "p = {p}: {direct:?} vs {lookup:?}"
        );
    }
}

#[test]
fn test_contiguous_edges_wrap_overshoot() {
    let path = PathBuilder::new()
        .move_to(0.0, 0.0)
        .line_to(100.0, 0.0)
        .line_to(100.0, 100.0)
        .build();
    let mut state = PathState::new(path);
    state.set_edge_behavior(EdgeBehavior::ContiguousEdges);

    let wrapped = state.move_point(1.1, 0.0, 1.0).unwrap();
    let direct = state.move_point(0.1, 0.0, 1.0).unwrap();
    assert!(wrapped.distance(direct) < 1e-9);

    state.set_edge_behavior(EdgeBehavior::StopAtEdges);
    assert_eq!(state.move_point(1.1, 0.0, 1.0), Some(Point::new(100.0, 100.0)));
}

#[test]
fn test_path_motion_under_scheduler() {
    let path = PathBuilder::new().move_to(0.0, 0.0).line_to(10.0, 0.0).build();
    let mut motion = PathMotion::new(PathState::new(path), 1.0, Easing::Linear);
    motion.setup_performance_mode(None);

    let points = Rc::new(RefCell::new(Vec::new()));
    let sink = points.clone();
    motion.on(EventKind::Updated, move |m, _| {
        if let Some(point) = m.current_point() {
            sink.borrow_mut().push(point);
        }
    });

    let (scheduler, mut tempo) = driven(4);
    let id = scheduler.borrow_mut().add(motion);
    scheduler.borrow_mut().start(id);
    tempo.beat(0.0);
    tempo.advance_frames(4);

    let points = points.borrow();
    assert_eq!(points.len(), 5);
    assert_eq!(points.first(), Some(&Point::new(0.0, 0.0)));
    assert_eq!(points.last(), Some(&Point::new(10.0, 0.0)));
}

#[test]
fn test_physics_motion_settles() {
    let (values, target) = scalar_store("x", 0.0);
    let motion = PhysicsMotion::new(
        &target,
        vec![PropertyData::to("x", 0.0)],
        PhysicsConfiguration::new(10.0, 0.9),
    );

    let (scheduler, mut tempo) = driven(60);
    let id = scheduler.borrow_mut().add(motion);
    scheduler.borrow_mut().start(id);
    tempo.beat(0.0);
    for _ in 0..60 * 10 {
        tempo.advance_frames(1);
        if !scheduler.borrow().has_active_motions() {
            break;
        }
    }

    assert!(scheduler.borrow().get(id).is_some_and(|m| m.is_complete()));
    let x = values.borrow().scalar("x").unwrap_or_default();
    // Travel approaches v0 / ln(1 / (1 - friction))
    let limit = 10.0 / (1.0f64 / 0.1).ln();
    assert!(x > 0.0 && x < limit, "x = {x}");
    assert_eq!(scheduler.borrow_mut().remove_finished(), 1);
}

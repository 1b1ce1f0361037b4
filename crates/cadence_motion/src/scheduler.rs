//! Motion scheduler
//!
//! Owns every registered moveable and the shared additive registry, and advances
//! them on each tempo beat.

use crate::additive::AdditiveRegistry;
use crate::moveable::Moveable;
use cadence_core::{EngineConfig, MotionEvent, TempoDelegate};
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace, warn};

new_key_type! {
    pub struct MoveableId;
}

/// The scheduler that ticks all registered moveables
pub struct MotionScheduler {
    moveables: SlotMap<MoveableId, Box<dyn Moveable>>,
    order: Vec<MoveableId>,
    registry: AdditiveRegistry,
    last_beat: Option<f64>,
    config: EngineConfig,
}

impl MotionScheduler {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            moveables: SlotMap::with_key(),
            order: Vec::new(),
            registry: AdditiveRegistry::new(),
            last_beat: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a moveable. It is bound to the scheduler's additive registry, takes
    /// its unset defaults from the scheduler's config, and is ticked after every
    /// moveable added before it.
    pub fn add<M: Moveable + 'static>(&mut self, moveable: M) -> MoveableId {
        self.add_boxed(Box::new(moveable))
    }

    pub fn add_boxed(&mut self, mut moveable: Box<dyn Moveable>) -> MoveableId {
        moveable.bind_registry(&self.registry);
        moveable.apply_config(&self.config);
        let id = self.moveables.insert(moveable);
        self.order.push(id);
        id
    }

    pub fn get(&self, id: MoveableId) -> Option<&dyn Moveable> {
        self.moveables.get(id).map(|m| m.as_ref())
    }

    pub fn get_mut(&mut self, id: MoveableId) -> Option<&mut (dyn Moveable + 'static)> {
        self.moveables.get_mut(id).map(|m| m.as_mut())
    }

    /// Run `f` against a moveable, then flush the status events it emitted
    pub fn with_moveable_mut<R>(
        &mut self,
        id: MoveableId,
        f: impl FnOnce(&mut dyn Moveable) -> R,
    ) -> Option<R> {
        let moveable = self.moveables.get_mut(id)?;
        let result = f(moveable.as_mut());
        for event in moveable.drain_events() {
            trace!(?id, ?event, "status");
        }
        Some(result)
    }

    pub fn remove(&mut self, id: MoveableId) -> Option<Box<dyn Moveable>> {
        let moveable = self.moveables.remove(id)?;
        self.order.retain(|other| *other != id);
        Some(moveable)
    }

    /// Start a registered moveable; `false` if the id is unknown
    pub fn start(&mut self, id: MoveableId) -> bool {
        self.with_moveable_mut(id, |moveable| moveable.start()).is_some()
    }

    /// Advance every moveable to `timestamp`, in insertion order.
    ///
    /// A beat earlier than the previous one is ignored.
    pub fn tick(&mut self, timestamp: f64) {
        if let Some(last) = self.last_beat {
            if timestamp < last {
                warn!(timestamp, last, "ignoring non-monotonic beat");
                return;
            }
        }
        self.last_beat = Some(timestamp);

        for &id in &self.order {
            let Some(moveable) = self.moveables.get_mut(id) else {
                continue;
            };
            moveable.update(timestamp);
            for event in moveable.drain_events() {
                if let MotionEvent::Completed = event {
                    debug!(?id, timestamp, "moveable completed");
                } else {
                    trace!(?id, ?event, "status");
                }
            }
        }
    }

    /// Check if any moveable is running or paused
    pub fn has_active_motions(&self) -> bool {
        self.moveables
            .values()
            .any(|moveable| moveable.motion_state().is_active())
    }

    /// Drop every completed moveable and prune released additive entries.
    /// Returns the number of moveables removed.
    pub fn remove_finished(&mut self) -> usize {
        let finished: Vec<MoveableId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.moveables.get(*id).is_some_and(|m| m.is_complete()))
            .collect();

        for id in &finished {
            self.remove(*id);
        }
        let pruned = self.registry.prune();
        if !finished.is_empty() || pruned > 0 {
            debug!(removed = finished.len(), pruned, "removed finished moveables");
        }
        finished.len()
    }

    pub fn registry(&self) -> &AdditiveRegistry {
        &self.registry
    }

    /// Iterate over moveables in tick order
    pub fn iter(&self) -> impl Iterator<Item = (MoveableId, &dyn Moveable)> {
        self.order
            .iter()
            .filter_map(|id| self.moveables.get(*id).map(|m| (*id, m.as_ref())))
    }

    pub fn len(&self) -> usize {
        self.moveables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moveables.is_empty()
    }

    /// Timestamp of the most recent accepted beat
    pub fn last_beat(&self) -> Option<f64> {
        self.last_beat
    }
}

impl Default for MotionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoDelegate for MotionScheduler {
    fn tempo_beat_update(&mut self, timestamp: f64) {
        self.tick(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;
    use crate::group::Group;
    use crate::motion::Motion;
    use cadence_core::{
        into_target, ManualTempo, MotionOptions, MotionState, PropertyData, PropertyValue,
        SharedDelegate, Target, Tempo, ValueStore,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store(value: f64) -> (Rc<RefCell<ValueStore>>, Target) {
        let store = Rc::new(RefCell::new(
            ValueStore::new().with("x", PropertyValue::scalar(value)),
        ));
        let target: Target = store.clone();
        (store, target)
    }

    fn tween(target: &Target, from: f64, to: f64) -> Motion {
        Motion::new(
            target,
            vec![PropertyData::from_to("x", from, to)],
            1.0,
            Easing::Linear,
        )
    }

    #[test]
    fn test_tick_drives_moveables() {
        let (values, target) = store(0.0);
        let mut scheduler = MotionScheduler::new();
        let id = scheduler.add(tween(&target, 0.0, 10.0));

        assert!(scheduler.start(id));
        scheduler.tick(0.0);
        scheduler.tick(0.5);
        assert_eq!(values.borrow().scalar("x"), Some(5.0));
        assert!(scheduler.has_active_motions());

        scheduler.tick(1.0);
        assert_eq!(values.borrow().scalar("x"), Some(10.0));
        assert!(!scheduler.has_active_motions());
        assert_eq!(scheduler.get(id).map(|m| m.motion_state()), Some(MotionState::Complete));
    }

    #[test]
    fn test_non_monotonic_beat_ignored() {
        let (values, target) = store(0.0);
        let mut scheduler = MotionScheduler::new();
        let id = scheduler.add(tween(&target, 0.0, 10.0));
        scheduler.start(id);

        scheduler.tick(0.0);
        scheduler.tick(0.5);
        scheduler.tick(0.25);
        assert_eq!(scheduler.last_beat(), Some(0.5));
        assert_eq!(values.borrow().scalar("x"), Some(5.0));
    }

    #[test]
    fn test_insertion_order_is_tick_order() {
        let (values, target) = store(0.0);
        let mut scheduler = MotionScheduler::new();
        let first = scheduler.add(tween(&target, 0.0, 10.0));
        let second = scheduler.add(tween(&target, 0.0, 20.0));
        scheduler.start(first);
        scheduler.start(second);

        scheduler.tick(0.0);
        scheduler.tick(1.0);
        assert_eq!(values.borrow().scalar("x"), Some(20.0));

        let ids: Vec<_> = scheduler.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn test_remove_finished() {
        let (_values, target) = store(0.0);
        let mut scheduler = MotionScheduler::new();
        let done = scheduler.add(tween(&target, 0.0, 1.0));
        let idle = scheduler.add(tween(&target, 1.0, 0.0));
        scheduler.start(done);

        scheduler.tick(0.0);
        scheduler.tick(1.0);

        assert_eq!(scheduler.remove_finished(), 1);
        assert!(scheduler.get(done).is_none());
        assert!(scheduler.get(idle).is_some());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_additive_motions_share_registry() {
        let (values, target) = store(0.0);
        let mut scheduler = MotionScheduler::new();
        let additive = MotionOptions::additive();

        let a = scheduler.add(tween(&target, 0.0, 10.0).with_options(additive));
        scheduler.start(a);
        assert_eq!(scheduler.registry().len(), 1);

        scheduler.tick(0.0);
        scheduler.tick(1.0);
        assert_eq!(values.borrow().scalar("x"), Some(10.0));
        assert!(scheduler.registry().is_empty());
    }

    #[test]
    fn test_config_weighting_reaches_added_motions() {
        let config = EngineConfig::from_toml_str("[motion]\ndefault_additive_weighting = 0.5\n").unwrap();
        let (_values, target) = store(0.0);
        let mut scheduler = MotionScheduler::with_config(config);

        let id = scheduler.add(tween(&target, 0.0, 10.0).with_options(MotionOptions::additive()));
        scheduler.start(id);
        assert_eq!(scheduler.registry().target_value(&target, "x"), Some(5.0));
        scheduler.remove(id);

        let nested = Group::new().with(tween(&target, 0.0, 20.0).with_options(MotionOptions::additive()));
        let id = scheduler.add(nested);
        scheduler.start(id);
        assert_eq!(scheduler.registry().target_value(&target, "x"), Some(10.0));
    }

    #[test]
    fn test_driven_by_tempo() {
        let (values, target) = store(0.0);
        let scheduler = Rc::new(RefCell::new(MotionScheduler::new()));
        let id = scheduler.borrow_mut().add(tween(&target, 0.0, 10.0));
        scheduler.borrow_mut().start(id);

        let delegate: SharedDelegate = scheduler.clone();
        let mut tempo = ManualTempo::new();
        tempo.set_delegate(Some(&delegate));

        tempo.beat(0.0);
        tempo.beat(0.5);
        assert_eq!(values.borrow().scalar("x"), Some(5.0));

        tempo.cleanup_resources();
        tempo.beat(1.0);
        assert_eq!(values.borrow().scalar("x"), Some(5.0));
    }

    #[test]
    fn test_with_moveable_mut() {
        let target = into_target(ValueStore::new().with("x", PropertyValue::scalar(0.0)));
        let mut scheduler = MotionScheduler::new();
        let id = scheduler.add(tween(&target, 0.0, 1.0));

        let state = scheduler.with_moveable_mut(id, |m| {
            m.start();
            m.motion_state()
        });
        assert_eq!(state, Some(MotionState::Moving));

        scheduler.remove(id);
        assert!(scheduler.with_moveable_mut(id, |m| m.stop()).is_none());
    }
}

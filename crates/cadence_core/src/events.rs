//! Motion lifecycle events
//!
//! Two channels carry lifecycle information:
//!
//! - [`EventListeners`]: user callbacks, invoked synchronously inside the tick
//!   (or control call) that produced the event.
//! - [`EventQueue`]: the status channel between a child moveable and the collection
//!   that drives it. The parent drains the child's queue right after each call.
//!
//! `Updated` events go to listeners only; every other event is also queued.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// A lifecycle event emitted by a moveable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionEvent {
    Started,
    Stopped,
    Updated,
    Paused,
    Resumed,
    /// Turned around at the end of a forward phase
    Reversed,
    /// Began another cycle
    Repeated,
    Completed,
    /// A sequence step finished
    StepCompleted { index: usize },
}

/// Field-less discriminant of [`MotionEvent`], used to key listeners
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Started,
    Stopped,
    Updated,
    Paused,
    Resumed,
    Reversed,
    Repeated,
    Completed,
    StepCompleted,
}

impl MotionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MotionEvent::Started => EventKind::Started,
            MotionEvent::Stopped => EventKind::Stopped,
            MotionEvent::Updated => EventKind::Updated,
            MotionEvent::Paused => EventKind::Paused,
            MotionEvent::Resumed => EventKind::Resumed,
            MotionEvent::Reversed => EventKind::Reversed,
            MotionEvent::Repeated => EventKind::Repeated,
            MotionEvent::Completed => EventKind::Completed,
            MotionEvent::StepCompleted { .. } => EventKind::StepCompleted,
        }
    }

    /// Whether the event belongs on the status channel
    pub fn is_status(&self) -> bool {
        !matches!(self, MotionEvent::Updated)
    }
}

/// Listener callback type
pub type Listener<T> = Box<dyn FnMut(&T, &MotionEvent)>;

/// Per-kind listener lists for a moveable of type `T`
pub struct EventListeners<T: ?Sized> {
    handlers: FxHashMap<EventKind, SmallVec<[Listener<T>; 1]>>,
}

impl<T: ?Sized> EventListeners<T> {
    pub fn new() -> Self {
        Self {
            handlers: FxHashMap::default(),
        }
    }

    /// Register a listener for an event kind
    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&T, &MotionEvent) + 'static,
    {
        self.handlers
            .entry(kind)
            .or_default()
            .push(Box::new(listener));
    }

    /// Invoke every listener registered for the event's kind, in registration order
    pub fn dispatch(&mut self, target: &T, event: &MotionEvent) {
        if let Some(listeners) = self.handlers.get_mut(&event.kind()) {
            for listener in listeners.iter_mut() {
                listener(target, event);
            }
        }
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.handlers.get(&kind).is_some_and(|l| !l.is_empty())
    }

    /// Total number of registered listeners
    pub fn len(&self) -> usize {
        self.handlers.values().map(|l| l.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl<T: ?Sized> Default for EventListeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue of status events waiting for the driving parent
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    events: SmallVec<[MotionEvent; 4]>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event; `Updated` is ignored
    pub fn push(&mut self, event: MotionEvent) {
        if event.is_status() {
            self.events.push(event);
        }
    }

    /// Take every queued event, oldest first
    pub fn drain(&mut self) -> SmallVec<[MotionEvent; 4]> {
        std::mem::take(&mut self.events)
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotionEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Dummy {
        name: &'static str,
    }

    #[test]
    fn test_dispatch_by_kind() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = EventListeners::<Dummy>::new();

        let seen_clone = seen.clone();
        listeners.on(EventKind::Completed, move |target, event| {
            seen_clone.borrow_mut().push((target.name, *event));
        });

        let dummy = Dummy { name: "fade" };
        listeners.dispatch(&dummy, &MotionEvent::Started);
        listeners.dispatch(&dummy, &MotionEvent::Completed);

        assert_eq!(*seen.borrow(), vec![("fade", MotionEvent::Completed)]);
        assert!(listeners.has_listeners(EventKind::Completed));
        assert!(!listeners.has_listeners(EventKind::Started));
    }

    #[test]
    fn test_step_completed_kind() {
        let event = MotionEvent::StepCompleted { index: 3 };
        assert_eq!(event.kind(), EventKind::StepCompleted);
    }

    #[test]
    fn test_queue_skips_updates() {
        let mut queue = EventQueue::new();
        queue.push(MotionEvent::Started);
        queue.push(MotionEvent::Updated);
        queue.push(MotionEvent::Completed);

        assert_eq!(queue.len(), 2);
        assert!(queue.contains(EventKind::Completed));

        let drained = queue.drain();
        assert_eq!(drained.as_slice(), &[MotionEvent::Started, MotionEvent::Completed]);
        assert!(queue.is_empty());
    }
}

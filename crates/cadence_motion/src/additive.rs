//! Additive blending registry
//!
//! Additive motions register here while they run. A newly started additive motion
//! asks the registry for the most recent in-flight target of each property it
//! touches and uses that as its own start, so overlapping motions chain smoothly.
//!
//! The registry holds snapshots, never the motions themselves. Snapshots follow
//! endpoint changes through a [`PropertyObserver`] link installed on the motion's
//! properties.

use cadence_core::{PropertyData, PropertyObserver, Target};
use slotmap::{new_key_type, SlotMap};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

new_key_type! {
    /// Handle to a registered additive motion
    pub struct AdditiveKey;
}

/// Process-wide operation counter; IDs are never reused
static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Capability of a motion that blends additively
pub trait Additive {
    /// ID assigned at registration, `0` while unregistered
    fn operation_id(&self) -> u64;

    fn additive_weighting(&self) -> f64;

    fn additive_properties(&self) -> &[PropertyData];
}

/// Returned by [`AdditiveRegistry::register`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdditiveRegistration {
    pub key: AdditiveKey,
    pub operation_id: u64,
}

struct AdditiveEntry {
    operation_id: u64,
    weighting: f64,
    properties: Vec<PropertyData>,
}

impl AdditiveEntry {
    fn is_released(&self) -> bool {
        self.properties.iter().all(|p| p.target().is_none())
    }
}

type Entries = SlotMap<AdditiveKey, AdditiveEntry>;

/// Shared handle to the set of running additive motions
#[derive(Clone, Default)]
pub struct AdditiveRegistry {
    entries: Rc<RefCell<Entries>>,
}

impl AdditiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a motion and assign it the next operation ID
    pub fn register(&self, motion: &dyn Additive) -> AdditiveRegistration {
        let operation_id = NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed);
        let properties = motion
            .additive_properties()
            .iter()
            .map(|property| {
                let mut snapshot = property.clone();
                snapshot.set_observer(None);
                snapshot
            })
            .collect::<Vec<_>>();

        let key = self.entries.borrow_mut().insert(AdditiveEntry {
            operation_id,
            weighting: motion.additive_weighting(),
            properties,
        });

        debug!(operation_id, "registered additive motion");
        AdditiveRegistration { key, operation_id }
    }

    /// Remove a registration; returns `false` if it was already gone
    pub fn unregister(&self, registration: &AdditiveRegistration) -> bool {
        let removed = self.entries.borrow_mut().remove(registration.key).is_some();
        if removed {
            debug!(operation_id = registration.operation_id, "unregistered additive motion");
        }
        removed
    }

    pub fn contains(&self, registration: &AdditiveRegistration) -> bool {
        self.entries.borrow().contains_key(registration.key)
    }

    /// Observer that keeps the snapshot of `registration` in sync with the live properties
    pub fn observer(&self, registration: &AdditiveRegistration) -> Rc<dyn PropertyObserver> {
        Rc::new(SnapshotObserver {
            entries: Rc::downgrade(&self.entries),
            key: registration.key,
        })
    }

    /// Blended target of the most recently registered motion touching `path` on `target`.
    ///
    /// Returns `start + (end - start) * weighting` of the highest operation ID that
    /// matches, or `None` when nothing registered addresses the property.
    pub fn target_value(&self, target: &Target, path: &str) -> Option<f64> {
        let entries = self.entries.borrow();
        let mut ordered = entries.values().collect::<Vec<_>>();
        ordered.sort_by_key(|entry| entry.operation_id);

        ordered.iter().rev().find_map(|entry| {
            entry
                .properties
                .iter()
                .find(|p| p.path() == path && p.is_attached_to(target))
                .map(|p| {
                    let start = p.resolved_start();
                    let value = start + (p.end() - start) * entry.weighting;
                    trace!(operation_id = entry.operation_id, path, value, "additive target value");
                    value
                })
        })
    }

    /// Drop entries whose targets have all been released
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_released());
        before - entries.len()
    }

    /// Registered operation IDs in ascending order
    pub fn operation_ids(&self) -> Vec<u64> {
        let mut ids = self
            .entries
            .borrow()
            .values()
            .map(|e| e.operation_id)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Mirrors endpoint changes into a registry snapshot
struct SnapshotObserver {
    entries: Weak<RefCell<Entries>>,
    key: AdditiveKey,
}

fn same_property(a: &PropertyData, b: &PropertyData) -> bool {
    if a.path() != b.path() {
        return false;
    }
    match (a.weak_target(), b.weak_target()) {
        (Some(a), Some(b)) => std::ptr::addr_eq(a.as_ptr(), b.as_ptr()),
        (None, None) => true,
        _ => false,
    }
}

impl PropertyObserver for SnapshotObserver {
    fn property_did_change(&self, property: &PropertyData) {
        let Some(entries) = self.entries.upgrade() else {
            return;
        };
        let Ok(mut entries) = entries.try_borrow_mut() else {
            return;
        };
        let Some(entry) = entries.get_mut(self.key) else {
            return;
        };

        if let Some(snapshot) = entry
            .properties
            .iter_mut()
            .find(|s| same_property(s, property))
        {
            snapshot.set_start(property.resolved_start());
            snapshot.set_end(property.end());
        }
    }
}

//! Property data
//!
//! A [`PropertyData`] is one scalar interpolation unit: a path into a host object,
//! the start and end values, and the value most recently written.

use crate::error::{Result, ValueError};
use crate::value::{same_target, PropertyValue, Target, WeakTarget};
use std::fmt;
use std::rc::Rc;

/// Receives a notification whenever a property's endpoints are reassigned
pub trait PropertyObserver {
    fn property_did_change(&self, property: &PropertyData);
}

/// A single named scalar interpolation unit
#[derive(Clone)]
pub struct PropertyData {
    /// Full dot-delimited path, e.g. `position.x`
    path: String,
    /// Path of the host value holding this component, e.g. `position`
    parent_path: String,
    /// Component name inside the parent value, `None` when not yet resolved
    component: Option<&'static str>,
    /// Start value; `None` means "read from the live object before the first tick"
    start: Option<f64>,
    end: f64,
    current: f64,
    target: Option<WeakTarget>,
    observer: Option<Rc<dyn PropertyObserver>>,
}

impl PropertyData {
    /// Create a property with an optional explicit start
    pub fn new(path: impl Into<String>, start: Option<f64>, end: f64) -> Self {
        let path = path.into();
        Self {
            parent_path: path.clone(),
            path,
            component: None,
            start,
            end,
            current: start.unwrap_or(0.0),
            target: None,
            observer: None,
        }
    }

    /// Create a property that starts from the live value
    pub fn to(path: impl Into<String>, end: f64) -> Self {
        Self::new(path, None, end)
    }

    /// Create a property with explicit start and end
    pub fn from_to(path: impl Into<String>, start: f64, end: f64) -> Self {
        Self::new(path, Some(start), end)
    }

    /// Builder: mark this property as the `component` of the value at `parent_path`
    pub fn with_component(mut self, parent_path: impl Into<String>, component: &'static str) -> Self {
        self.parent_path = parent_path.into();
        self.component = Some(component);
        self
    }

    /// Builder: attach to a host object
    pub fn with_target(mut self, target: &Target) -> Self {
        self.attach(target);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn component_name(&self) -> Option<&'static str> {
        self.component
    }

    pub fn start(&self) -> Option<f64> {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// The start value, falling back to the current value when unresolved
    pub fn resolved_start(&self) -> f64 {
        self.start.unwrap_or(self.current)
    }

    pub fn has_start(&self) -> bool {
        self.start.is_some()
    }

    /// Reassign the start value, notifying the observer when it changes
    pub fn set_start(&mut self, start: f64) {
        if self.start == Some(start) {
            return;
        }
        self.start = Some(start);
        self.notify();
    }

    pub fn set_end(&mut self, end: f64) {
        if self.end == end {
            return;
        }
        self.end = end;
        self.notify();
    }

    pub fn set_current(&mut self, current: f64) {
        self.current = current;
    }

    /// Exchange start and end, used when a motion turns around
    pub fn swap_endpoints(&mut self) {
        let start = self.resolved_start();
        self.start = Some(self.end);
        self.end = start;
        self.notify();
    }

    /// Interpolated value at `progress`; exact at 0 and 1
    pub fn interpolate(&self, progress: f64) -> f64 {
        let start = self.resolved_start();
        if progress == 0.0 {
            start
        } else if progress == 1.0 {
            self.end
        } else {
            start + (self.end - start) * progress
        }
    }

    pub fn attach(&mut self, target: &Target) {
        self.target = Some(Rc::downgrade(target));
    }

    /// The host object, if it is still alive
    pub fn target(&self) -> Option<Target> {
        self.target.as_ref().and_then(|weak| weak.upgrade())
    }

    /// The host object, or [`ValueError::TargetReleased`] once it is gone
    pub fn live_target(&self) -> Result<Target> {
        self.target().ok_or_else(|| ValueError::TargetReleased {
            path: self.path.clone(),
        })
    }

    pub fn weak_target(&self) -> Option<&WeakTarget> {
        self.target.as_ref()
    }

    /// Whether this property addresses `target`
    pub fn is_attached_to(&self, target: &Target) -> bool {
        self.target
            .as_ref()
            .is_some_and(|weak| same_target(weak, target))
    }

    pub fn set_observer(&mut self, observer: Option<Rc<dyn PropertyObserver>>) {
        self.observer = observer;
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer.property_did_change(self);
        }
    }
}

impl fmt::Debug for PropertyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyData")
            .field("path", &self.path)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("current", &self.current)
            .field("attached", &self.target.is_some())
            .finish()
    }
}

/// Declared state for one host property, expanded into [`PropertyData`] by a value assistant
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyState {
    pub path: String,
    pub start: Option<PropertyValue>,
    pub end: PropertyValue,
}

impl PropertyState {
    /// A state that animates from the live value to `end`
    pub fn new(path: impl Into<String>, end: PropertyValue) -> Self {
        Self {
            path: path.into(),
            start: None,
            end,
        }
    }

    /// Builder: set an explicit start value
    pub fn from(mut self, start: PropertyValue) -> Self {
        self.start = Some(start);
        self
    }
}

//! Host value model
//!
//! Motions never know what a host object is. They only see values addressed by
//! dot-delimited paths and split composite values into named scalar components.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// A property value read from or written to a host object
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyValue {
    Scalar {
        value: f64,
    },
    Point {
        x: f64,
        y: f64,
    },
    Size {
        width: f64,
        height: f64,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// RGBA color with components in 0.0..=1.0
    Color {
        red: f64,
        green: f64,
        blue: f64,
        alpha: f64,
    },
}

/// The shape of a [`PropertyValue`], used for type checks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Scalar,
    Point,
    Size,
    Rect,
    Color,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Scalar => "scalar",
            ValueKind::Point => "point",
            ValueKind::Size => "size",
            ValueKind::Rect => "rect",
            ValueKind::Color => "color",
        };
        f.write_str(name)
    }
}

impl PropertyValue {
    pub const fn scalar(value: f64) -> Self {
        PropertyValue::Scalar { value }
    }

    pub const fn point(x: f64, y: f64) -> Self {
        PropertyValue::Point { x, y }
    }

    pub const fn size(width: f64, height: f64) -> Self {
        PropertyValue::Size { width, height }
    }

    pub const fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        PropertyValue::Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn color(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        PropertyValue::Color {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Scalar { .. } => ValueKind::Scalar,
            PropertyValue::Point { .. } => ValueKind::Point,
            PropertyValue::Size { .. } => ValueKind::Size,
            PropertyValue::Rect { .. } => ValueKind::Rect,
            PropertyValue::Color { .. } => ValueKind::Color,
        }
    }

    /// The scalar value, if this is a scalar
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            PropertyValue::Scalar { value } => Some(*value),
            _ => None,
        }
    }

    /// Named scalar components in declaration order.
    ///
    /// A scalar has a single component named `""`.
    pub fn components(&self) -> SmallVec<[(&'static str, f64); 4]> {
        match *self {
            PropertyValue::Scalar { value } => smallvec![("", value)],
            PropertyValue::Point { x, y } => smallvec![("x", x), ("y", y)],
            PropertyValue::Size { width, height } => {
                smallvec![("width", width), ("height", height)]
            }
            PropertyValue::Rect {
                x,
                y,
                width,
                height,
            } => smallvec![("x", x), ("y", y), ("width", width), ("height", height)],
            PropertyValue::Color {
                red,
                green,
                blue,
                alpha,
            } => smallvec![
                ("red", red),
                ("green", green),
                ("blue", blue),
                ("alpha", alpha)
            ],
        }
    }

    /// Look up a single component by name
    pub fn component(&self, name: &str) -> Option<f64> {
        self.components()
            .into_iter()
            .find(|(component, _)| *component == name)
            .map(|(_, value)| value)
    }

    /// Return a copy with one component replaced, or `None` if the name is unknown
    pub fn with_component(self, name: &str, value: f64) -> Option<Self> {
        let mut next = self;
        let slot = match (&mut next, name) {
            (PropertyValue::Scalar { value: v }, "") => v,
            (PropertyValue::Point { x, .. }, "x") | (PropertyValue::Rect { x, .. }, "x") => x,
            (PropertyValue::Point { y, .. }, "y") | (PropertyValue::Rect { y, .. }, "y") => y,
            (PropertyValue::Size { width, .. }, "width")
            | (PropertyValue::Rect { width, .. }, "width") => width,
            (PropertyValue::Size { height, .. }, "height")
            | (PropertyValue::Rect { height, .. }, "height") => height,
            (PropertyValue::Color { red, .. }, "red") => red,
            (PropertyValue::Color { green, .. }, "green") => green,
            (PropertyValue::Color { blue, .. }, "blue") => blue,
            (PropertyValue::Color { alpha, .. }, "alpha") => alpha,
            _ => return None,
        };
        *slot = value;
        Some(next)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::scalar(value)
    }
}

/// Host object capability: read and write values by path
///
/// # Example
///
/// ```rust
/// use cadence_core::{Animatable, PropertyValue};
///
/// struct Sprite {
///     alpha: f64,
/// }
///
/// impl Animatable for Sprite {
///     fn value(&self, path: &str) -> Option<PropertyValue> {
///         match path {
///             "alpha" => Some(PropertyValue::scalar(self.alpha)),
///             _ => None,
///         }
///     }
///
///     fn set_value(&mut self, path: &str, value: PropertyValue) -> bool {
///         match (path, value.as_scalar()) {
///             ("alpha", Some(alpha)) => {
///                 self.alpha = alpha;
///                 true
///             }
///             _ => false,
///         }
///     }
/// }
/// ```
pub trait Animatable {
    /// Current value at `path`, or `None` if the object has no such property
    fn value(&self, path: &str) -> Option<PropertyValue>;

    /// Write a value; returns `false` if the path is unknown or the kind is rejected
    fn set_value(&mut self, path: &str, value: PropertyValue) -> bool;
}

/// Shared handle to a host object
pub type Target = Rc<RefCell<dyn Animatable>>;

/// Non-owning handle to a host object
pub type WeakTarget = Weak<RefCell<dyn Animatable>>;

/// Wrap a host object into a [`Target`]
pub fn into_target<T: Animatable + 'static>(object: T) -> Target {
    Rc::new(RefCell::new(object))
}

/// Whether a weak handle refers to the same allocation as `target`
pub fn same_target(weak: &WeakTarget, target: &Target) -> bool {
    std::ptr::addr_eq(weak.as_ptr(), Rc::as_ptr(target))
}

/// A path-keyed value container implementing [`Animatable`]
///
/// Writes are only accepted for paths that already exist, with a value of the same kind.
#[derive(Clone, Debug, Default)]
pub struct ValueStore {
    values: FxHashMap<String, PropertyValue>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a value
    pub fn with(mut self, path: impl Into<String>, value: PropertyValue) -> Self {
        self.values.insert(path.into(), value);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, value: PropertyValue) {
        self.values.insert(path.into(), value);
    }

    pub fn get(&self, path: &str) -> Option<PropertyValue> {
        self.values.get(path).copied()
    }

    /// Scalar value at `path`
    pub fn scalar(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(|v| v.as_scalar())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Animatable for ValueStore {
    fn value(&self, path: &str) -> Option<PropertyValue> {
        self.get(path)
    }

    fn set_value(&mut self, path: &str, value: PropertyValue) -> bool {
        match self.values.get_mut(path) {
            Some(slot) if slot.kind() == value.kind() => {
                *slot = value;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components() {
        let color = PropertyValue::color(0.1, 0.2, 0.3, 1.0);
        let components = color.components();
        assert_eq!(components.len(), 4);
        assert_eq!(components[2], ("blue", 0.3));
        assert_eq!(color.component("alpha"), Some(1.0));
        assert_eq!(color.component("x"), None);

        assert_eq!(PropertyValue::scalar(3.0).components()[0], ("", 3.0));
    }

    #[test]
    fn test_with_component() {
        let rect = PropertyValue::rect(0.0, 0.0, 10.0, 20.0);
        let moved = rect.with_component("y", 5.0).unwrap();
        assert_eq!(moved, PropertyValue::rect(0.0, 5.0, 10.0, 20.0));

        assert!(rect.with_component("red", 1.0).is_none());
        assert_eq!(
            PropertyValue::scalar(1.0).with_component("", 2.0),
            Some(PropertyValue::scalar(2.0))
        );
    }

    #[test]
    fn test_value_store_rejects_kind_change() {
        let mut store = ValueStore::new().with("alpha", PropertyValue::scalar(1.0));

        assert!(store.set_value("alpha", PropertyValue::scalar(0.5)));
        assert_eq!(store.scalar("alpha"), Some(0.5));

        assert!(!store.set_value("alpha", PropertyValue::point(0.0, 0.0)));
        assert!(!store.set_value("missing", PropertyValue::scalar(0.0)));
    }

    #[test]
    fn test_same_target() {
        let a = into_target(ValueStore::new());
        let b = into_target(ValueStore::new());
        let weak_a = Rc::downgrade(&a);

        assert!(same_target(&weak_a, &a));
        assert!(!same_target(&weak_a, &b));
    }

    #[test]
    fn test_serde_tagging() {
        let value: PropertyValue = toml::from_str("kind = \"point\"\nx = 1.0\ny = 2.0").unwrap();
        assert_eq!(value, PropertyValue::point(1.0, 2.0));
    }
}

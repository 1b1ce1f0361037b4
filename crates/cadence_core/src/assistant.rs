//! Value assistants
//!
//! A value assistant sits between motions and host objects. It expands a declared
//! [`PropertyState`] into scalar [`PropertyData`] components, reads live values, and
//! writes new ones, either by replacement or additively.

use crate::error::{Result, ValueError};
use crate::property::{PropertyData, PropertyState};
use crate::value::{Animatable, PropertyValue, Target, ValueKind};
use tracing::{trace, warn};

/// Converts between host properties and scalar interpolation units
pub trait ValueAssistant {
    /// Expand a declared state into one property per changing component.
    ///
    /// Fails with [`ValueError::TypeMismatch`] if the declared kind differs from the live one.
    fn generate_properties(&self, target: &Target, state: &PropertyState) -> Result<Vec<PropertyData>>;

    /// Read the live value of a property
    fn retrieve_value(&self, property: &PropertyData) -> Option<f64>;

    /// Read the live value, reporting why it could not be read
    fn try_retrieve_value(&self, property: &PropertyData) -> Result<f64> {
        property.live_target()?;
        self.retrieve_value(property)
            .ok_or_else(|| ValueError::MissingProperty {
                path: property.path().to_string(),
            })
    }

    /// Write `new_value` for a property and return the value actually stored.
    ///
    /// In additive mode the stored value is `live + (new_value - property.current()) * weighting`.
    fn update(&self, property: &PropertyData, new_value: f64) -> Option<f64>;

    /// Whether this assistant can handle the target at all
    fn supports(&self, target: &Target) -> bool;

    /// Whether the target can be addressed with dot paths
    fn accepts_keypath(&self, target: &Target) -> bool;

    fn is_additive(&self) -> bool;

    fn set_additive(&mut self, additive: bool);

    fn additive_weighting(&self) -> f64;

    fn set_additive_weighting(&mut self, weighting: f64);
}

/// Locate the host value holding a property: (holder path, holder value, component name)
fn resolve<'p>(
    object: &dyn Animatable,
    property: &'p PropertyData,
) -> Option<(&'p str, PropertyValue, &'p str)> {
    if let Some(component) = property.component_name() {
        let value = object.value(property.parent_path())?;
        return Some((property.parent_path(), value, component));
    }

    if let Some(value) = object.value(property.path()) {
        return match value.kind() {
            ValueKind::Scalar => Some((property.path(), value, "")),
            _ => None,
        };
    }

    let (parent, component) = property.path().rsplit_once('.')?;
    let value = object.value(parent)?;
    value.component(component)?;
    Some((parent, value, component))
}

/// Default assistant for every [`PropertyValue`] kind
#[derive(Clone, Debug)]
pub struct StructuredAssistant {
    additive: bool,
    additive_weighting: f64,
}

impl StructuredAssistant {
    pub fn new() -> Self {
        Self {
            additive: false,
            additive_weighting: 1.0,
        }
    }
}

impl Default for StructuredAssistant {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueAssistant for StructuredAssistant {
    fn generate_properties(&self, target: &Target, state: &PropertyState) -> Result<Vec<PropertyData>> {
        let live = target
            .borrow()
            .value(&state.path)
            .ok_or_else(|| ValueError::MissingProperty {
                path: state.path.clone(),
            })?;

        let declared = [Some(state.end), state.start];
        for value in declared.into_iter().flatten() {
            if value.kind() != live.kind() {
                return Err(ValueError::TypeMismatch {
                    path: state.path.clone(),
                    expected: value.kind(),
                    found: live.kind(),
                });
            }
        }

        let properties = state
            .end
            .components()
            .into_iter()
            .map(|(name, end)| {
                let start = state.start.and_then(|s| s.component(name));
                let path = if name.is_empty() {
                    state.path.clone()
                } else {
                    format!("{}.{}", state.path, name)
                };

                let mut property = PropertyData::new(path, start, end)
                    .with_component(state.path.clone(), name)
                    .with_target(target);
                if let Some(current) = live.component(name) {
                    property.set_current(current);
                }
                property
            })
            .collect::<Vec<_>>();

        trace!(path = %state.path, count = properties.len(), "generated properties");
        Ok(properties)
    }

    fn retrieve_value(&self, property: &PropertyData) -> Option<f64> {
        let target = property.target()?;
        let object = target.try_borrow().ok()?;
        let (_, value, component) = resolve(&*object, property)?;
        value.component(component)
    }

    fn update(&self, property: &PropertyData, new_value: f64) -> Option<f64> {
        let target = property.target()?;
        let Ok(mut object) = target.try_borrow_mut() else {
            warn!(path = property.path(), "target already borrowed, skipping write");
            return None;
        };

        let (holder, value, component) = resolve(&*object, property)?;
        let live = value.component(component)?;
        let next = if self.additive {
            live + (new_value - property.current()) * self.additive_weighting
        } else {
            new_value
        };

        let written = value.with_component(component, next)?;
        object.set_value(holder, written).then_some(next)
    }

    fn supports(&self, _target: &Target) -> bool {
        true
    }

    fn accepts_keypath(&self, _target: &Target) -> bool {
        true
    }

    fn is_additive(&self) -> bool {
        self.additive
    }

    fn set_additive(&mut self, additive: bool) {
        self.additive = additive;
    }

    fn additive_weighting(&self) -> f64 {
        self.additive_weighting
    }

    fn set_additive_weighting(&mut self, weighting: f64) {
        self.additive_weighting = weighting.clamp(0.0, 1.0);
    }
}

/// Forwards each request to the first member assistant that supports the target
pub struct AssistantGroup {
    assistants: Vec<Box<dyn ValueAssistant>>,
    additive: bool,
    additive_weighting: f64,
}

impl AssistantGroup {
    pub fn new() -> Self {
        Self {
            assistants: Vec::new(),
            additive: false,
            additive_weighting: 1.0,
        }
    }

    /// Builder: append an assistant
    pub fn with(mut self, assistant: impl ValueAssistant + 'static) -> Self {
        self.add(assistant);
        self
    }

    pub fn add(&mut self, assistant: impl ValueAssistant + 'static) {
        let mut assistant: Box<dyn ValueAssistant> = Box::new(assistant);
        assistant.set_additive(self.additive);
        assistant.set_additive_weighting(self.additive_weighting);
        self.assistants.push(assistant);
    }

    pub fn len(&self) -> usize {
        self.assistants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assistants.is_empty()
    }

    fn assistant_for(&self, target: &Target) -> Option<&dyn ValueAssistant> {
        self.assistants
            .iter()
            .find(|a| a.supports(target))
            .map(|a| a.as_ref())
    }
}

impl Default for AssistantGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueAssistant for AssistantGroup {
    fn generate_properties(&self, target: &Target, state: &PropertyState) -> Result<Vec<PropertyData>> {
        match self.assistant_for(target) {
            Some(assistant) => assistant.generate_properties(target, state),
            None => Err(ValueError::Unsupported {
                path: state.path.clone(),
            }),
        }
    }

    fn retrieve_value(&self, property: &PropertyData) -> Option<f64> {
        let target = property.target()?;
        self.assistant_for(&target)?.retrieve_value(property)
    }

    fn update(&self, property: &PropertyData, new_value: f64) -> Option<f64> {
        let target = property.target()?;
        self.assistant_for(&target)?.update(property, new_value)
    }

    fn supports(&self, target: &Target) -> bool {
        self.assistants.iter().any(|a| a.supports(target))
    }

    fn accepts_keypath(&self, target: &Target) -> bool {
        self.assistants.iter().any(|a| a.accepts_keypath(target))
    }

    fn is_additive(&self) -> bool {
        self.additive
    }

    fn set_additive(&mut self, additive: bool) {
        self.additive = additive;
        for assistant in &mut self.assistants {
            assistant.set_additive(additive);
        }
    }

    fn additive_weighting(&self) -> f64 {
        self.additive_weighting
    }

    fn set_additive_weighting(&mut self, weighting: f64) {
        self.additive_weighting = weighting.clamp(0.0, 1.0);
        for assistant in &mut self.assistants {
            assistant.set_additive_weighting(self.additive_weighting);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store() -> Rc<RefCell<ValueStore>> {
        Rc::new(RefCell::new(
            ValueStore::new()
                .with("alpha", PropertyValue::scalar(1.0))
                .with("position", PropertyValue::point(10.0, 20.0)),
        ))
    }

    #[test]
    fn test_generate_point_components() {
        let store = store();
        let target: Target = store.clone();
        let assistant = StructuredAssistant::new();

        let state = PropertyState::new("position", PropertyValue::point(100.0, 200.0))
            .from(PropertyValue::point(0.0, 0.0));
        let properties = assistant.generate_properties(&target, &state).unwrap();

        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].path(), "position.x");
        assert_eq!(properties[0].start(), Some(0.0));
        assert_eq!(properties[0].current(), 10.0);
        assert_eq!(properties[1].path(), "position.y");
        assert_eq!(properties[1].end(), 200.0);
    }

    #[test]
    fn test_type_mismatch() {
        let target: Target = store();
        let assistant = StructuredAssistant::new();

        let state = PropertyState::new("alpha", PropertyValue::point(0.0, 0.0));
        let err = assistant.generate_properties(&target, &state).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                path: "alpha".to_string(),
                expected: ValueKind::Point,
                found: ValueKind::Scalar,
            }
        );

        let missing = PropertyState::new("beta", PropertyValue::scalar(0.0));
        assert!(matches!(
            assistant.generate_properties(&target, &missing),
            Err(ValueError::MissingProperty { .. })
        ));
    }

    #[test]
    fn test_update_by_path() {
        let store = store();
        let target: Target = store.clone();
        let assistant = StructuredAssistant::new();

        // Component addressed by plain dot path, without generated metadata
        let property = PropertyData::to("position.y", 0.0).with_target(&target);
        assert_eq!(assistant.retrieve_value(&property), Some(20.0));

        assert_eq!(assistant.update(&property, 42.0), Some(42.0));
        assert_eq!(
            store.borrow().get("position"),
            Some(PropertyValue::point(10.0, 42.0))
        );

        let alpha = PropertyData::to("alpha", 0.0).with_target(&target);
        assert_eq!(assistant.update(&alpha, 0.5), Some(0.5));
        assert_eq!(store.borrow().scalar("alpha"), Some(0.5));
    }

    #[test]
    fn test_additive_update() {
        let store = store();
        let target: Target = store.clone();
        let mut assistant = StructuredAssistant::new();
        assistant.set_additive(true);
        assistant.set_additive_weighting(0.5);

        let mut property = PropertyData::from_to("alpha", 0.0, 1.0).with_target(&target);
        property.set_current(0.0);

        // Delta of 0.4 at half weight is added to the live 1.0
        let written = assistant.update(&property, 0.4).unwrap();
        assert!((written - 1.2).abs() < 1e-12);
        assert_eq!(store.borrow().scalar("alpha"), Some(written));
    }

    #[test]
    fn test_released_target() {
        let target: Target = store();
        let property = PropertyData::to("alpha", 0.0).with_target(&target);
        drop(target);

        let assistant = StructuredAssistant::new();
        assert_eq!(assistant.retrieve_value(&property), None);
        assert_eq!(assistant.update(&property, 1.0), None);
        assert_eq!(
            assistant.try_retrieve_value(&property),
            Err(ValueError::TargetReleased {
                path: "alpha".to_string(),
            })
        );
    }

    #[test]
    fn test_try_retrieve_missing_path() {
        let target: Target = store();
        let property = PropertyData::to("beta", 0.0).with_target(&target);

        let assistant = StructuredAssistant::new();
        assert_eq!(
            assistant.try_retrieve_value(&property),
            Err(ValueError::MissingProperty {
                path: "beta".to_string(),
            })
        );
    }

    struct RefusingAssistant;

    impl ValueAssistant for RefusingAssistant {
        fn generate_properties(&self, _: &Target, state: &PropertyState) -> Result<Vec<PropertyData>> {
            Err(ValueError::Unsupported {
                path: state.path.clone(),
            })
        }
        fn retrieve_value(&self, _: &PropertyData) -> Option<f64> {
            None
        }
        fn update(&self, _: &PropertyData, _: f64) -> Option<f64> {
            None
        }
        fn supports(&self, _: &Target) -> bool {
            false
        }
        fn accepts_keypath(&self, _: &Target) -> bool {
            false
        }
        fn is_additive(&self) -> bool {
            false
        }
        fn set_additive(&mut self, _: bool) {}
        fn additive_weighting(&self) -> f64 {
            1.0
        }
        fn set_additive_weighting(&mut self, _: f64) {}
    }

    #[test]
    fn test_group_routes_to_supporting_assistant() {
        let target: Target = store();

        let empty = AssistantGroup::new().with(RefusingAssistant);
        let state = PropertyState::new("alpha", PropertyValue::scalar(0.0));
        assert!(matches!(
            empty.generate_properties(&target, &state),
            Err(ValueError::Unsupported { .. })
        ));

        let mut group = AssistantGroup::new()
            .with(RefusingAssistant)
            .with(StructuredAssistant::new());
        group.set_additive(true);
        assert_eq!(group.len(), 2);
        assert!(group.supports(&target));

        let properties = group.generate_properties(&target, &state).unwrap();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].path(), "alpha");
    }
}

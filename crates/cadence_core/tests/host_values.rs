//! Integration tests for the host-facing value pipeline
//!
//! These tests verify that:
//! - Custom host objects can be driven through the structured assistant
//! - Config files on disk feed tempo cadence
//! - A manual tempo delivers beats to a delegate that writes host values

use cadence_core::{
    into_target, Animatable, EngineConfig, ManualTempo, PropertyData, PropertyState, PropertyValue,
    SharedDelegate, StructuredAssistant, Target, Tempo, TempoDelegate, ValueAssistant,
};
use std::cell::RefCell;
use std::rc::Rc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A host object with fixed fields instead of a path map
#[derive(Default)]
struct Sprite {
    frame: (f64, f64, f64, f64),
    tint: (f64, f64, f64, f64),
}

impl Animatable for Sprite {
    fn value(&self, path: &str) -> Option<PropertyValue> {
        match path {
            "frame" => {
                let (x, y, w, h) = self.frame;
                Some(PropertyValue::rect(x, y, w, h))
            }
            "tint" => {
                let (r, g, b, a) = self.tint;
                Some(PropertyValue::color(r, g, b, a))
            }
            _ => None,
        }
    }

    fn set_value(&mut self, path: &str, value: PropertyValue) -> bool {
        match (path, value) {
            ("frame", PropertyValue::Rect { x, y, width, height }) => {
                self.frame = (x, y, width, height);
                true
            }
            ("tint", PropertyValue::Color { red, green, blue, alpha }) => {
                self.tint = (red, green, blue, alpha);
                true
            }
            _ => false,
        }
    }
}

#[test]
fn test_custom_host_color_components() {
    init_tracing();

    let sprite = Rc::new(RefCell::new(Sprite::default()));
    let target: Target = sprite.clone();
    let assistant = StructuredAssistant::new();

    let state = PropertyState::new("tint", PropertyValue::color(1.0, 0.5, 0.25, 1.0));
    let properties = assistant.generate_properties(&target, &state).unwrap();
    assert_eq!(properties.len(), 4);

    for property in &properties {
        let value = property.interpolate(1.0);
        assistant.update(property, value);
    }

    assert_eq!(sprite.borrow().tint, (1.0, 0.5, 0.25, 1.0));
}

#[test]
fn test_config_file_on_disk() {
    init_tracing();

    let dir = std::env::temp_dir().join(format!("cadence-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("cadence.toml"), "[tempo]\nfps = 30\n").unwrap();

    let config = EngineConfig::load(&dir).unwrap();
    assert_eq!(config.tempo.fps, 30);
    assert_eq!(config.path.curve_length_generation_steps, 5);

    std::fs::remove_dir_all(&dir).unwrap();

    assert!(EngineConfig::load(&dir).is_err());
}

/// Writes a linear ramp on `frame.x` from each beat
struct Ramp {
    property: PropertyData,
    assistant: StructuredAssistant,
}

impl TempoDelegate for Ramp {
    fn tempo_beat_update(&mut self, timestamp: f64) {
        let progress = timestamp.clamp(0.0, 1.0);
        let value = self.property.interpolate(progress);
        if let Some(written) = self.assistant.update(&self.property, value) {
            self.property.set_current(written);
        }
    }
}

#[test]
fn test_tempo_drives_host_writes() {
    init_tracing();

    let sprite = into_target(Sprite::default());
    let ramp = Rc::new(RefCell::new(Ramp {
        property: PropertyData::from_to("frame.x", 0.0, 100.0).with_target(&sprite),
        assistant: StructuredAssistant::new(),
    }));
    let delegate: SharedDelegate = ramp.clone();

    let config = EngineConfig::from_toml_str("[tempo]\nfps = 4\n").unwrap();
    let mut tempo = ManualTempo::with_config(&config.tempo);
    tempo.set_delegate(Some(&delegate));

    tempo.advance_frames(2);
    assert_eq!(sprite.borrow().value("frame"), Some(PropertyValue::rect(50.0, 0.0, 0.0, 0.0)));

    tempo.advance_frames(2);
    assert_eq!(ramp.borrow().property.current(), 100.0);
}

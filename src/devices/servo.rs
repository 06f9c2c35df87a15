use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::StateCell;
use crate::events::EventBus;
use crate::registry::control::{LEFT_ARROW_KEYS, RIGHT_ARROW_KEYS, SPACE_KEY};
use crate::registry::{Control, ParamSchema, ParamType, Registry, RegistryError, Slider, Toggle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ServoState {
    pub on: bool,
    pub degrees: f64,
}

/// Hobby servo constrained to `[min_degree, max_degree]`
#[derive(Debug)]
pub struct Servo {
    cell: StateCell<ServoState>,
    min_degree: f64,
    max_degree: f64,
}

impl Servo {
    pub fn new(id: &str, bus: EventBus, degrees: f64, min_degree: f64, max_degree: f64) -> Self {
        let servo = Self {
            cell: StateCell::new(id, ServoState::default(), bus),
            min_degree,
            max_degree,
        };
        servo.set_degrees(degrees);
        servo
    }

    pub fn start(&self) -> ServoState {
        self.cell.update(|s| s.on = true)
    }

    pub fn stop(&self) -> ServoState {
        self.cell.update(|s| s.on = false)
    }

    /// Out-of-range requests are clamped, with a warning.
    pub fn set_degrees(&self, degrees: f64) -> ServoState {
        let constrained = degrees.clamp(self.min_degree, self.max_degree);
        if constrained != degrees {
            log::warn!(
                "Requested degrees {} for {} is outside [{}, {}]; using {}",
                degrees,
                self.cell.component_id(),
                self.min_degree,
                self.max_degree,
                constrained
            );
        }
        self.cell.update(|s| s.degrees = constrained)
    }

    pub fn state(&self) -> ServoState {
        self.cell.get()
    }

    /// Register as `id` with `start`, `stop`, `set_degrees(degrees)`, `state`,
    /// a start/stop toggle and an arrow-key slider.
    pub fn attach(
        registry: &mut Registry,
        id: &str,
        bus: &EventBus,
        min_degree: f64,
        max_degree: f64,
    ) -> Result<Arc<Self>, RegistryError> {
        registry.add_component(id, "Servo")?;
        let middle = ((min_degree + max_degree) / 2.0).round();
        let servo = Arc::new(Self::new(id, bus.clone(), middle, min_degree, max_degree));

        let s = Arc::clone(&servo);
        registry.register(id, "start", ParamSchema::empty(), move |_| {
            s.start();
            Ok(Value::Null)
        })?;
        let s = Arc::clone(&servo);
        registry.register(id, "stop", ParamSchema::empty(), move |_| {
            s.stop();
            Ok(Value::Null)
        })?;
        let s = Arc::clone(&servo);
        registry.register(
            id,
            "set_degrees",
            ParamSchema::empty().param("degrees", ParamType::Float),
            move |args| {
                s.set_degrees(args.float("degrees")?);
                Ok(Value::Null)
            },
        )?;
        let s = Arc::clone(&servo);
        registry.register(id, "state", ParamSchema::empty(), move |_| Ok(s.cell.json()))?;

        registry.add_control(id, Control::Toggle(Toggle::new("start", "stop").text(format!("{} on/off", id))))?;
        registry.add_control(
            id,
            Control::Slider(
                Slider::new("set_degrees", min_degree as i64, max_degree as i64)
                    .initial(middle as i64)
                    .text(format!("{} degrees", id))
                    .keys(LEFT_ARROW_KEYS, RIGHT_ARROW_KEYS)
                    .reset_keys(SPACE_KEY),
            ),
        )?;
        Ok(servo)
    }
}

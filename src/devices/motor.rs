use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use super::StateCell;
use crate::events::EventBus;
use crate::registry::control::{DOWN_ARROW_KEYS, SPACE_KEY, UP_ARROW_KEYS};
use crate::registry::{Control, Label, ParamSchema, ParamType, Registry, RegistryError, Slider, Toggle};

pub const MIN_SPEED: i64 = -100;
pub const MAX_SPEED: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DcMotorState {
    pub on: bool,
    /// Signed duty cycle in percent, negative runs in reverse
    pub speed: i64,
}

/// Brushed DC motor behind an H-bridge
#[derive(Debug)]
pub struct DcMotor {
    cell: StateCell<DcMotorState>,
}

impl DcMotor {
    pub fn new(id: &str, bus: EventBus) -> Self {
        Self { cell: StateCell::new(id, DcMotorState::default(), bus) }
    }

    /// Start at the current speed.
    pub fn start(&self) -> DcMotorState {
        self.cell.update(|s| s.on = true)
    }

    pub fn stop(&self) -> DcMotorState {
        self.cell.update(|s| s.on = false)
    }

    pub fn set_speed(&self, speed: i64) -> DcMotorState {
        let constrained = speed.clamp(MIN_SPEED, MAX_SPEED);
        if constrained != speed {
            log::warn!(
                "Requested speed {} for {} is outside [{}, {}]; using {}",
                speed,
                self.cell.component_id(),
                MIN_SPEED,
                MAX_SPEED,
                constrained
            );
        }
        self.cell.update(|s| s.speed = constrained)
    }

    /// Effective speed: zero while stopped
    pub fn effective_speed(&self) -> i64 {
        let state = self.cell.get();
        if state.on { state.speed } else { 0 }
    }

    pub fn state(&self) -> DcMotorState {
        self.cell.get()
    }

    /// Register as `id` with `start`, `stop`, `set_speed(speed)`, `get_speed`,
    /// `state`, a toggle, a spring-loaded speed slider and a speed label.
    pub fn attach(registry: &mut Registry, id: &str, bus: &EventBus) -> Result<Arc<Self>, RegistryError> {
        registry.add_component(id, "DC motor")?;
        let motor = Arc::new(Self::new(id, bus.clone()));

        let m = Arc::clone(&motor);
        registry.register(id, "start", ParamSchema::empty(), move |_| {
            m.start();
            Ok(Value::Null)
        })?;
        let m = Arc::clone(&motor);
        registry.register(id, "stop", ParamSchema::empty(), move |_| {
            m.stop();
            Ok(Value::Null)
        })?;
        let m = Arc::clone(&motor);
        registry.register(
            id,
            "set_speed",
            ParamSchema::empty().param("speed", ParamType::Int),
            move |args| {
                m.set_speed(args.int("speed")?);
                Ok(Value::Null)
            },
        )?;
        let m = Arc::clone(&motor);
        registry.register(id, "get_speed", ParamSchema::empty(), move |_| Ok(json!(m.effective_speed())))?;
        let m = Arc::clone(&motor);
        registry.register(id, "state", ParamSchema::empty(), move |_| Ok(m.cell.json()))?;

        registry.add_control(id, Control::Toggle(Toggle::new("start", "stop").text(format!("{} on/off", id))))?;
        registry.add_control(
            id,
            Control::Slider(
                Slider::new("set_speed", MIN_SPEED, MAX_SPEED)
                    .initial(0)
                    .step(5)
                    .text(format!("{} speed", id))
                    .reset_on_release(true)
                    .zero_on_direction_change(true)
                    .keys(DOWN_ARROW_KEYS, UP_ARROW_KEYS)
                    .reset_keys(SPACE_KEY),
            ),
        )?;
        registry.add_control(
            id,
            Control::Label(Label::new("get_speed", Duration::from_secs(1)).text("Speed")),
        )?;
        Ok(motor)
    }
}

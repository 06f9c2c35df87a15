use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::StateCell;
use crate::events::EventBus;
use crate::registry::{Control, ParamSchema, Registry, RegistryError, Toggle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedState {
    pub on: bool,
}

/// Single LED on one output pin
#[derive(Debug)]
pub struct Led {
    cell: StateCell<LedState>,
}

impl Led {
    pub fn new(id: &str, bus: EventBus) -> Self {
        Self { cell: StateCell::new(id, LedState::default(), bus) }
    }

    pub fn turn_on(&self) -> LedState {
        self.cell.update(|s| s.on = true)
    }

    pub fn turn_off(&self) -> LedState {
        self.cell.update(|s| s.on = false)
    }

    pub fn state(&self) -> LedState {
        self.cell.get()
    }

    /// Register as `id` with `turn_on`, `turn_off`, `state` and an on/off toggle.
    pub fn attach(registry: &mut Registry, id: &str, bus: &EventBus) -> Result<Arc<Self>, RegistryError> {
        registry.add_component(id, "LED")?;
        let led = Arc::new(Self::new(id, bus.clone()));

        let l = Arc::clone(&led);
        registry.register(id, "turn_on", ParamSchema::empty(), move |_| {
            l.turn_on();
            Ok(Value::Null)
        })?;
        let l = Arc::clone(&led);
        registry.register(id, "turn_off", ParamSchema::empty(), move |_| {
            l.turn_off();
            Ok(Value::Null)
        })?;
        let l = Arc::clone(&led);
        registry.register(id, "state", ParamSchema::empty(), move |_| Ok(l.cell.json()))?;

        registry.add_control(id, Control::Toggle(Toggle::new("turn_on", "turn_off").text(format!("{} on/off", id))))?;
        Ok(led)
    }
}

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::StateCell;
use crate::events::EventBus;
use crate::registry::{Control, ParamSchema, Registry, RegistryError, Toggle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayState {
    pub closed: bool,
}

/// Relay switching a separate load circuit
#[derive(Debug)]
pub struct Relay {
    cell: StateCell<RelayState>,
}

impl Relay {
    pub fn new(id: &str, bus: EventBus) -> Self {
        Self { cell: StateCell::new(id, RelayState::default(), bus) }
    }

    pub fn close(&self) -> RelayState {
        self.cell.update(|s| s.closed = true)
    }

    pub fn open(&self) -> RelayState {
        self.cell.update(|s| s.closed = false)
    }

    pub fn state(&self) -> RelayState {
        self.cell.get()
    }

    pub fn attach(registry: &mut Registry, id: &str, bus: &EventBus) -> Result<Arc<Self>, RegistryError> {
        registry.add_component(id, "Relay")?;
        let relay = Arc::new(Self::new(id, bus.clone()));

        let r = Arc::clone(&relay);
        registry.register(id, "close", ParamSchema::empty(), move |_| {
            r.close();
            Ok(Value::Null)
        })?;
        let r = Arc::clone(&relay);
        registry.register(id, "open", ParamSchema::empty(), move |_| {
            r.open();
            Ok(Value::Null)
        })?;
        let r = Arc::clone(&relay);
        registry.register(id, "state", ParamSchema::empty(), move |_| Ok(r.cell.json()))?;

        registry.add_control(id, Control::Toggle(Toggle::new("close", "open").text(format!("{} closed/open", id))))?;
        Ok(relay)
    }
}

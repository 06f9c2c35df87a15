//! Simulated circuit components.
//!
//! Each device keeps its state in a [`StateCell`], registers its actions and
//! UI controls on a [`Registry`](crate::registry::Registry), and publishes
//! every real state change on the [`EventBus`]. No pins are driven here; a
//! hardware backend would subscribe to the bus or wrap the handlers.

mod led;
mod motor;
mod relay;
mod servo;

pub use led::{Led, LedState};
pub use motor::{DcMotor, DcMotorState};
pub use relay::{Relay, RelayState};
pub use servo::{Servo, ServoState};

use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

use crate::events::{EventBus, StateChanged};

/// Device state guarded by a mutex; publishes on change.
#[derive(Debug)]
pub struct StateCell<S> {
    component_id: String,
    state: Mutex<S>,
    bus: EventBus,
}

impl<S> StateCell<S>
where
    S: Clone + PartialEq + Serialize + std::fmt::Debug,
{
    pub fn new(component_id: impl Into<String>, initial: S, bus: EventBus) -> Self {
        Self {
            component_id: component_id.into(),
            state: Mutex::new(initial),
            bus,
        }
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    pub fn get(&self) -> S {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply `change`; publishes only if the state differs afterwards.
    pub fn update(&self, change: impl FnOnce(&mut S)) -> S {
        let (changed, new) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let old = state.clone();
            change(&mut *state);
            (*state != old, state.clone())
        };

        if changed {
            log::debug!("State of {} is now {:?}", self.component_id, new);
            self.bus.publish(StateChanged {
                component_id: self.component_id.clone(),
                state: self.to_json(&new),
            });
        } else {
            log::debug!("State of {} is already {:?}", self.component_id, new);
        }
        new
    }

    /// Current state as JSON, the payload of `state` actions
    pub fn json(&self) -> Value {
        self.to_json(&self.get())
    }

    fn to_json(&self, state: &S) -> Value {
        serde_json::to_value(state).unwrap_or(Value::Null)
    }
}

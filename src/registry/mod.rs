//! Action registry: named components, their callable actions and UI controls.
//!
//! # Purpose
//!
//! Holds everything a running server instance can invoke. One [`Registry`] is
//! built at startup, wrapped in `Arc`, and handed to the
//! [`Dispatcher`](crate::dispatch::Dispatcher). There is no process-wide
//! registry; two servers in one process never see each other's components.
//!
//! # Key types
//!
//! - [`Registry`] - components by id, insertion-ordered
//! - [`Component`] - actions by name plus declared [`Control`]s
//! - [`Action`] - handler closure and its [`ParamSchema`]
//!
//! # Used by
//!
//! - `dispatch` - looks up actions for incoming calls
//! - `codegen` - renders each component's controls
//! - `devices` / `apps` - register simulated hardware

pub mod control;
pub mod schema;

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use control::{ActionCall, Button, Control, DynamicArg, Label, Repeater, Slider, Toggle};
pub use schema::{Args, ParamError, ParamSchema, ParamSpec, ParamType, ParamValue};

/// Handler invoked for one action call. Returns a JSON payload (`Null` for none).
pub type Handler = Arc<dyn Fn(&Args) -> anyhow::Result<Value> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("component id '{0}' is already registered")]
    DuplicateComponent(String),
    #[error("no component with id '{0}'")]
    UnknownComponent(String),
    #[error("component '{component}' already has an action named '{action}'")]
    DuplicateAction { component: String, action: String },
    #[error("component '{component}' has no action named '{action}'")]
    UnknownAction { component: String, action: String },
    #[error("invalid {what} '{value}'")]
    InvalidId { what: &'static str, value: String },
    #[error("invalid {kind} control on '{component}': {reason}")]
    InvalidControl { component: String, kind: &'static str, reason: String },
}

/// A named operation on a component
#[derive(Clone)]
pub struct Action {
    name: String,
    schema: ParamSchema,
    handler: Handler,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    /// Call the handler with already-coerced arguments.
    pub fn invoke(&self, args: &Args) -> anyhow::Result<Value> {
        (self.handler)(args)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// A named, addressable hardware abstraction
#[derive(Debug, Clone)]
pub struct Component {
    id: String,
    description: String,
    actions: IndexMap<String, Action>,
    controls: Vec<Control>,
}

impl Component {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }
}

/// All components of one running application
#[derive(Debug, Default)]
pub struct Registry {
    components: IndexMap<String, Component>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component. Ids must be unique within the registry.
    pub fn add_component(
        &mut self,
        id: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        if !is_component_id(&id) {
            return Err(RegistryError::InvalidId { what: "component id", value: id });
        }
        if self.components.contains_key(&id) {
            return Err(RegistryError::DuplicateComponent(id));
        }

        log::debug!("Registered component {}", id);
        self.components.insert(
            id.clone(),
            Component {
                id,
                description: description.into(),
                actions: IndexMap::new(),
                controls: Vec::new(),
            },
        );
        Ok(())
    }

    /// Bind `action_name` on an already-added component.
    pub fn register<F>(
        &mut self,
        component_id: &str,
        action_name: &str,
        schema: ParamSchema,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        if !is_action_name(action_name) {
            return Err(RegistryError::InvalidId { what: "action name", value: action_name.to_string() });
        }
        for spec in schema.params() {
            if !is_action_name(&spec.name) {
                return Err(RegistryError::InvalidId { what: "parameter name", value: spec.name.clone() });
            }
        }

        let component = self.component_mut(component_id)?;
        if component.actions.contains_key(action_name) {
            return Err(RegistryError::DuplicateAction {
                component: component_id.to_string(),
                action: action_name.to_string(),
            });
        }

        log::debug!("Registered action {}/{} ({} params)", component_id, action_name, schema.len());
        component.actions.insert(
            action_name.to_string(),
            Action {
                name: action_name.to_string(),
                schema,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Declare a UI control. Every action it references must already exist.
    ///
    /// Element ids name the generated files and are unique across the whole
    /// registry, not just within the component.
    pub fn add_control(&mut self, component_id: &str, control: Control) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidControl {
            component: component_id.to_string(),
            kind: control.kind(),
            reason,
        };

        let element_id = control.element_id(component_id);
        let taken = element_id == crate::codegen::HEARTBEAT_ELEMENT
            || self.components.values().any(|c| c.controls.iter().any(|ctl| ctl.element_id(&c.id) == element_id));
        if taken {
            return Err(invalid(format!("element id '{}' is already used", element_id)));
        }

        let component = self.component_mut(component_id)?;

        for action in control.actions() {
            if !component.actions.contains_key(action) {
                return Err(RegistryError::UnknownAction {
                    component: component_id.to_string(),
                    action: action.to_string(),
                });
            }
        }

        match &control {
            Control::Toggle(_) => {}
            Control::Slider(slider) => {
                let schema = component.actions[slider.action.as_str()].schema();
                match schema.params() {
                    [spec] if spec.ty.is_numeric() => {}
                    _ => {
                        return Err(invalid(format!(
                            "action '{}' must take exactly one int or float parameter",
                            slider.action
                        )));
                    }
                }
                if slider.min > slider.max || slider.step <= 0 {
                    return Err(invalid(format!(
                        "range {}..={} with step {} is empty",
                        slider.min, slider.max, slider.step
                    )));
                }
                if !(slider.min..=slider.max).contains(&slider.initial) {
                    return Err(invalid(format!("initial value {} is out of range", slider.initial)));
                }
            }
            Control::Button(button) => {
                if button.pressed.is_none() && button.released.is_none() {
                    return Err(invalid("either a pressed or released action is required".into()));
                }
                if let Some(suffix) = &button.suffix
                    && !is_action_name(suffix)
                {
                    return Err(invalid(format!("suffix '{}' is not a valid name", suffix)));
                }
                for call in button.pressed.iter().chain(button.released.iter()) {
                    let schema = component.actions[call.action.as_str()].schema();
                    check_call_args(call, schema)
                        .map_err(|reason| invalid(format!("arguments for '{}': {}", call.action, reason)))?;
                }
            }
            Control::Label(label) => {
                if !component.actions[label.action.as_str()].schema().is_empty() {
                    return Err(invalid(format!("action '{}' must take no parameters", label.action)));
                }
                if let Some(checkbox) = &label.pause_for_checkbox
                    && !is_component_id(checkbox)
                {
                    return Err(invalid(format!("checkbox id '{}' is not a valid element id", checkbox)));
                }
            }
            Control::Repeater(repeater) => {
                if !component.actions[repeater.action.as_str()].schema().is_empty() {
                    return Err(invalid(format!("action '{}' must take no parameters", repeater.action)));
                }
            }
        }

        log::debug!("Added {} control {}", control.kind(), element_id);
        component.controls.push(control);
        Ok(())
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    /// Components in registration order
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn component_mut(&mut self, id: &str) -> Result<&mut Component, RegistryError> {
        self.components
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownComponent(id.to_string()))
    }
}

/// Fixed arguments cover every parameter not read from the page; page-read
/// arguments name declared parameters of the same type.
fn check_call_args(call: &ActionCall, schema: &ParamSchema) -> Result<(), String> {
    let mut fixed_schema = ParamSchema::empty();
    for spec in schema.params() {
        if !call.dynamic_args.iter().any(|d| d.name == spec.name) {
            fixed_schema = fixed_schema.param(spec.name.clone(), spec.ty);
        }
    }

    for (i, dynamic) in call.dynamic_args.iter().enumerate() {
        match schema.get(&dynamic.name) {
            Some(spec) if spec.ty == dynamic.ty => {}
            Some(spec) => return Err(format!("'{}' is declared {} not {}", dynamic.name, spec.ty, dynamic.ty)),
            None => return Err(ParamError::Unexpected(dynamic.name.clone()).to_string()),
        }
        if call.dynamic_args[..i].iter().any(|d| d.name == dynamic.name) {
            return Err(ParamError::Duplicate(dynamic.name.clone()).to_string());
        }
        if !is_component_id(&dynamic.element_id) {
            return Err(format!("element id '{}' is not valid", dynamic.element_id));
        }
    }

    let query: Vec<(String, String)> = call
        .args
        .iter()
        .map(|(name, value)| (name.clone(), value.to_query_value()))
        .collect();
    fixed_schema.coerce(&query).map(|_| ()).map_err(|e| e.to_string())
}

/// Letter first, then letters, digits, `-` or `_`. Ids become DOM ids and JS names.
fn is_component_id(id: &str) -> bool {
    let mut chars = id.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_action_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn noop(_: &Args) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    fn servo_registry() -> Registry {
        let mut registry = Registry::new();
        registry.add_component("servo-1", "Servo").unwrap();
        registry.register("servo-1", "start", ParamSchema::empty(), noop).unwrap();
        registry.register("servo-1", "stop", ParamSchema::empty(), noop).unwrap();
        registry
            .register(
                "servo-1",
                "set_degrees",
                ParamSchema::empty().param("degrees", ParamType::Int),
                noop,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let mut registry = servo_registry();
        assert_eq!(
            registry.add_component("servo-1", "again"),
            Err(RegistryError::DuplicateComponent("servo-1".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_requires_component() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.register("ghost", "start", ParamSchema::empty(), noop),
            Err(RegistryError::UnknownComponent("ghost".into()))
        );
    }

    #[test]
    fn test_duplicate_action_rejected() {
        let mut registry = servo_registry();
        assert!(matches!(
            registry.register("servo-1", "start", ParamSchema::empty(), noop),
            Err(RegistryError::DuplicateAction { .. })
        ));
    }

    #[test]
    fn test_id_validation() {
        let mut registry = Registry::new();
        for bad in ["", "1servo", "servo 1", "servo/1", "<b>"] {
            assert!(matches!(
                registry.add_component(bad, ""),
                Err(RegistryError::InvalidId { .. })
            ), "accepted {:?}", bad);
        }
        registry.add_component("led_2-a", "").unwrap();
        assert!(matches!(
            registry.register("led_2-a", "turn-on", ParamSchema::empty(), noop),
            Err(RegistryError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_controls_validated() {
        let mut registry = servo_registry();
        registry
            .add_control("servo-1", Control::Toggle(Toggle::new("start", "stop")))
            .unwrap();
        registry
            .add_control("servo-1", Control::Slider(Slider::new("set_degrees", 0, 180)))
            .unwrap();

        // slider on a parameterless action
        assert!(matches!(
            registry.add_control("servo-1", Control::Slider(Slider::new("start", 0, 1))),
            Err(RegistryError::InvalidControl { .. })
        ));
        // unknown action
        assert!(matches!(
            registry.add_control("servo-1", Control::Toggle(Toggle::new("start", "halt"))),
            Err(RegistryError::UnknownAction { .. })
        ));
        // same element twice
        assert!(matches!(
            registry.add_control("servo-1", Control::Toggle(Toggle::new("start", "stop"))),
            Err(RegistryError::InvalidControl { .. })
        ));
        // button args must satisfy the schema
        let bad_button = Button::pressed(
            ActionCall::new("set_degrees").arg("degrees", ParamValue::Str("ninety".into())),
        );
        assert!(matches!(
            registry.add_control("servo-1", Control::Button(bad_button)),
            Err(RegistryError::InvalidControl { .. })
        ));

        // suffix ends up in the DOM id and file name
        let bad_suffix = Button::pressed(ActionCall::new("start")).suffix("a b\"><img src=x>");
        assert!(matches!(
            registry.add_control("servo-1", Control::Button(bad_suffix)),
            Err(RegistryError::InvalidControl { .. })
        ));
        registry
            .add_control("servo-1", Control::Button(Button::pressed(ActionCall::new("start")).suffix("space_2")))
            .unwrap();

        assert_eq!(registry.component("servo-1").unwrap().controls().len(), 3);
    }

    #[test]
    fn test_element_ids_unique_across_components() {
        let mut registry = Registry::new();
        registry.add_component("a", "").unwrap();
        registry.register("a", "b", ParamSchema::empty(), noop).unwrap();
        registry.register("a", "c", ParamSchema::empty(), noop).unwrap();
        registry.add_component("a-b", "").unwrap();
        registry.register("a-b", "c", ParamSchema::empty().param("level", ParamType::Int), noop).unwrap();

        registry.add_control("a", Control::Toggle(Toggle::new("b", "c"))).unwrap();
        let err = registry
            .add_control("a-b", Control::Slider(Slider::new("c", 0, 10)))
            .unwrap_err();
        assert!(err.to_string().contains("'a-b-c' is already used"), "{}", err);
        assert!(registry.component("a-b").unwrap().controls().is_empty());

        registry.add_component("connection", "").unwrap();
        registry.register("connection", "heartbeat", ParamSchema::empty(), noop).unwrap();
        assert!(matches!(
            registry.add_control("connection", Control::Label(Label::new("heartbeat", Duration::from_secs(1)))),
            Err(RegistryError::InvalidControl { .. })
        ));
    }

    #[test]
    fn test_button_args_read_from_page() {
        let mut registry = Registry::new();
        registry.add_component("lcd", "").unwrap();
        registry
            .register(
                "lcd",
                "say",
                ParamSchema::empty().param("msg", ParamType::Str).param("line", ParamType::Int),
                noop,
            )
            .unwrap();

        let call = ActionCall::new("say")
            .arg("line", ParamValue::Int(1))
            .arg_from_element("msg", ParamType::Str, "lcd-text");
        registry.add_control("lcd", Control::Button(Button::pressed(call))).unwrap();

        let wrong_type = ActionCall::new("say")
            .arg("line", ParamValue::Int(1))
            .arg_from_element("msg", ParamType::Int, "lcd-text");
        let both = ActionCall::new("say")
            .arg("line", ParamValue::Int(1))
            .arg("msg", ParamValue::Str("hi".into()))
            .arg_from_element("msg", ParamType::Str, "lcd-text");
        let uncovered = ActionCall::new("say").arg_from_element("msg", ParamType::Str, "lcd-text");
        let bad_element = ActionCall::new("say")
            .arg("line", ParamValue::Int(1))
            .arg_from_element("msg", ParamType::Str, "#text");
        for (i, call) in [wrong_type, both, uncovered, bad_element].into_iter().enumerate() {
            let button = Button::pressed(call).suffix(format!("b{}", i));
            assert!(matches!(
                registry.add_control("lcd", Control::Button(button)),
                Err(RegistryError::InvalidControl { .. })
            ), "case {}", i);
        }
    }

    #[test]
    fn test_label_checkbox_and_repeater_validated() {
        let mut registry = servo_registry();
        assert!(matches!(
            registry.add_control(
                "servo-1",
                Control::Label(Label::new("start", Duration::from_secs(1)).pause_for_checkbox("cam on"))
            ),
            Err(RegistryError::InvalidControl { .. })
        ));
        assert!(matches!(
            registry.add_control("servo-1", Control::Repeater(Repeater::new("set_degrees", Duration::from_secs(1)))),
            Err(RegistryError::InvalidControl { .. })
        ));
        registry
            .add_control("servo-1", Control::Repeater(Repeater::new("stop", Duration::from_secs(1))))
            .unwrap();
    }

    #[test]
    fn test_components_keep_registration_order() {
        let mut registry = Registry::new();
        for id in ["relay-1", "led-1", "servo-1"] {
            registry.add_component(id, "").unwrap();
        }
        let ids: Vec<_> = registry.components().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["relay-1", "led-1", "servo-1"]);
    }
}

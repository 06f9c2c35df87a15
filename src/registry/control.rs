//! UI control descriptors.
//!
//! A control says which HTML affordance renders which action(s). The
//! registry validates descriptors against action schemas when they are
//! added; `codegen` turns them into fragments.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use super::schema::{ParamType, ParamValue};

/// Bytes escaped in generated query strings. `:` stays readable in `type:value`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~').remove(b':');

/// Keyboard keys the browser reports for arrow keys (old and new names)
pub const LEFT_ARROW_KEYS: &[&str] = &["Left", "ArrowLeft"];
pub const RIGHT_ARROW_KEYS: &[&str] = &["Right", "ArrowRight"];
pub const UP_ARROW_KEYS: &[&str] = &["Up", "ArrowUp"];
pub const DOWN_ARROW_KEYS: &[&str] = &["Down", "ArrowDown"];
pub const SPACE_KEY: &[&str] = &[" "];

/// A declared UI affordance
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Toggle(Toggle),
    Slider(Slider),
    Button(Button),
    Label(Label),
    Repeater(Repeater),
}

impl Control {
    /// Names of every action the control calls
    pub fn actions(&self) -> Vec<&str> {
        match self {
            Control::Toggle(t) => vec![t.on_action.as_str(), t.off_action.as_str()],
            Control::Slider(s) => vec![s.action.as_str()],
            Control::Button(b) => b
                .pressed
                .iter()
                .chain(b.released.iter())
                .map(|c| c.action.as_str())
                .collect(),
            Control::Label(l) => vec![l.action.as_str()],
            Control::Repeater(r) => vec![r.action.as_str()],
        }
    }

    /// DOM id of the generated element; also the fragment file stem.
    pub fn element_id(&self, component_id: &str) -> String {
        match self {
            Control::Toggle(t) => format!("{}-{}-{}", component_id, t.on_action, t.off_action),
            Control::Slider(s) => format!("{}-{}", component_id, s.action),
            Control::Button(b) => {
                let mut parts = vec![component_id];
                parts.extend(b.pressed.iter().map(|c| c.action.as_str()));
                parts.extend(b.released.iter().map(|c| c.action.as_str()));
                parts.extend(b.suffix.as_deref());
                parts.join("-")
            }
            Control::Label(l) => format!("{}-{}", component_id, l.action),
            Control::Repeater(r) => format!("{}-{}", component_id, r.action),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Control::Toggle(_) => "toggle",
            Control::Slider(_) => "slider",
            Control::Button(_) => "button",
            Control::Label(_) => "label",
            Control::Repeater(_) => "repeater",
        }
    }
}

/// Checkbox switch calling `on_action` when checked and `off_action` when cleared
#[derive(Debug, Clone, PartialEq)]
pub struct Toggle {
    pub on_action: String,
    pub off_action: String,
    pub text: Option<String>,
    pub initially_on: bool,
}

impl Toggle {
    pub fn new(on_action: impl Into<String>, off_action: impl Into<String>) -> Self {
        Self {
            on_action: on_action.into(),
            off_action: off_action.into(),
            text: None,
            initially_on: false,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn initially_on(mut self, on: bool) -> Self {
        self.initially_on = on;
        self
    }
}

/// Range input feeding its value into the single numeric parameter of `action`
#[derive(Debug, Clone, PartialEq)]
pub struct Slider {
    pub action: String,
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub initial: i64,
    pub text: Option<String>,
    pub vertical: bool,
    /// Snap back to `initial` on mouseup/touchend
    pub reset_on_release: bool,
    /// Jump to zero before stepping in the opposite direction
    pub zero_on_direction_change: bool,
    /// Shift plus a decrement/increment key jumps to `min`/`max`; releasing it returns to `initial`
    pub shift_sets_extreme: bool,
    pub decrement_keys: Vec<String>,
    pub increment_keys: Vec<String>,
    pub reset_keys: Vec<String>,
}

impl Slider {
    pub fn new(action: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            action: action.into(),
            min,
            max,
            step: 1,
            initial: min,
            text: None,
            vertical: false,
            reset_on_release: false,
            zero_on_direction_change: false,
            shift_sets_extreme: false,
            decrement_keys: Vec::new(),
            increment_keys: Vec::new(),
            reset_keys: Vec::new(),
        }
    }

    pub fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    pub fn initial(mut self, initial: i64) -> Self {
        self.initial = initial;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn vertical(mut self, vertical: bool) -> Self {
        self.vertical = vertical;
        self
    }

    pub fn reset_on_release(mut self, reset: bool) -> Self {
        self.reset_on_release = reset;
        self
    }

    pub fn zero_on_direction_change(mut self, zero: bool) -> Self {
        self.zero_on_direction_change = zero;
        self
    }

    pub fn shift_sets_extreme(mut self, extreme: bool) -> Self {
        self.shift_sets_extreme = extreme;
        self
    }

    pub fn keys(mut self, decrement: &[&str], increment: &[&str]) -> Self {
        self.decrement_keys = decrement.iter().map(|k| k.to_string()).collect();
        self.increment_keys = increment.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn reset_keys(mut self, keys: &[&str]) -> Self {
        self.reset_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// Argument read from another element's `value` when the call fires
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicArg {
    pub name: String,
    pub ty: ParamType,
    pub element_id: String,
}

/// An action call with fixed arguments, plus any read from the page at call time
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    pub action: String,
    pub args: Vec<(String, ParamValue)>,
    pub dynamic_args: Vec<DynamicArg>,
}

impl ActionCall {
    pub fn new(action: impl Into<String>) -> Self {
        Self { action: action.into(), args: Vec::new(), dynamic_args: Vec::new() }
    }

    pub fn arg(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.args.push((name.into(), value));
        self
    }

    /// Take `name` from the element `element_id` (a textbox, select, ...) when called.
    pub fn arg_from_element(mut self, name: impl Into<String>, ty: ParamType, element_id: impl Into<String>) -> Self {
        self.dynamic_args.push(DynamicArg { name: name.into(), ty, element_id: element_id.into() });
        self
    }

    /// Percent-encoded query string of the fixed arguments, without the leading `?`
    pub fn query(&self) -> String {
        self.args
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(name, QUERY_VALUE),
                    utf8_percent_encode(&value.to_query_value(), QUERY_VALUE)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Push button with optional press/release calls and keyboard shortcut
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub pressed: Option<ActionCall>,
    pub released: Option<ActionCall>,
    pub key: Option<String>,
    pub text: Option<String>,
    /// Disambiguates several buttons bound to the same actions
    pub suffix: Option<String>,
}

impl Button {
    pub fn pressed(call: ActionCall) -> Self {
        Self { pressed: Some(call), released: None, key: None, text: None, suffix: None }
    }

    pub fn released(mut self, call: ActionCall) -> Self {
        self.released = Some(call);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }
}

/// Read-only label refreshed by calling `action` on a fixed interval
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub action: String,
    pub refresh: Duration,
    pub text: Option<String>,
    pub float_precision: Option<u8>,
    /// Checkbox that must be checked before each refresh
    pub pause_for_checkbox: Option<String>,
}

impl Label {
    pub fn new(action: impl Into<String>, refresh: Duration) -> Self {
        Self { action: action.into(), refresh, text: None, float_precision: None, pause_for_checkbox: None }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn float_precision(mut self, digits: u8) -> Self {
        self.float_precision = Some(digits);
        self
    }

    pub fn pause_for_checkbox(mut self, element_id: impl Into<String>) -> Self {
        self.pause_for_checkbox = Some(element_id.into());
        self
    }
}

/// Script-only control that calls `action` forever, `refresh` apart, ignoring failures
#[derive(Debug, Clone, PartialEq)]
pub struct Repeater {
    pub action: String,
    pub refresh: Duration,
}

impl Repeater {
    pub fn new(action: impl Into<String>, refresh: Duration) -> Self {
        Self { action: action.into(), refresh }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_ids() {
        let toggle = Control::Toggle(Toggle::new("start", "stop"));
        assert_eq!(toggle.element_id("servo-1"), "servo-1-start-stop");

        let slider = Control::Slider(Slider::new("set_degrees", 0, 180));
        assert_eq!(slider.element_id("servo-1"), "servo-1-set_degrees");

        let button = Control::Button(
            Button::pressed(ActionCall::new("forward"))
                .released(ActionCall::new("stop"))
                .suffix("w"),
        );
        assert_eq!(button.element_id("car"), "car-forward-stop-w");
        assert_eq!(button.actions(), vec!["forward", "stop"]);
    }

    #[test]
    fn test_action_call_query() {
        let call = ActionCall::new("set_speed")
            .arg("speed", ParamValue::Int(40))
            .arg("smooth", ParamValue::Bool(true));
        assert_eq!(call.query(), "speed=int:40&smooth=bool:true");
    }

    #[test]
    fn test_action_call_query_escapes_reserved() {
        let call = ActionCall::new("say")
            .arg("msg", ParamValue::Str("fish & chips=50%+tax #1".into()))
            .arg("rate", ParamValue::Float(-1.5));
        assert_eq!(call.query(), "msg=str:fish%20%26%20chips%3D50%25%2Btax%20%231&rate=float:-1.5");
    }

    #[test]
    fn test_repeater_and_dynamic_args() {
        let repeater = Control::Repeater(Repeater::new("heartbeat", Duration::from_secs(1)));
        assert_eq!(repeater.element_id("car"), "car-heartbeat");
        assert_eq!(repeater.kind(), "repeater");

        let call = ActionCall::new("say").arg_from_element("msg", ParamType::Str, "lcd-text");
        assert_eq!(call.query(), "");
        assert_eq!(call.dynamic_args[0].element_id, "lcd-text");
    }
}

//! Control fragment generator.
//!
//! # Purpose
//!
//! Turns each declared [`Control`] of a component into a self-contained
//! `<element-id>.html` file (markup plus a `<script type="module">`) that a
//! page can drop in. The scripts call the REST dispatcher at
//! `http://{rest_host}:{rest_port}/call/{component}/{action}`.
//!
//! # Output layout
//!
//! ```text
//! dir/
//!   globals.js                  rest_host, rest_port, heartbeat + latency tuning
//!   utils.js                    latency EMA, sleep, call(), is_checked()
//!   heartbeat.js                run_heartbeat() liveness loop
//!   connection-heartbeat.html   status badge fragment
//!   servo-1-start-stop.html     one file per control
//!   servo-1-set_degrees.html
//! ```
//!
//! Output is a pure function of the inputs: two runs over the same registry
//! produce byte-identical files.

mod assets;
mod fragments;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::{Component, Control, Registry};

pub use assets::{HEARTBEAT_ELEMENT, HEARTBEAT_JS, UTILS_JS};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_LATENCY_ALPHA: f64 = 0.99;

/// JS string literal for `s`. `<` is escaped so the literal can't close a `<script>`.
pub fn js_str(s: &str) -> String {
    serde_json::to_string(s)
        .unwrap_or_else(|_| String::from("\"\""))
        .replace('<', "\\u003c")
}

/// Escape text placed inside HTML elements or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One generated file, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub file_name: String,
    pub content: String,
}

/// Renders fragments for components against one REST location
#[derive(Debug, Clone)]
pub struct Generator {
    rest_host: String,
    rest_port: u16,
    heartbeat_interval: Duration,
    latency_alpha: f64,
}

impl Generator {
    pub fn new(rest_host: impl Into<String>, rest_port: u16) -> Self {
        Self {
            rest_host: rest_host.into(),
            rest_port,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            latency_alpha: DEFAULT_LATENCY_ALPHA,
        }
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Smoothing factor for the generated latency readouts. Outside `[0, 1]`
    /// falls back to [`DEFAULT_LATENCY_ALPHA`].
    pub fn latency_alpha(mut self, alpha: f64) -> Self {
        self.latency_alpha = if (0.0..=1.0).contains(&alpha) {
            alpha
        } else {
            warn!("Latency alpha {} is outside [0, 1]; using {}", alpha, DEFAULT_LATENCY_ALPHA);
            DEFAULT_LATENCY_ALPHA
        };
        self
    }

    pub fn rest_host(&self) -> &str {
        &self.rest_host
    }

    pub fn rest_port(&self) -> u16 {
        self.rest_port
    }

    /// One `.html` fragment per control, in declaration order
    pub fn render_component(&self, component: &Component) -> Result<Vec<Fragment>> {
        let cid = component.id();
        let mut rendered = Vec::with_capacity(component.controls().len());

        for control in component.controls() {
            let element_id = control.element_id(cid);
            let mut out = String::new();
            match control {
                Control::Toggle(toggle) => fragments::toggle(&mut out, cid, &element_id, toggle)?,
                Control::Slider(slider) => {
                    let spec = component
                        .action(&slider.action)
                        .and_then(|action| action.schema().params().first())
                        .with_context(|| format!("Slider action {}/{} has no parameter", cid, slider.action))?;
                    fragments::slider(&mut out, cid, &element_id, slider, &spec.name, spec.ty)?
                }
                Control::Button(button) => fragments::button(&mut out, cid, &element_id, button)?,
                Control::Label(label) => fragments::label(&mut out, cid, &element_id, label, self.latency_alpha)?,
                Control::Repeater(repeater) => fragments::repeater(&mut out, cid, &element_id, repeater)?,
            }
            debug!("Rendered {} {} ({} bytes)", control.kind(), element_id, out.len());
            rendered.push(Fragment { file_name: format!("{}.html", element_id), content: out });
        }

        Ok(rendered)
    }

    /// `globals.js` and `utils.js`
    pub fn render_assets(&self) -> Result<Vec<Fragment>> {
        let globals = assets::globals_js(
            &self.rest_host,
            self.rest_port,
            self.heartbeat_interval,
            self.latency_alpha,
        )?;
        Ok(vec![
            Fragment { file_name: "globals.js".into(), content: globals },
            Fragment { file_name: "utils.js".into(), content: UTILS_JS.to_string() },
        ])
    }

    /// `heartbeat.js` and the connection status fragment
    pub fn render_heartbeat(&self) -> Result<Vec<Fragment>> {
        Ok(vec![
            Fragment { file_name: "heartbeat.js".into(), content: HEARTBEAT_JS.to_string() },
            Fragment {
                file_name: format!("{}.html", HEARTBEAT_ELEMENT),
                content: assets::heartbeat_fragment()?,
            },
        ])
    }

    /// Write one component's fragments plus the shared assets they import.
    ///
    /// A component without controls writes nothing and returns an empty list.
    pub fn write_component(&self, component: &Component, dir: &Path) -> Result<Vec<PathBuf>> {
        let fragments = self.render_component(component)?;
        if fragments.is_empty() {
            info!("Component {} declares no controls; nothing written", component.id());
            return Ok(Vec::new());
        }
        let mut all = self.render_assets()?;
        all.extend(fragments);
        write_fragments(&all, dir)
    }

    /// Write every component, the shared assets and the heartbeat fragment.
    pub fn write_all(&self, registry: &Registry, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut all = self.render_assets()?;
        all.extend(self.render_heartbeat()?);
        for component in registry.components() {
            all.extend(self.render_component(component)?);
        }
        write_fragments(&all, dir)
    }
}

fn write_fragments(fragments: &[Fragment], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut written = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let path = dir.join(&fragment.file_name);
        std::fs::write(&path, &fragment.content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Write `component`'s control fragments into `output_dir`.
pub fn generate(component: &Component, rest_host: &str, rest_port: u16, output_dir: &Path) -> Result<Vec<PathBuf>> {
    Generator::new(rest_host, rest_port).write_component(component, output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ActionCall, Button, Label, ParamSchema, ParamType, ParamValue, Repeater, Slider, Toggle};
    use serde_json::Value;

    fn servo_registry() -> Registry {
        let mut registry = Registry::new();
        registry.add_component("servo-1", "Servo").unwrap();
        registry.register("servo-1", "start", ParamSchema::empty(), |_| Ok(Value::Null)).unwrap();
        registry.register("servo-1", "stop", ParamSchema::empty(), |_| Ok(Value::Null)).unwrap();
        registry
            .register(
                "servo-1",
                "set_degrees",
                ParamSchema::empty().param("degrees", ParamType::Float),
                |_| Ok(Value::Null),
            )
            .unwrap();
        registry
            .add_control("servo-1", Control::Toggle(Toggle::new("start", "stop")))
            .unwrap();
        registry
            .add_control("servo-1", Control::Slider(Slider::new("set_degrees", 0, 180).initial(90)))
            .unwrap();
        registry
    }

    fn fragment<'a>(fragments: &'a [Fragment], name: &str) -> &'a Fragment {
        fragments.iter().find(|f| f.file_name == name).unwrap()
    }

    #[test]
    fn test_js_str_escapes_script_close() {
        assert_eq!(js_str("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_str("</script>"), "\"\\u003c/script>\"");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b> & \"q\""), "&lt;b&gt; &amp; &quot;q&quot;");
    }

    #[test]
    fn test_toggle_fragment_calls_both_actions() {
        let registry = servo_registry();
        let generator = Generator::new("localhost", 5000);
        let fragments = generator.render_component(registry.component("servo-1").unwrap()).unwrap();
        assert_eq!(fragments.len(), 2);

        let toggle = fragment(&fragments, "servo-1-start-stop.html");
        assert!(toggle.content.contains("id=\"servo-1-start-stop\""));
        assert!(toggle.content.contains("/call/servo-1/start"));
        assert!(toggle.content.contains("/call/servo-1/stop"));
        assert!(toggle.content.contains(".checked ?"));
        assert!(toggle.content.contains("\"change\""));
        assert!(toggle.content.ends_with("</script>\n"));
    }

    #[test]
    fn test_slider_uses_schema_tag() {
        let registry = servo_registry();
        let fragments = Generator::new("localhost", 5000)
            .render_component(registry.component("servo-1").unwrap())
            .unwrap();
        let slider = fragment(&fragments, "servo-1-set_degrees.html");
        assert!(slider.content.contains("/call/servo-1/set_degrees"));
        assert!(slider.content.contains("?degrees=float:"));
        assert!(slider.content.contains("min=\"0\" max=\"180\" step=\"1\" value=\"90\""));
        assert!(!slider.content.contains("keydown"));

        let mut registry = Registry::new();
        registry.add_component("motor", "DC motor").unwrap();
        registry
            .register("motor", "set_speed", ParamSchema::empty().param("speed", ParamType::Int), |_| {
                Ok(Value::Null)
            })
            .unwrap();
        registry
            .add_control(
                "motor",
                Control::Slider(
                    Slider::new("set_speed", -100, 100)
                        .initial(0)
                        .zero_on_direction_change(true)
                        .reset_on_release(true)
                        .keys(&["ArrowDown"], &["ArrowUp"]),
                ),
            )
            .unwrap();
        let fragments = Generator::new("localhost", 5000)
            .render_component(registry.component("motor").unwrap())
            .unwrap();
        let content = &fragments[0].content;
        assert!(content.contains("?speed=int:"));
        assert!(content.contains("case \"ArrowUp\":"));
        assert!(content.contains("current = 0;"));
        assert!(content.contains("\"mouseup\""));
    }

    #[test]
    fn test_button_and_label_fragments() {
        let mut registry = Registry::new();
        registry.add_component("car", "Car").unwrap();
        registry
            .register("car", "forward", ParamSchema::empty().param("speed", ParamType::Int), |_| Ok(Value::Null))
            .unwrap();
        registry.register("car", "stop", ParamSchema::empty(), |_| Ok(Value::Null)).unwrap();
        registry.register("car", "distance", ParamSchema::empty(), |_| Ok(Value::Null)).unwrap();
        registry
            .add_control(
                "car",
                Control::Button(
                    Button::pressed(ActionCall::new("forward").arg("speed", ParamValue::Int(40)))
                        .released(ActionCall::new("stop"))
                        .key("w")
                        .text("Forward"),
                ),
            )
            .unwrap();
        registry
            .add_control(
                "car",
                Control::Label(Label::new("distance", Duration::from_millis(250)).float_precision(1)),
            )
            .unwrap();

        let fragments = Generator::new("pi.local", 8080)
            .render_component(registry.component("car").unwrap())
            .unwrap();
        let button = fragment(&fragments, "car-forward-stop.html");
        assert!(button.content.contains("/call/car/forward?speed=int:40"));
        assert!(button.content.contains("\"mousedown\""));
        assert!(button.content.contains("event.key === \"w\""));

        let label = fragment(&fragments, "car-distance.html");
        assert!(label.content.contains("await sleep(250);"));
        assert!(label.content.contains("toFixed(1)"));
        assert!(label.content.contains("textContent"));
    }

    #[test]
    fn test_button_encodes_fixed_and_page_args() {
        let mut registry = Registry::new();
        registry.add_component("lcd", "LCD").unwrap();
        registry
            .register(
                "lcd",
                "say",
                ParamSchema::empty().param("msg", ParamType::Str).param("line", ParamType::Int),
                |_| Ok(Value::Null),
            )
            .unwrap();
        registry.register("lcd", "clear", ParamSchema::empty().param("msg", ParamType::Str), |_| Ok(Value::Null)).unwrap();
        registry
            .add_control(
                "lcd",
                Control::Button(Button::pressed(
                    ActionCall::new("say")
                        .arg("line", ParamValue::Int(2))
                        .arg_from_element("msg", ParamType::Str, "lcd-text"),
                )),
            )
            .unwrap();
        registry
            .add_control(
                "lcd",
                Control::Button(Button::pressed(
                    ActionCall::new("clear").arg("msg", ParamValue::Str("fish & chips".into())),
                )),
            )
            .unwrap();

        let fragments = Generator::new("localhost", 5000)
            .render_component(registry.component("lcd").unwrap())
            .unwrap();
        let say = fragment(&fragments, "lcd-say.html");
        assert!(say.content.contains(
            "\"/call/lcd/say?line=int:2\" + \"&msg=str:\" + encodeURIComponent(document.getElementById(\"lcd-text\").value)"
        ));
        let clear = fragment(&fragments, "lcd-clear.html");
        assert!(clear.content.contains("/call/lcd/clear?msg=str:fish%20%26%20chips\""));
    }

    #[test]
    fn test_slider_shift_sets_extreme() {
        let mut registry = Registry::new();
        registry.add_component("servo", "Servo").unwrap();
        registry
            .register("servo", "set_degrees", ParamSchema::empty().param("degrees", ParamType::Int), |_| {
                Ok(Value::Null)
            })
            .unwrap();
        registry
            .add_control(
                "servo",
                Control::Slider(
                    Slider::new("set_degrees", 0, 180)
                        .initial(90)
                        .keys(&["a"], &["d"])
                        .shift_sets_extreme(true),
                ),
            )
            .unwrap();
        let fragments = Generator::new("localhost", 5000)
            .render_component(registry.component("servo").unwrap())
            .unwrap();
        let content = &fragments[0].content;
        assert!(content.contains("case \"A\":"));
        assert!(content.contains("if (event.shiftKey) {\n        next = 0;"));
        assert!(content.contains("if (event.shiftKey) {\n        next = 180;"));
        assert!(content.contains("\"keyup\""));
        assert!(content.contains("servo_set_degrees(90, true);"));
    }

    #[test]
    fn test_label_pause_and_repeater() {
        let mut registry = Registry::new();
        registry.add_component("cam", "Camera").unwrap();
        registry.register("cam", "capture", ParamSchema::empty(), |_| Ok(Value::Null)).unwrap();
        registry.register("cam", "keep_alive", ParamSchema::empty(), |_| Ok(Value::Null)).unwrap();
        registry
            .add_control(
                "cam",
                Control::Label(Label::new("capture", Duration::from_secs(2)).pause_for_checkbox("cam-enabled")),
            )
            .unwrap();
        registry
            .add_control("cam", Control::Repeater(Repeater::new("keep_alive", Duration::from_millis(750))))
            .unwrap();

        let fragments = Generator::new("localhost", 5000)
            .render_component(registry.component("cam").unwrap())
            .unwrap();
        let label = fragment(&fragments, "cam-capture.html");
        assert!(label.content.contains("await is_checked(\"cam-enabled\");"));

        let repeater = fragment(&fragments, "cam-keep_alive.html");
        assert!(repeater.content.starts_with("<script type=\"module\">"));
        assert!(repeater.content.contains("/call/cam/keep_alive"));
        assert!(repeater.content.contains("await sleep(750);"));
        assert!(repeater.content.contains("repeat_cam_keep_alive();"));

        let utils = fragment(&Generator::new("localhost", 5000).render_assets().unwrap(), "utils.js").content.clone();
        assert!(utils.contains("export async function is_checked(element_id)"));
    }

    #[test]
    fn test_latency_alpha_out_of_range_falls_back() {
        for bad in [1.5, -0.1, f64::NAN] {
            let assets = Generator::new("pi.local", 8080).latency_alpha(bad).render_assets().unwrap();
            assert!(fragment(&assets, "globals.js").content.contains("export const latency_alpha = 0.99;"), "{}", bad);
        }
        let assets = Generator::new("pi.local", 8080).latency_alpha(0.5).render_assets().unwrap();
        assert!(fragment(&assets, "globals.js").content.contains("export const latency_alpha = 0.5;"));
    }

    #[test]
    fn test_assets_carry_rest_location() {
        let assets = Generator::new("pi.local", 8080).render_assets().unwrap();
        let globals = fragment(&assets, "globals.js");
        assert!(globals.content.contains("export const rest_host = \"pi.local\";"));
        assert!(globals.content.contains("export const rest_port = 8080;"));
        assert!(globals.content.contains("export const heartbeat_interval_ms = 500;"));
    }

    #[test]
    fn test_no_controls_writes_nothing() {
        let mut registry = Registry::new();
        registry.add_component("quiet", "No controls").unwrap();
        let dir = std::env::temp_dir().join(format!("pi-remote-codegen-empty-{}", std::process::id()));
        let written = generate(registry.component("quiet").unwrap(), "localhost", 5000, &dir).unwrap();
        assert!(written.is_empty());
        assert!(!dir.exists());
    }

    #[test]
    fn test_generate_is_deterministic() {
        let registry = servo_registry();
        let component = registry.component("servo-1").unwrap();
        let dir = std::env::temp_dir().join(format!("pi-remote-codegen-{}", std::process::id()));

        let first = generate(component, "localhost", 5000, &dir).unwrap();
        let snapshot: Vec<Vec<u8>> = first.iter().map(|p| std::fs::read(p).unwrap()).collect();
        let second = generate(component, "localhost", 5000, &dir).unwrap();
        assert_eq!(first, second);
        for (path, before) in second.iter().zip(snapshot) {
            assert_eq!(std::fs::read(path).unwrap(), before);
        }

        let _ = std::fs::remove_dir_all(&dir);
    }
}

//! Markup + module script for each control kind.
//!
//! Every fragment imports the REST location from `./globals.js` and builds
//! `http://{rest_host}:{rest_port}/call/{component}/{action}` URLs. Element
//! ids come from [`crate::registry::Control::element_id`]; JS names are the same id with `-`
//! replaced by `_` (ids are validated to make that a legal identifier).

use std::fmt::{self, Write};

use super::{escape_html, js_str};
use crate::registry::{ActionCall, Button, Label, ParamType, Repeater, Slider, Toggle};

/// Expression evaluating to the absolute URL for `component/action`, with an optional static query
fn call_url(component_id: &str, action: &str, query: &str) -> String {
    let path = if query.is_empty() {
        format!("/call/{}/{}", component_id, action)
    } else {
        format!("/call/{}/{}?{}", component_id, action, query)
    };
    format!("\"http://\" + rest_host + \":\" + rest_port + {}", js_str(&path))
}

fn js_var(element_id: &str) -> String {
    element_id.replace('-', "_")
}

pub fn toggle(out: &mut String, component_id: &str, element_id: &str, toggle: &Toggle) -> fmt::Result {
    let var = js_var(element_id);
    let text = toggle
        .text
        .clone()
        .unwrap_or_else(|| format!("{} {}/{}", component_id, toggle.on_action, toggle.off_action));
    let checked = if toggle.initially_on { " checked" } else { "" };

    writeln!(out, "<div class=\"form-check form-switch\">")?;
    writeln!(out, "  <label class=\"form-check-label\" for=\"{}\">{}</label>", element_id, escape_html(&text))?;
    writeln!(
        out,
        "  <input class=\"form-check-input\" type=\"checkbox\" role=\"switch\" id=\"{}\"{} />",
        element_id, checked
    )?;
    writeln!(out, "</div>")?;
    writeln!(out, "<script type=\"module\">")?;
    writeln!(out, "import {{rest_host, rest_port}} from \"./globals.js\";")?;
    writeln!(out, "import {{call}} from \"./utils.js\";")?;
    writeln!(out, "const {} = document.getElementById({});", var, js_str(element_id))?;
    writeln!(out, "{}.addEventListener(\"change\", function () {{", var)?;
    writeln!(
        out,
        "  const url = {}.checked ? {} : {};",
        var,
        call_url(component_id, &toggle.on_action, ""),
        call_url(component_id, &toggle.off_action, "")
    )?;
    writeln!(out, "  call(url).catch(error => console.log(error));")?;
    writeln!(out, "}});")?;
    writeln!(out, "</script>")
}

pub fn slider(
    out: &mut String,
    component_id: &str,
    element_id: &str,
    slider: &Slider,
    param: &str,
    param_type: ParamType,
) -> fmt::Result {
    let var = js_var(element_id);
    let range_var = format!("{}_range", var);
    let text = slider
        .text
        .clone()
        .unwrap_or_else(|| format!("{} {}", component_id, slider.action));
    let vertical = if slider.vertical { " orient=\"vertical\"" } else { "" };
    let tag = if param_type == ParamType::Float { "float" } else { "int" };
    let url = format!(
        "{} + {}",
        call_url(component_id, &slider.action, ""),
        js_str(&format!("?{}={}:", param, tag))
    );

    writeln!(out, "<div class=\"range\">")?;
    writeln!(out, "  <label for=\"{}\" class=\"form-label\">{}</label>", element_id, escape_html(&text))?;
    writeln!(
        out,
        "  <input type=\"range\"{} class=\"form-range\" min=\"{}\" max=\"{}\" step=\"{}\" value=\"{}\" id=\"{}\" />",
        vertical, slider.min, slider.max, slider.step, slider.initial, element_id
    )?;
    writeln!(out, "</div>")?;
    writeln!(out, "<script type=\"module\">")?;
    writeln!(out, "import {{rest_host, rest_port}} from \"./globals.js\";")?;
    writeln!(out, "import {{call}} from \"./utils.js\";")?;
    writeln!(out, "const {} = document.getElementById({});", range_var, js_str(element_id))?;
    writeln!(out, "function {}(value, set_range) {{", var)?;
    writeln!(out, "  if (value < {} || value > {}) {{", slider.min, slider.max)?;
    writeln!(out, "    return;")?;
    writeln!(out, "  }}")?;
    writeln!(out, "  call({} + value).catch(error => console.log(error));", url)?;
    writeln!(out, "  if (set_range) {{")?;
    writeln!(out, "    {}.value = value;", range_var)?;
    writeln!(out, "  }}")?;
    writeln!(out, "}}")?;
    writeln!(out, "{}.addEventListener(\"input\", function () {{", range_var)?;
    writeln!(out, "  {}(parseInt({}.value), false);", var, range_var)?;
    writeln!(out, "}});")?;

    if slider.reset_on_release {
        for event in ["mouseup", "touchend"] {
            writeln!(out, "{}.addEventListener(\"{}\", function () {{", range_var, event)?;
            writeln!(out, "  {}({}, true);", var, slider.initial)?;
            writeln!(out, "}});")?;
        }
    }

    let has_keys =
        !(slider.decrement_keys.is_empty() && slider.increment_keys.is_empty() && slider.reset_keys.is_empty());
    if has_keys {
        writeln!(out, "window.addEventListener(\"keydown\", (event) => {{")?;
        writeln!(out, "  let current = parseInt({}.value);", range_var)?;
        writeln!(out, "  let next = current;")?;
        writeln!(out, "  switch (event.key) {{")?;
        if !slider.decrement_keys.is_empty() {
            key_cases(out, &shifted_keys(&slider.decrement_keys, slider.shift_sets_extreme))?;
            if slider.shift_sets_extreme {
                writeln!(out, "      if (event.shiftKey) {{")?;
                writeln!(out, "        next = {};", slider.min)?;
                writeln!(out, "        break;")?;
                writeln!(out, "      }}")?;
            }
            if slider.zero_on_direction_change {
                writeln!(out, "      if (current > 0) {{")?;
                writeln!(out, "        current = 0;")?;
                writeln!(out, "      }}")?;
            }
            writeln!(out, "      next = current - {};", slider.step)?;
            writeln!(out, "      break;")?;
        }
        if !slider.increment_keys.is_empty() {
            key_cases(out, &shifted_keys(&slider.increment_keys, slider.shift_sets_extreme))?;
            if slider.shift_sets_extreme {
                writeln!(out, "      if (event.shiftKey) {{")?;
                writeln!(out, "        next = {};", slider.max)?;
                writeln!(out, "        break;")?;
                writeln!(out, "      }}")?;
            }
            if slider.zero_on_direction_change {
                writeln!(out, "      if (current < 0) {{")?;
                writeln!(out, "        current = 0;")?;
                writeln!(out, "      }}")?;
            }
            writeln!(out, "      next = current + {};", slider.step)?;
            writeln!(out, "      break;")?;
        }
        if !slider.reset_keys.is_empty() {
            key_cases(out, &slider.reset_keys)?;
            writeln!(out, "      next = {};", slider.initial)?;
            writeln!(out, "      break;")?;
        }
        writeln!(out, "    default:")?;
        writeln!(out, "      return;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  if (next !== parseInt({}.value)) {{", range_var)?;
        writeln!(out, "    {}(next, true);", var)?;
        writeln!(out, "  }}")?;
        writeln!(out, "  event.preventDefault();")?;
        writeln!(out, "}}, true);")?;
    }

    let extreme_keys: Vec<String> = slider.decrement_keys.iter().chain(&slider.increment_keys).cloned().collect();
    let extreme_keys = shifted_keys(&extreme_keys, true);
    if slider.shift_sets_extreme && !extreme_keys.is_empty() {
        writeln!(out, "window.addEventListener(\"keyup\", (event) => {{")?;
        writeln!(out, "  if (!event.shiftKey) {{")?;
        writeln!(out, "    return;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  switch (event.key) {{")?;
        key_cases(out, &extreme_keys)?;
        writeln!(out, "      {}({}, true);", var, slider.initial)?;
        writeln!(out, "      event.preventDefault();")?;
        writeln!(out, "      break;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "}}, true);")?;
    }

    writeln!(out, "</script>")
}

/// With shift held, letter keys report their upper case
fn shifted_keys(keys: &[String], shift: bool) -> Vec<String> {
    let mut all = keys.to_vec();
    if shift {
        for key in keys {
            let upper = key.to_uppercase();
            if key.chars().count() == 1 && !all.contains(&upper) {
                all.push(upper);
            }
        }
    }
    all
}

fn key_cases(out: &mut String, keys: &[String]) -> fmt::Result {
    for key in keys {
        writeln!(out, "    case {}:", js_str(key))?;
    }
    Ok(())
}

pub fn button(out: &mut String, component_id: &str, element_id: &str, button: &Button) -> fmt::Result {
    let var = js_var(element_id);
    let text = button.text.clone().unwrap_or_else(|| component_id.to_string());
    // Meta combinations only show up in event.code
    let key_field = match &button.key {
        Some(key) if key.contains("Meta") => "event.code",
        _ => "event.key",
    };

    writeln!(
        out,
        "<button type=\"button\" class=\"btn btn-primary\" id=\"{}\">{}</button>",
        element_id,
        escape_html(&text)
    )?;
    writeln!(out, "<script type=\"module\">")?;
    writeln!(out, "import {{rest_host, rest_port}} from \"./globals.js\";")?;
    writeln!(out, "import {{call}} from \"./utils.js\";")?;
    writeln!(out, "const {} = document.getElementById({});", var, js_str(element_id))?;

    let phases = [
        (&button.pressed, "on_press", ["mousedown", "touchstart"], "keydown"),
        (&button.released, "on_release", ["mouseup", "touchend"], "keyup"),
    ];
    for (call, prefix, pointer_events, key_event) in phases {
        let Some(call) = call else { continue };
        let function = format!("{}_{}", prefix, call.action);

        writeln!(out, "function {}() {{", function)?;
        writeln!(
            out,
            "  call({}).catch(error => console.log(error));",
            button_call_url(component_id, call)
        )?;
        writeln!(out, "}}")?;
        for event in pointer_events {
            writeln!(out, "{}.addEventListener(\"{}\", {});", var, event, function)?;
        }
        if let Some(key) = &button.key {
            writeln!(out, "window.addEventListener(\"{}\", (event) => {{", key_event)?;
            writeln!(out, "  if ({} === {} && !event.repeat) {{", key_field, js_str(key))?;
            writeln!(out, "    {}();", function)?;
            writeln!(out, "    event.preventDefault();")?;
            writeln!(out, "  }}")?;
            writeln!(out, "}}, true);")?;
        }
    }

    writeln!(out, "</script>")
}

/// Fixed query plus one `&name=tag:` + encoded element value per page-read argument
fn button_call_url(component_id: &str, call: &ActionCall) -> String {
    let fixed = call.query();
    let mut url = call_url(component_id, &call.action, &fixed);
    for (i, dynamic) in call.dynamic_args.iter().enumerate() {
        let separator = match (i, fixed.is_empty()) {
            (0, true) => "?",
            _ => "&",
        };
        url.push_str(&format!(
            " + {} + encodeURIComponent(document.getElementById({}).value)",
            js_str(&format!("{}{}={}:", separator, dynamic.name, dynamic.ty.tag())),
            js_str(&dynamic.element_id)
        ));
    }
    url
}

pub fn label(
    out: &mut String,
    component_id: &str,
    element_id: &str,
    label: &Label,
    latency_alpha: f64,
) -> fmt::Result {
    let var = js_var(element_id);
    let text = label.text.clone().unwrap_or_else(|| label.action.clone());
    let prefix = format!("{}:  ", text);

    writeln!(out, "<div>")?;
    writeln!(out, "  <label id=\"{}\">{}None</label>", element_id, escape_html(&prefix))?;
    writeln!(out, "</div>")?;
    writeln!(out, "<script type=\"module\">")?;
    writeln!(out, "import {{rest_host, rest_port}} from \"./globals.js\";")?;
    writeln!(
        out,
        "import {{init_latency, set_call_time, update_latency, sleep, call, is_checked}} from \"./utils.js\";"
    )?;
    writeln!(out, "const {} = document.getElementById({});", var, js_str(element_id))?;
    writeln!(out, "init_latency({}, {});", js_str(element_id), latency_alpha)?;
    writeln!(out, "async function read_{}() {{", var)?;
    writeln!(out, "  while (true) {{")?;
    if let Some(checkbox) = &label.pause_for_checkbox {
        writeln!(out, "    await is_checked({});", js_str(checkbox))?;
    }
    writeln!(out, "    set_call_time({});", js_str(element_id))?;
    writeln!(out, "    try {{")?;
    writeln!(out, "      const response = await call({});", call_url(component_id, &label.action, ""))?;
    writeln!(out, "      let value = await response.json();")?;
    writeln!(
        out,
        "      {}.title = \"Latency (ms):  \" + update_latency({}).toFixed(0);",
        var,
        js_str(element_id)
    )?;
    if let Some(digits) = label.float_precision {
        writeln!(out, "      if (value !== null) {{")?;
        writeln!(out, "        value = Number(value).toFixed({});", digits)?;
        writeln!(out, "      }}")?;
    }
    writeln!(out, "      {}.textContent = {} + (value === null ? \"None\" : value);", var, js_str(&prefix))?;
    writeln!(out, "    }}")?;
    writeln!(out, "    catch (error) {{")?;
    writeln!(out, "      console.log(error);")?;
    writeln!(out, "      {}.textContent = {} + \"None\";", var, js_str(&prefix))?;
    writeln!(out, "    }}")?;
    writeln!(out, "    await sleep({});", label.refresh.as_millis())?;
    writeln!(out, "  }}")?;
    writeln!(out, "}}")?;
    writeln!(out, "read_{}();", var)?;
    writeln!(out, "</script>")
}

pub fn repeater(out: &mut String, component_id: &str, element_id: &str, repeater: &Repeater) -> fmt::Result {
    let var = js_var(element_id);
    writeln!(out, "<script type=\"module\">")?;
    writeln!(out, "import {{rest_host, rest_port}} from \"./globals.js\";")?;
    writeln!(out, "import {{sleep, call}} from \"./utils.js\";")?;
    writeln!(out, "async function repeat_{}() {{", var)?;
    writeln!(out, "  while (true) {{")?;
    writeln!(out, "    try {{")?;
    writeln!(out, "      await call({});", call_url(component_id, &repeater.action, ""))?;
    writeln!(out, "    }}")?;
    writeln!(out, "    catch (error) {{")?;
    writeln!(out, "      console.log(error);")?;
    writeln!(out, "    }}")?;
    writeln!(out, "    await sleep({});", repeater.refresh.as_millis())?;
    writeln!(out, "  }}")?;
    writeln!(out, "}}")?;
    writeln!(out, "repeat_{}();", var)?;
    writeln!(out, "</script>")
}

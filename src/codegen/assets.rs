//! Shared client modules written next to the fragments.

use std::fmt::{self, Write};
use std::time::Duration;

use super::js_str;

/// DOM id of the connection indicator fragment
pub const HEARTBEAT_ELEMENT: &str = "connection-heartbeat";

/// Latency smoothing and small async helpers
pub const UTILS_JS: &str = r##"const element_id_call_time = {};
const element_id_latency = {};
const element_id_alpha = {};

export function init_latency(element_id, alpha) {
  element_id_latency[element_id] = null;
  element_id_alpha[element_id] = alpha;
}

export function set_call_time(element_id) {
  element_id_call_time[element_id] = Date.now();
}

export function update_latency(element_id) {
  const latency = Date.now() - element_id_call_time[element_id];
  const alpha = element_id_alpha[element_id];
  let running_latency = element_id_latency[element_id];
  if (running_latency === null) {
    running_latency = latency;
  }
  else {
    running_latency = alpha * running_latency + (1.0 - alpha) * latency;
  }
  element_id_latency[element_id] = running_latency;
  return running_latency;
}

export function sleep(ms) {
  return new Promise(r => setTimeout(r, ms));
}

export async function is_checked(element_id) {
  while (!document.getElementById(element_id).checked) {
    await sleep(1000);
  }
}

export async function call(url) {
  const response = await fetch(url);
  if (!response.ok) {
    throw new Error("HTTP " + response.status + " from " + url);
  }
  return response;
}
"##;

/// Liveness loop: same delay after success and failure, never gives up
pub const HEARTBEAT_JS: &str = r##"import {rest_host, rest_port, heartbeat_interval_ms, latency_alpha} from "./globals.js";
import {init_latency, set_call_time, update_latency, sleep, call} from "./utils.js";

export async function run_heartbeat(element_id, on_status) {
  init_latency(element_id, latency_alpha);
  const url = "http://" + rest_host + ":" + rest_port + "/connection_heartbeat";
  while (true) {
    set_call_time(element_id);
    try {
      await call(url);
      on_status(true, update_latency(element_id));
    }
    catch (error) {
      console.log(error);
      on_status(false, null);
    }
    await sleep(heartbeat_interval_ms);
  }
}
"##;

/// `globals.js`: where the REST server lives, plus client tuning
pub fn globals_js(
    rest_host: &str,
    rest_port: u16,
    heartbeat_interval: Duration,
    latency_alpha: f64,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "export const rest_host = {};", js_str(rest_host))?;
    writeln!(out, "export const rest_port = {};", rest_port)?;
    writeln!(out, "export const heartbeat_interval_ms = {};", heartbeat_interval.as_millis())?;
    writeln!(out, "export const latency_alpha = {};", latency_alpha)?;
    Ok(out)
}

/// Badge plus latency readout driven by `heartbeat.js`
pub fn heartbeat_fragment() -> Result<String, fmt::Error> {
    let id = HEARTBEAT_ELEMENT;
    let latency_id = format!("{}-latency", id);
    let mut out = String::new();
    writeln!(out, "<div>")?;
    writeln!(out, "  <span id=\"{}\" class=\"badge bg-secondary\">Connecting</span>", id)?;
    writeln!(out, "  <label id=\"{}\">Latency (ms):  None</label>", latency_id)?;
    writeln!(out, "</div>")?;
    writeln!(out, "<script type=\"module\">")?;
    writeln!(out, "import {{run_heartbeat}} from \"./heartbeat.js\";")?;
    writeln!(out, "const badge = document.getElementById({});", js_str(id))?;
    writeln!(out, "const latency_label = document.getElementById({});", js_str(&latency_id))?;
    writeln!(out, "run_heartbeat({}, function (alive, latency) {{", js_str(id))?;
    writeln!(out, "  badge.textContent = alive ? \"Connected\" : \"Reconnecting\";")?;
    writeln!(out, "  badge.className = alive ? \"badge bg-success\" : \"badge bg-danger\";")?;
    writeln!(out, "  if (latency !== null) {{")?;
    writeln!(out, "    latency_label.textContent = \"Latency (ms):  \" + latency.toFixed(0);")?;
    writeln!(out, "  }}")?;
    writeln!(out, "}});")?;
    writeln!(out, "</script>")?;
    Ok(out)
}

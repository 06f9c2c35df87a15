//! REST API implementation using rouille.
//!
//! # Purpose
//!
//! Maps HTTP requests onto a [`Dispatcher`]. Paths with parameters are parsed
//! by hand (router! doesn't capture well); query values are handed to the
//! dispatcher as raw `type:value` text and coerced against the action schema.
//!
//! # Key types
//!
//! - [`ApiServer`] - request handler + bind/serve helpers
//! - [`RunningServer`] - handle to a server started on a background thread
//!
//! # Thread safety
//!
//! - The registry behind the dispatcher is immutable once shared
//! - `HeartbeatMonitor` is internally synchronized
//! - CORS headers added to all responses for browser access
//!
//! # Used by
//!
//! - `main.rs` - `serve` subcommand
//! - `tests/server.rs` - end-to-end checks on an ephemeral port

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use percent_encoding::percent_decode_str;
use rouille::{Request, Response};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;

use crate::dispatch::Dispatcher;
use crate::heartbeat::{HEARTBEAT_PATH, HeartbeatMonitor};

const CALL_PREFIX: &str = "/call/";

/// REST API server
#[derive(Debug, Clone)]
pub struct ApiServer {
    dispatcher: Dispatcher,
    monitor: Arc<HeartbeatMonitor>,
    ui_dir: Option<PathBuf>,
}

/// Server running on a background thread
#[derive(Debug)]
pub struct RunningServer {
    addr: SocketAddr,
    handle: thread::JoinHandle<()>,
    stop: mpsc::Sender<()>,
}

impl RunningServer {
    /// Bound address; useful when started on port 0
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests and wait for the server thread.
    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!("API server thread panicked");
        }
    }
}

impl ApiServer {
    pub fn new(dispatcher: Dispatcher, monitor: Arc<HeartbeatMonitor>) -> Self {
        Self { dispatcher, monitor, ui_dir: None }
    }

    /// Serve static files (generated fragments) from `dir` for unmatched GETs
    pub fn with_ui_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ui_dir = Some(dir.into());
        self
    }

    pub fn monitor(&self) -> &Arc<HeartbeatMonitor> {
        &self.monitor
    }

    /// Bind `addr` and serve on a background thread.
    pub fn start(self, addr: &str) -> Result<RunningServer> {
        let server = rouille::Server::new(addr, move |request| self.handle_request(request))
            .map_err(|e| anyhow!("Failed to bind API server on {}: {}", addr, e))?;
        let bound = server.server_addr();
        info!("API server listening on http://{}", bound);

        let (handle, stop) = server.stoppable();
        Ok(RunningServer { addr: bound, handle, stop })
    }

    /// Bind `addr` and serve on the current thread until the process exits.
    pub fn serve(self, addr: &str) -> Result<()> {
        let server = rouille::Server::new(addr, move |request| self.handle_request(request))
            .map_err(|e| anyhow!("Failed to bind API server on {}: {}", addr, e))?;
        info!("API server listening on http://{}", server.server_addr());
        server.run();
        Ok(())
    }

    pub fn handle_request(&self, request: &Request) -> Response {
        // Handle preflight
        if request.method() == "OPTIONS" {
            return Response::empty_204()
                .with_additional_header("Access-Control-Allow-Origin", "*")
                .with_additional_header("Access-Control-Allow-Methods", "GET, OPTIONS")
                .with_additional_header("Access-Control-Allow-Headers", "Content-Type");
        }

        let response = if request.method() != "GET" {
            Response::text("Method not allowed").with_status_code(405)
        } else {
            self.route(request)
        };

        // Add CORS headers to response
        response.with_additional_header("Access-Control-Allow-Origin", "*")
    }

    fn route(&self, request: &Request) -> Response {
        let path = request.url();

        // /call/{component_id}/{action}
        if let Some(rest) = path.strip_prefix(CALL_PREFIX) {
            return match rest.split_once('/') {
                Some((component_id, action)) if !component_id.is_empty() && !action.contains('/') => {
                    self.handle_call(request, component_id, action)
                }
                _ => Response::text("Expected /call/{component_id}/{action}").with_status_code(404),
            };
        }

        if path == HEARTBEAT_PATH {
            self.monitor.beat();
            return Response::text("");
        }

        if path == "/list" {
            return self.handle_list();
        }

        if let Some(dir) = &self.ui_dir {
            let asset = rouille::match_assets(request, dir);
            if asset.is_success() {
                return asset;
            }
        }

        Response::text("Not found").with_status_code(404)
    }

    fn handle_call(&self, request: &Request, component_id: &str, action: &str) -> Response {
        let query = query_pairs(request);
        match self.dispatcher.dispatch(component_id, action, &query) {
            Ok(value) => Response::json(&value),
            Err(e) => {
                let code = e.status_code();
                if code >= 500 {
                    warn!("{}", e);
                } else {
                    debug!("Rejected {}: {}", request.raw_url(), e);
                }
                Response::text(e.to_string()).with_status_code(code)
            }
        }
    }

    fn handle_list(&self) -> Response {
        let listing: serde_json::Map<String, serde_json::Value> = self
            .dispatcher
            .registry()
            .components()
            .map(|c| (c.id().to_string(), serde_json::Value::from(c.description())))
            .collect();
        Response::json(&listing)
    }
}

/// Every query pair in request order, names and values percent-decoded.
///
/// Only the first `=` separates name from value; a pair without one has an
/// empty value.
fn query_pairs(request: &Request) -> Vec<(String, String)> {
    request
        .raw_query_string()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_query_component(name), decode_query_component(value))
        })
        .collect()
}

fn decode_query_component(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " ")).decode_utf8_lossy().into_owned()
}

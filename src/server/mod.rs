//! REST API server for remote control of components.
//!
//! # Purpose
//!
//! Exposes a [`crate::registry::Registry`] over HTTP so generated fragments,
//! scripts, or `curl` can call component actions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐                      ┌──────────────────────┐
//! │   rouille worker pool   │  dispatch(id, act,   │   Dispatcher         │
//! │                         │  [(name, "t:v")])    │   Arc<Registry>      │
//! │  GET /call/servo-1/...  │  ──────────────────▶ │   coerce + invoke    │
//! │  GET /connection_...    │  ──▶ beat()          └──────────────────────┘
//! └─────────────────────────┘            │
//!                                        ▼
//!                              Arc<HeartbeatMonitor> ──▶ blackout callback
//! ```
//!
//! # Used by
//!
//! - `main.rs` - `serve` subcommand
//!
//! # Endpoints
//!
//! | Method  | Path                          | Description                       |
//! |---------|-------------------------------|-----------------------------------|
//! | GET     | `/call/{id}/{action}?p=t:v`   | Invoke action, JSON result        |
//! | GET     | `/connection_heartbeat`       | Record a heartbeat                |
//! | GET     | `/list`                       | `{component_id: description}`     |
//! | OPTIONS | any                           | CORS preflight                    |
//! | GET     | anything else                 | Static UI dir, if configured      |

mod api;

pub use api::{ApiServer, RunningServer};

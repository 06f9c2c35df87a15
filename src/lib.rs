//! pi-remote - REST remote control for Raspberry Pi circuit components
//!
//! Re-exports all modules for use by the binary and integration tests.

// Core: actions, dispatch, transport
pub mod dispatch;
pub mod registry;
pub mod server;

// Client side: fragments, latency, liveness
pub mod codegen;
pub mod heartbeat;
pub mod latency;

// Devices and demo apps
pub mod apps;
pub mod devices;
pub mod events;

// App modules
pub mod cli;
pub mod config;

pub use dispatch::{DispatchError, Dispatcher, ErrorKind};
pub use heartbeat::{CancelToken, HeartbeatMonitor, HeartbeatPoller, RetryPolicy};
pub use latency::LatencyTracker;
pub use registry::{Control, ParamSchema, ParamType, Registry, RegistryError};
pub use server::ApiServer;

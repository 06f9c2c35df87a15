//! Resolves `{component_id}/{action}` calls against a registry.
//!
//! Every call is handled independently: look up, coerce, invoke once. The
//! dispatcher holds no mutable state of its own; whatever a handler touches
//! is the handler's business.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::registry::{ParamError, Registry};

/// Coarse classification of a failed dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something that does not exist or sent bad params
    BadRequest,
    /// The handler ran and failed
    HandlerFailed,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no component with id '{0}'")]
    UnknownComponent(String),
    #[error("component '{component}' has no action named '{action}'")]
    UnknownAction { component: String, action: String },
    #[error("bad parameters for {component}/{action}: {source}")]
    BadParams {
        component: String,
        action: String,
        #[source]
        source: ParamError,
    },
    #[error("{component}/{action} failed: {source:#}")]
    HandlerFailed {
        component: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::HandlerFailed { .. } => ErrorKind::HandlerFailed,
            _ => ErrorKind::BadRequest,
        }
    }

    /// HTTP status reported to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::UnknownComponent(_) | DispatchError::UnknownAction { .. } => 404,
            DispatchError::BadParams { .. } => 400,
            DispatchError::HandlerFailed { .. } => 500,
        }
    }
}

/// Routes action calls into one registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Look up, coerce `query` against the action schema, and invoke.
    ///
    /// The handler is never called unless every parameter coerces.
    pub fn dispatch(
        &self,
        component_id: &str,
        action_name: &str,
        query: &[(String, String)],
    ) -> Result<Value, DispatchError> {
        let component = self
            .registry
            .component(component_id)
            .ok_or_else(|| DispatchError::UnknownComponent(component_id.to_string()))?;

        let action = component
            .action(action_name)
            .ok_or_else(|| DispatchError::UnknownAction {
                component: component_id.to_string(),
                action: action_name.to_string(),
            })?;

        let args = action
            .schema()
            .coerce(query)
            .map_err(|source| DispatchError::BadParams {
                component: component_id.to_string(),
                action: action_name.to_string(),
                source,
            })?;

        log::debug!("Calling {}/{} with {:?}", component_id, action_name, args);

        action.invoke(&args).map_err(|source| DispatchError::HandlerFailed {
            component: component_id.to_string(),
            action: action_name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParamSchema, ParamType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// Registry with a counting `servo-1/set_degrees(degrees: int)` and failing `servo-1/jam`
    fn setup() -> (Dispatcher, Arc<AtomicUsize>, Arc<std::sync::Mutex<Vec<i64>>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut registry = Registry::new();
        registry.add_component("servo-1", "Servo").unwrap();

        let c = Arc::clone(&calls);
        let s = Arc::clone(&seen);
        registry
            .register(
                "servo-1",
                "set_degrees",
                ParamSchema::empty().param("degrees", ParamType::Int),
                move |args| {
                    c.fetch_add(1, Ordering::SeqCst);
                    s.lock().unwrap().push(args.int("degrees")?);
                    Ok(Value::Null)
                },
            )
            .unwrap();
        registry
            .register("servo-1", "jam", ParamSchema::empty(), |_| Err(anyhow::anyhow!("gear stripped")))
            .unwrap();

        (Dispatcher::new(Arc::new(registry)), calls, seen)
    }

    #[test]
    fn test_valid_call_invokes_once() {
        let (dispatcher, calls, seen) = setup();

        for (raw, expected) in [("int:0", 0), ("90", 90), ("int:-15", -15)] {
            let before = calls.load(Ordering::SeqCst);
            let result = dispatcher.dispatch("servo-1", "set_degrees", &q(&[("degrees", raw)]));
            assert_eq!(result.unwrap(), Value::Null);
            assert_eq!(calls.load(Ordering::SeqCst), before + 1);
            assert_eq!(*seen.lock().unwrap().last().unwrap(), expected);
        }
    }

    #[test]
    fn test_bad_params_never_invoke() {
        let (dispatcher, calls, _) = setup();

        let cases: [&[(&str, &str)]; 5] = [
            &[("degrees", "int:ninety")],
            &[("degrees", "float:1.5")],
            &[("degrees", "bool:true")],
            &[],
            &[("degrees", "1"), ("speed", "2")],
        ];
        for pairs in cases {
            let err = dispatcher
                .dispatch("servo-1", "set_degrees", &q(pairs))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "{:?}", pairs);
            assert_eq!(err.status_code(), 400);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_targets() {
        let (dispatcher, calls, _) = setup();

        let err = dispatcher.dispatch("servo-2", "set_degrees", &[]).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownComponent(_)));
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.status_code(), 404);

        let err = dispatcher.dispatch("servo-1", "spin", &[]).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownAction { .. }));
        assert_eq!(err.status_code(), 404);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_failure() {
        let (dispatcher, _, _) = setup();
        let err = dispatcher.dispatch("servo-1", "jam", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandlerFailed);
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("gear stripped"));
    }
}

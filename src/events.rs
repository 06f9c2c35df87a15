//! State-change pub/sub for components.
//!
//! Devices publish a [`StateChanged`] whenever their state actually changes.
//! Subscribers register a callback and an optional trigger; the callback runs
//! only for events the trigger accepts.
//!
//! Callback order: FIFO (first-subscribed, first-called). Callbacks run
//! synchronously on the publishing thread, so keep them short.

use serde_json::Value;
use std::sync::{Arc, RwLock};

/// A component moved to a new state
#[derive(Debug, Clone, PartialEq)]
pub struct StateChanged {
    pub component_id: String,
    pub state: Value,
}

type Callback = Arc<dyn Fn(&StateChanged) + Send + Sync>;
type Trigger = Arc<dyn Fn(&StateChanged) -> bool + Send + Sync>;

struct Subscriber {
    trigger: Option<Trigger>,
    callback: Callback,
}

/// Shared bus; clones publish to the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.subscribers.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("EventBus").field("subscribers", &count).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` for every state change.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&StateChanged) + Send + Sync + 'static,
    {
        self.push(Subscriber { trigger: None, callback: Arc::new(callback) });
    }

    /// Call `callback` only for changes `trigger` accepts.
    ///
    /// # Example
    /// ```ignore
    /// bus.subscribe_when(
    ///     |e| e.component_id == "dc-motor-1" && e.state["speed"] == 0,
    ///     |_| log::info!("motor stopped"),
    /// );
    /// ```
    pub fn subscribe_when<T, F>(&self, trigger: T, callback: F)
    where
        T: Fn(&StateChanged) -> bool + Send + Sync + 'static,
        F: Fn(&StateChanged) + Send + Sync + 'static,
    {
        self.push(Subscriber {
            trigger: Some(Arc::new(trigger)),
            callback: Arc::new(callback),
        });
    }

    pub fn publish(&self, event: StateChanged) {
        // Clone callbacks out so a callback may subscribe without deadlocking
        let matching: Vec<Callback> = {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            subs.iter()
                .filter(|s| s.trigger.as_ref().is_none_or(|t| t(&event)))
                .map(|s| Arc::clone(&s.callback))
                .collect()
        };
        for callback in matching {
            callback(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn push(&self, subscriber: Subscriber) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscriber);
    }
}

//! Push-event routing
//!
//! Server-pushed messages (anything whose `type` is not `"response"`) are
//! routed by their `type` to a single registered callback. Messages with no
//! registered callback are dropped.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use super::message::EventMessage;

/// Callback invoked with the full payload of a pushed event
pub type EventCallback = Box<dyn FnMut(Value) + Send + 'static>;

/// Maps event types to their callback
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, EventCallback>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback for `event_type`
    ///
    /// Only one callback is kept per event type; a later registration
    /// replaces the earlier one. Returns `true` if a callback was replaced.
    pub fn on<F>(&mut self, event_type: impl Into<String>, callback: F) -> bool
    where
        F: FnMut(Value) + Send + 'static,
    {
        self.handlers
            .insert(event_type.into(), Box::new(callback))
            .is_some()
    }

    pub fn is_registered(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Hand an event to its callback
    ///
    /// Returns `false` if no callback is registered for the event's type.
    pub fn dispatch(&mut self, event: EventMessage) -> bool {
        match self.handlers.get_mut(event.kind()) {
            Some(handler) => {
                handler(event.into_payload());
                true
            }
            None => {
                trace!(event_type = event.kind(), "No handler for event, dropping");
                false
            }
        }
    }
}

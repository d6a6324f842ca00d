//! Request/response correlation
//!
//! The `Correlator` assigns identifiers to outgoing requests, remembers the
//! callback registered for each one, and hands every matching response to
//! that callback exactly once.

use std::collections::HashMap;

use ledgerwatch_config::CommandField;
use serde_json::Value;
use tracing::{debug, trace};

use super::message::{Request, RequestId, ResponseMessage, ResponseStatus};
use super::transport::Transport;
use super::ClientError;

/// One-shot callback invoked with a response payload
pub type ResponseCallback = Box<dyn FnOnce(Value) + Send + 'static>;

/// Tracks in-flight requests for a single connection
///
/// The table is owned by whichever task runs the monitor loop and needs no
/// synchronization. Requests whose response never arrives stay pending for
/// the lifetime of the correlator.
pub struct Correlator {
    /// Counter for generated ids, local to this instance
    next_auto_id: u64,
    /// Callbacks keyed by the id of the request they answer
    pending: HashMap<RequestId, ResponseCallback>,
    command_field: CommandField,
}

impl Correlator {
    pub fn new(command_field: CommandField) -> Self {
        Self {
            next_auto_id: 0,
            pending: HashMap::new(),
            command_field,
        }
    }

    /// Number of requests still waiting for a response
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    fn assign_id(&mut self, request: &mut Request) -> RequestId {
        if let Some(id) = request.id() {
            return id.clone();
        }
        let id = RequestId::auto(self.next_auto_id);
        self.next_auto_id += 1;
        request.set_id(id.clone());
        id
    }

    /// Send a request and remember `callback` for its response
    ///
    /// A generated id is assigned if the request has none. The callback is
    /// registered before the frame is written and dropped again if the write
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidRequest` if the request fails validation
    /// or reuses the id of a request that is still pending.
    /// Returns any error from the transport's `send()`.
    pub async fn submit<T: Transport>(
        &mut self,
        transport: &mut T,
        mut request: Request,
        callback: ResponseCallback,
    ) -> Result<RequestId, ClientError> {
        request.validate()?;
        let id = self.assign_id(&mut request);

        if self.pending.contains_key(&id) {
            return Err(ClientError::invalid(format!(
                "request id {} is already pending",
                id
            )));
        }

        let frame = serde_json::to_string(&request.to_wire(self.command_field)?)
            .map_err(ClientError::SerializeFailed)?;

        self.pending.insert(id.clone(), callback);
        debug!(id = %id, command = request.command(), "Sending request");
        trace!(frame = %frame, "Outgoing frame");

        if let Err(e) = transport.send(frame).await {
            self.pending.remove(&id);
            return Err(e);
        }

        Ok(id)
    }

    /// Route a response to the callback of the request it answers
    ///
    /// On success the `status` field is stripped before the callback sees
    /// the message, and the pending entry is removed.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::FailedResponse` (with the raw message) if the
    /// status is not `"success"`. The callback is not invoked and the
    /// pending entry is discarded.
    /// Returns `ClientError::UnmatchedResponse` if no request with the
    /// response's id is pending.
    pub fn handle_response(&mut self, response: ResponseMessage) -> Result<(), ClientError> {
        if let ResponseStatus::Failure(status) = response.status() {
            let status = status.clone();
            if let Some(id) = response.id() {
                self.pending.remove(id);
            }
            return Err(ClientError::FailedResponse {
                status,
                message: response.into_raw(),
            });
        }

        let callback = response.id().and_then(|id| self.pending.remove(id));
        let Some(callback) = callback else {
            let id = response
                .id()
                .map(ToString::to_string)
                .unwrap_or_else(|| "<none>".to_string());
            return Err(ClientError::UnmatchedResponse {
                id,
                message: response.into_raw(),
            });
        };

        debug!(id = ?response.id(), "Delivering response");
        callback(response.into_payload());
        Ok(())
    }
}

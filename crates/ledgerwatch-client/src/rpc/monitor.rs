//! The monitor loop
//!
//! A single-threaded cooperative loop over one connection. Each cycle has
//! two phases:
//!
//! 1. Drain outgoing work: submit every job currently in the work queue.
//! 2. Drain inbound messages: poll the transport until a poll comes back
//!    empty, routing responses to the correlator and pushed events to the
//!    dispatcher.
//!
//! The transport's receive timeout is the only place the loop blocks, so it
//! bounds how long queued work can wait before it is sent.
//!
//! Errors are not caught inside the loop. A protocol violation (a failed
//! response, or a response nobody is waiting for) ends `run_forever` and is
//! handed to the caller.

use std::time::Duration;

use ledgerwatch_config::CommandField;
use serde_json::Value;
use tracing::{debug, trace};

use super::correlator::Correlator;
use super::dispatcher::Dispatcher;
use super::message::{Inbound, Request, RequestId};
use super::queue::JobReceiver;
use super::transport::Transport;
use super::ClientError;

/// What one cycle of the loop did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Jobs taken from the work queue and sent
    pub sent: usize,
    /// Messages read from the transport
    pub received: usize,
}

/// Drives one transport, one correlator and one dispatcher
pub struct MonitorLoop<T> {
    transport: T,
    correlator: Correlator,
    dispatcher: Dispatcher,
    jobs: JobReceiver,
    receive_timeout: Duration,
}

impl<T: Transport> MonitorLoop<T> {
    pub fn new(
        transport: T,
        jobs: JobReceiver,
        receive_timeout: Duration,
        command_field: CommandField,
    ) -> Self {
        Self {
            transport,
            correlator: Correlator::new(command_field),
            dispatcher: Dispatcher::new(),
            jobs,
            receive_timeout,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Send a request directly, bypassing the work queue
    ///
    /// # Errors
    ///
    /// See [`Correlator::submit`].
    pub async fn submit<F>(&mut self, request: Request, callback: F) -> Result<RequestId, ClientError>
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.correlator
            .submit(&mut self.transport, request, Box::new(callback))
            .await
    }

    /// Register the callback for a pushed event type
    pub fn on<F>(&mut self, event_type: impl Into<String>, callback: F)
    where
        F: FnMut(Value) + Send + 'static,
    {
        let event_type = event_type.into();
        if self.dispatcher.on(event_type.clone(), callback) {
            debug!(event_type = %event_type, "Replaced event handler");
        }
    }

    /// Submit every job currently queued, oldest first
    ///
    /// # Errors
    ///
    /// Stops at the first job that fails to submit and returns its error.
    pub async fn drain_outgoing(&mut self) -> Result<usize, ClientError> {
        let mut sent = 0;
        while let Some(job) = self.jobs.try_dequeue() {
            self.correlator
                .submit(&mut self.transport, job.request, job.callback)
                .await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Route one decoded inbound message
    ///
    /// # Errors
    ///
    /// Returns the correlator's error for responses that fail or match no
    /// pending request.
    pub fn handle_inbound(&mut self, message: Value) -> Result<(), ClientError> {
        match Inbound::from_value(message) {
            Inbound::Response(response) => self.correlator.handle_response(response),
            Inbound::Event(event) => {
                self.dispatcher.dispatch(event);
                Ok(())
            }
            Inbound::Untyped(value) => {
                trace!(message = %value, "Ignoring message without a type");
                Ok(())
            }
        }
    }

    /// Read and route messages until a poll comes back empty
    ///
    /// # Errors
    ///
    /// Returns transport errors and errors from [`MonitorLoop::handle_inbound`].
    pub async fn drain_inbound(&mut self) -> Result<usize, ClientError> {
        let mut received = 0;
        while let Some(message) = self.transport.recv(self.receive_timeout).await? {
            received += 1;
            self.handle_inbound(message)?;
        }
        Ok(received)
    }

    /// Run one cycle: outgoing work first, then inbound messages
    ///
    /// # Errors
    ///
    /// Returns the first error from either phase.
    pub async fn step(&mut self) -> Result<StepReport, ClientError> {
        let sent = self.drain_outgoing().await?;
        let received = self.drain_inbound().await?;
        if sent > 0 || received > 0 {
            trace!(sent, received, "Monitor cycle");
        }
        Ok(StepReport { sent, received })
    }

    /// Cycle until an error occurs
    ///
    /// There is no other way out of the loop: the returned error says why
    /// it stopped.
    pub async fn run_forever(&mut self) -> Result<(), ClientError> {
        loop {
            self.step().await?;
        }
    }
}

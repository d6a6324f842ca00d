//! Request/response client over a single WebSocket
//!
//! This module multiplexes API calls and server-pushed events over one
//! persistent connection.
//!
//! ## Architecture
//!
//! - `Correlator`: assigns request ids and routes each response to the
//!   callback of the request it answers
//! - `Dispatcher`: routes pushed events to one callback per event type
//! - `SocketClient`: the WebSocket connection, behind the `Transport` trait
//! - `WorkQueue`: lets other threads hand requests to the loop
//! - `MonitorLoop`: the cooperative loop tying the pieces together
//!
//! ## Protocol
//!
//! Requests are JSON objects carrying a command name and an `id`. Responses
//! carry `"type": "response"`, a `status` and the `id` of the request they
//! answer. Anything else with a `type` is a pushed event such as
//! `ledgerClosed` or `transaction`.

mod correlator;
mod dispatcher;
mod error;
mod message;
mod monitor;
mod queue;
mod transport;

pub use correlator::{Correlator, ResponseCallback};
pub use dispatcher::{Dispatcher, EventCallback};
pub use error::{ClientError, ErrorKind};
pub use message::{
    EventMessage, Inbound, Request, RequestId, ResponseMessage, ResponseStatus, AUTO_ID_PREFIX,
    RESPONSE_TYPE,
};
pub use monitor::{MonitorLoop, StepReport};
pub use queue::{work_queue, Job, JobReceiver, WorkQueue};
pub use transport::{SocketClient, Transport};

#[cfg(test)]
pub(crate) use transport::testing;

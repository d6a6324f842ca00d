//! WebSocket request/response client for ledgerwatch
//!
//! The [`rpc`] module holds the building blocks: request correlation, event
//! dispatch, the socket transport and the monitor loop. [`worker`] runs that
//! loop on a background thread and reports back over a channel.

pub mod rpc;
pub mod worker;

pub use rpc::{ClientError, ErrorKind, Request, RequestId, WorkQueue};
pub use worker::{MonitorWorker, Notification, NotificationReceiver, WorkerConfig};

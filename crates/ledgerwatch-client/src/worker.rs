//! Background monitor worker
//!
//! `MonitorWorker` runs the monitor loop on its own OS thread so the host
//! thread never touches the connection. The worker:
//!
//! 1. Opens the WebSocket connection
//! 2. Subscribes to the ledger stream and/or the watched account
//! 3. Registers handlers for `ledgerClosed` and `transaction` events
//! 4. Looks up the account's current state
//! 5. Runs the monitor loop until it fails
//!
//! Everything the worker learns is posted to the host as a [`Notification`]
//! on an unbounded channel, which the host drains from its own event loop.
//!
//! ```text
//! +------------+  WorkQueue   +----------------+  WebSocket  +--------+
//! | Host       | -----------> | Worker thread  | <---------> | Server |
//! | (main)     | <----------- | (MonitorLoop)  |             |        |
//! +------------+ Notification +----------------+             +--------+
//! ```

use std::thread::{self, JoinHandle};
use std::time::Duration;

use ledgerwatch_config::{CommandField, Config};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::rpc::{
    work_queue, ClientError, JobReceiver, MonitorLoop, Request, SocketClient, Transport, WorkQueue,
};

/// Event pushed by the server when a ledger closes
pub const LEDGER_CLOSED_EVENT: &str = "ledgerClosed";

/// Event pushed by the server for transactions touching a subscribed account
pub const TRANSACTION_EVENT: &str = "transaction";

const THREAD_NAME: &str = "ledger-monitor";

/// Message from the worker to the host thread
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Latest ledger, from the subscribe result or a `ledgerClosed` event
    Ledger(Value),
    /// `result` of an `account_info` lookup for the watched account
    AccountInfo(Value),
    /// Response to a request the host enqueued with [`MonitorWorker::request`]
    Response(Value),
    /// The monitor loop ended; no further notifications follow
    Stopped { reason: String },
}

/// Receiving end of the worker's notifications, held by the host
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

#[derive(Debug, Clone)]
struct Notifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    fn post(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!("Notification receiver dropped, discarding notification");
        }
    }
}

/// Posts `Stopped` if the worker thread unwinds, e.g. from a panicking callback
struct PanicGuard {
    notifier: Notifier,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Monitor worker panicked");
            self.notifier.post(Notification::Stopped {
                reason: ClientError::WorkerPanicked.to_string(),
            });
        }
    }
}

/// Settings for a [`MonitorWorker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub url: String,
    pub receive_timeout: Duration,
    pub command_field: CommandField,
    /// Account to subscribe to and keep `account_info` for
    pub account: Option<String>,
    /// Subscribe to the ledger close stream
    pub ledger_stream: bool,
}

impl From<&Config> for WorkerConfig {
    fn from(config: &Config) -> Self {
        Self {
            url: config.connection.url.clone(),
            receive_timeout: config.connection.receive_timeout,
            command_field: config.connection.command_field,
            account: config.monitor.account.clone(),
            ledger_stream: config.monitor.ledger_stream,
        }
    }
}

/// Handle to the running worker thread
#[derive(Debug)]
pub struct MonitorWorker {
    queue: WorkQueue,
    notifier: Notifier,
    handle: JoinHandle<Result<(), ClientError>>,
}

impl MonitorWorker {
    /// Start the worker thread
    ///
    /// Returns the worker handle and the receiver for its notifications.
    /// Connection errors are reported through the receiver (as
    /// `Notification::Stopped`) and through [`MonitorWorker::join`], not here.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Runtime` if the thread cannot be spawned.
    pub fn spawn(config: WorkerConfig) -> Result<(Self, NotificationReceiver), ClientError> {
        let (queue, jobs) = work_queue();
        let (sender, receiver) = mpsc::unbounded_channel();
        let notifier = Notifier { sender };

        let worker_queue = queue.clone();
        let worker_notifier = notifier.clone();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = PanicGuard {
                    notifier: worker_notifier.clone(),
                };
                let result = run_worker(config, jobs, worker_queue, worker_notifier.clone());
                if let Err(e) = &result {
                    error!(error = %e, kind = ?e.kind(), "Monitor worker stopped");
                    worker_notifier.post(Notification::Stopped {
                        reason: e.to_string(),
                    });
                }
                result
            })
            .map_err(ClientError::Runtime)?;

        Ok((
            Self {
                queue,
                notifier,
                handle,
            },
            receiver,
        ))
    }

    /// Producer handle for queueing requests with custom callbacks
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Queue a request whose response is posted as `Notification::Response`
    ///
    /// # Errors
    ///
    /// Returns `ClientError::WorkerStopped` if the worker has exited.
    pub fn request(&self, request: Request) -> Result<(), ClientError> {
        let notifier = self.notifier.clone();
        self.queue.enqueue(request, move |message| {
            notifier.post(Notification::Response(message));
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker thread and return why it stopped
    ///
    /// # Errors
    ///
    /// Returns the error that ended the monitor loop, or
    /// `ClientError::WorkerPanicked` if the thread panicked.
    pub fn join(self) -> Result<(), ClientError> {
        self.handle.join().map_err(|_| ClientError::WorkerPanicked)?
    }
}

fn run_worker(
    config: WorkerConfig,
    jobs: JobReceiver,
    queue: WorkQueue,
    notifier: Notifier,
) -> Result<(), ClientError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ClientError::Runtime)?;

    runtime.block_on(async move {
        let mut socket = SocketClient::new(config.url.clone());
        socket.open().await?;

        let mut monitor =
            MonitorLoop::new(socket, jobs, config.receive_timeout, config.command_field);
        bootstrap(&mut monitor, &config, &queue, &notifier).await?;

        info!(url = %config.url, "Monitor loop running");
        monitor.run_forever().await
    })
}

fn subscribe_request(config: &WorkerConfig) -> Option<Request> {
    if !config.ledger_stream && config.account.is_none() {
        return None;
    }

    let mut request = Request::new("subscribe");
    if config.ledger_stream {
        request = request.param("streams", json!(["ledger"]));
    }
    if let Some(account) = &config.account {
        request = request.param("accounts", json!([account]));
    }
    Some(request)
}

fn account_info_request(account: &str, ledger_index: Value) -> Request {
    Request::new("account_info")
        .param("account", account)
        .param("ledger_index", ledger_index)
}

/// The `result` field of a response payload
fn take_result(message: Value) -> Value {
    match message {
        Value::Object(mut fields) => fields.remove("result").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Subscribe, register event handlers and issue the initial account lookup
async fn bootstrap<T: Transport>(
    monitor: &mut MonitorLoop<T>,
    config: &WorkerConfig,
    queue: &WorkQueue,
    notifier: &Notifier,
) -> Result<(), ClientError> {
    if let Some(subscribe) = subscribe_request(config) {
        let notifier = notifier.clone();
        monitor
            .submit(subscribe, move |message| {
                notifier.post(Notification::Ledger(take_result(message)));
            })
            .await?;
    }

    let ledger_notifier = notifier.clone();
    monitor.on(LEDGER_CLOSED_EVENT, move |message| {
        ledger_notifier.post(Notification::Ledger(message));
    });

    let Some(account) = &config.account else {
        return Ok(());
    };

    // Re-check the balance whenever a transaction touches the account. The
    // lookup goes through the queue and is sent on the next cycle.
    let tx_notifier = notifier.clone();
    let tx_queue = queue.clone();
    let tx_account = account.clone();
    monitor.on(TRANSACTION_EVENT, move |message| {
        let ledger_index = message
            .get("ledger_index")
            .cloned()
            .unwrap_or_else(|| Value::from("validated"));
        let notifier = tx_notifier.clone();
        let request = account_info_request(&tx_account, ledger_index);
        if let Err(e) = tx_queue.enqueue(request, move |message| {
            notifier.post(Notification::AccountInfo(take_result(message)));
        }) {
            warn!(error = %e, "Failed to queue account_info refresh");
        }
    });

    let notifier = notifier.clone();
    monitor
        .submit(
            account_info_request(account, Value::from("validated")),
            move |message| {
                notifier.post(Notification::AccountInfo(take_result(message)));
            },
        )
        .await?;

    Ok(())
}

//! Cross-thread work queue for outgoing requests
//!
//! Threads that do not own the connection hand requests to the monitor loop
//! through this queue. Enqueueing never blocks; the monitor loop drains the
//! queue without waiting at the start of every cycle.

use serde_json::Value;
use tokio::sync::mpsc;

use super::correlator::ResponseCallback;
use super::message::Request;
use super::ClientError;

/// A request waiting to be submitted, with its response callback
pub struct Job {
    pub request: Request,
    pub callback: ResponseCallback,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Producer handle; cheap to clone and safe to share between threads
#[derive(Debug, Clone)]
pub struct WorkQueue {
    sender: mpsc::UnboundedSender<Job>,
}

/// Consumer side, owned by the monitor loop
#[derive(Debug)]
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<Job>,
}

/// Create a connected producer/consumer pair
pub fn work_queue() -> (WorkQueue, JobReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (WorkQueue { sender }, JobReceiver { receiver })
}

impl WorkQueue {
    /// Append a request to the queue
    ///
    /// # Errors
    ///
    /// Returns `ClientError::WorkerStopped` if the consumer has been dropped.
    pub fn enqueue<F>(&self, request: Request, callback: F) -> Result<(), ClientError>
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.sender
            .send(Job {
                request,
                callback: Box::new(callback),
            })
            .map_err(|_| ClientError::WorkerStopped)
    }
}

impl JobReceiver {
    /// Take the oldest queued job without waiting
    ///
    /// Returns `None` when the queue is empty, including when every producer
    /// has been dropped.
    pub fn try_dequeue(&mut self) -> Option<Job> {
        self.receiver.try_recv().ok()
    }
}

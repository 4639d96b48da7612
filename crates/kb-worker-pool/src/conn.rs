//! Correlates request/response frames on one worker's long-lived [`Channel`].
//!
//! The pool is the IPC server side for every worker (the opposite of
//! `kb-subprocess`, where the parent is also the server but tears the
//! channel down after one round trip). Grounded directly on
//! `kb-ipc::client`'s demux task: a background reader matches incoming
//! frames against a `requestId`-keyed map of pending callers and routes
//! anything unmatched to a side channel instead of dropping it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use kb_core::error::{ErrorCode, PluginError};
use kb_ipc::{Channel, ChannelSender, Frame};

type PendingMap = Arc<DashMap<String, oneshot::Sender<Frame>>>;

/// A demultiplexed handle onto one worker's IPC [`Channel`].
pub struct WorkerConnection {
    sender: ChannelSender,
    pending: PendingMap,
    unsolicited_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    demux_task: JoinHandle<()>,
}

impl WorkerConnection {
    /// Take ownership of an accepted [`Channel`] and start demuxing it.
    #[must_use]
    pub fn new(mut channel: Channel) -> Self {
        let sender = channel.sender();
        let pending: PendingMap = Arc::new(DashMap::new());
        let pending_for_task = pending.clone();
        let (unsolicited_tx, unsolicited_rx) = mpsc::unbounded_channel();

        let demux_task = tokio::spawn(async move {
            while let Some(frame) = channel.recv().await {
                let correlates_to = frame.request_id().map(str::to_string);
                let matched = correlates_to.as_deref().and_then(|id| pending_for_task.remove(id));
                match matched {
                    Some((_, reply_tx)) => {
                        let _ = reply_tx.send(frame);
                    }
                    None => {
                        if unsolicited_tx.send(frame).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            sender,
            pending,
            unsolicited_rx: tokio::sync::Mutex::new(unsolicited_rx),
            demux_task,
        }
    }

    /// Send a frame without waiting for a response (`shutdown`, `abort`).
    pub fn send(&self, frame: Frame) -> Result<(), PluginError> {
        self.sender.send(frame)
    }

    /// Send a frame and await its correlated reply, bounded by `bound`.
    pub async fn call(&self, frame: Frame, bound: Duration) -> Result<Frame, PluginError> {
        match timeout(bound, self.call_unbounded(frame)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(PluginError::new(ErrorCode::TimeoutError, "worker ipc call timed out")),
        }
    }

    /// Send a frame and await its correlated reply with no internal bound —
    /// callers that need their own timeout/cancellation race (execution
    /// requests, which must soft-abort before giving up) use this directly
    /// inside a `select!`.
    pub async fn call_unbounded(&self, frame: Frame) -> Result<Frame, PluginError> {
        let request_id = frame.request_id().map(str::to_string).ok_or_else(|| {
            PluginError::new(ErrorCode::InternalError, "frame carries no requestId to correlate on")
        })?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), reply_tx);
        if let Err(error) = self.sender.send(frame) {
            self.pending.remove(&request_id);
            return Err(error);
        }
        reply_rx.await.map_err(|_canceled| {
            PluginError::new(ErrorCode::WorkerCrashed, "worker ipc connection closed before a response arrived")
        })
    }

    /// Receive the next frame that arrived without a matching pending call
    /// (e.g. an `abort` targeting an execution the caller already gave up
    /// waiting on, left to drain harmlessly).
    pub async fn recv_unsolicited(&self) -> Option<Frame> {
        self.unsolicited_rx.lock().await.recv().await
    }
}

impl Drop for WorkerConnection {
    fn drop(&mut self) {
        self.demux_task.abort();
    }
}

//! The child-side IPC client: lazily connects to the parent's per-execution
//! socket, auto-reconnects within a bounded attempt count, and correlates
//! request/response frames by `requestId`, per spec §4.4.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::warn;

use kb_core::error::{ErrorCode, PluginError};

use crate::channel::{Channel, ChannelSender};
use crate::wire::Frame;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 3;
const RECONNECT_BACKOFF: Duration = Duration::from_millis(100);

type PendingMap = Arc<DashMap<String, oneshot::Sender<Frame>>>;

/// An IPC client bound to one socket path, connecting on first use.
///
/// Frames that arrive without a matching pending call (e.g. an `execute`
/// pushed by the parent, or an `abort`) are handed to whoever is draining
/// [`IpcClient::recv_unsolicited`] instead of being dropped.
pub struct IpcClient {
    path: PathBuf,
    call_timeout: Duration,
    max_connect_attempts: u32,
    connection: Mutex<Option<Connection>>,
    unsolicited_tx: mpsc::UnboundedSender<Frame>,
    unsolicited_rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

struct Connection {
    sender: ChannelSender,
    pending: PendingMap,
    demux_task: tokio::task::JoinHandle<()>,
}

impl IpcClient {
    /// Build a client for `path`. No connection is made until the first
    /// [`IpcClient::send`] or [`IpcClient::call`].
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let (unsolicited_tx, unsolicited_rx) = mpsc::unbounded_channel();
        Self {
            path,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_connect_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            connection: Mutex::new(None),
            unsolicited_tx,
            unsolicited_rx: Mutex::new(unsolicited_rx),
        }
    }

    /// Override the default 30s per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Override the default bounded reconnect attempt count.
    #[must_use]
    pub fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }

    /// Send a frame without waiting for a response.
    pub async fn send(&self, frame: Frame) -> Result<(), PluginError> {
        let sender = self.connected_sender().await?;
        sender.send(frame)
    }

    /// Send a frame and await the response correlated by `requestId`,
    /// bounded by the configured call timeout.
    pub async fn call(&self, frame: Frame) -> Result<Frame, PluginError> {
        let request_id = frame.request_id().map(str::to_string).ok_or_else(|| {
            PluginError::new(ErrorCode::InternalError, "frame carries no requestId to correlate on")
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let guard = self.connection.lock().await;
            if let Some(connection) = guard.as_ref() {
                connection.pending.insert(request_id.clone(), reply_tx);
            } else {
                drop(guard);
                let connection = self.connect_with_retry().await?;
                connection.pending.insert(request_id.clone(), reply_tx);
                *self.connection.lock().await = Some(connection);
            }
        }

        let sender = self.connected_sender().await?;
        sender.send(frame)?;

        match timeout(self.call_timeout, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_canceled)) => Err(PluginError::new(
                ErrorCode::InternalError,
                "ipc connection closed before a response arrived",
            )),
            Err(_elapsed) => {
                if let Some(connection) = self.connection.lock().await.as_ref() {
                    connection.pending.remove(&request_id);
                }
                Err(PluginError::new(ErrorCode::TimeoutError, "ipc call timed out"))
            }
        }
    }

    /// Receive the next frame that arrived without a matching pending call.
    pub async fn recv_unsolicited(&self) -> Option<Frame> {
        self.unsolicited_rx.lock().await.recv().await
    }

    async fn connected_sender(&self) -> Result<ChannelSender, PluginError> {
        {
            let guard = self.connection.lock().await;
            if let Some(connection) = guard.as_ref() {
                return Ok(connection.sender.clone());
            }
        }
        let connection = self.connect_with_retry().await?;
        let sender = connection.sender.clone();
        *self.connection.lock().await = Some(connection);
        Ok(sender)
    }

    async fn connect_with_retry(&self) -> Result<Connection, PluginError> {
        let mut last_error = None;
        for attempt in 0..self.max_connect_attempts {
            match UnixStream::connect(&self.path).await {
                Ok(stream) => {
                    let channel = Channel::new(stream, None);
                    return Ok(spawn_demux(channel, self.unsolicited_tx.clone()));
                }
                Err(error) => {
                    warn!(%error, attempt, path = %self.path.display(), "ipc connect attempt failed");
                    last_error = Some(error);
                    if attempt + 1 < self.max_connect_attempts {
                        tokio::time::sleep(RECONNECT_BACKOFF * (attempt + 1)).await;
                    }
                }
            }
        }
        Err(PluginError::new(
            ErrorCode::PlatformError,
            format!(
                "failed to connect to ipc socket after {} attempts: {}",
                self.max_connect_attempts,
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ),
        ))
    }
}

fn spawn_demux(mut channel: Channel, unsolicited_tx: mpsc::UnboundedSender<Frame>) -> Connection {
    let sender = channel.sender();
    let pending: PendingMap = Arc::new(DashMap::new());
    let pending_for_task = pending.clone();
    let demux_task = tokio::spawn(async move {
        while let Some(frame) = channel.recv().await {
            let correlates_to = frame.request_id().map(str::to_string);
            let matched = correlates_to
                .as_deref()
                .and_then(|id| pending_for_task.remove(id));
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
    Connection {
        sender,
        pending,
        demux_task,
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.demux_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::IpcServer;
    use tempfile::tempdir;

    #[tokio::test]
    async fn call_round_trips_through_server() {
        let dir = tempdir().unwrap();
        let sock_path = dir.path().join("call.sock");
        let server = IpcServer::bind(&sock_path, None).unwrap();

        let server_task = tokio::spawn(async move {
            let mut channel = server.accept().await.unwrap();
            let frame = channel.recv().await.unwrap();
            if let Frame::Health { request_id } = frame {
                channel.send(Frame::HealthOk { request_id }).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let client = IpcClient::new(sock_path);
        let response = client
            .call(Frame::Health {
                request_id: "req-health-1".into(),
            })
            .await
            .unwrap();
        assert!(matches!(response, Frame::HealthOk { request_id } if request_id == "req-health-1"));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn call_times_out_when_no_response_arrives() {
        let dir = tempdir().unwrap();
        let sock_path = dir.path().join("timeout.sock");
        let server = IpcServer::bind(&sock_path, None).unwrap();
        let server_task = tokio::spawn(async move {
            let _channel = server.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let client = IpcClient::new(sock_path).with_call_timeout(Duration::from_millis(20));
        let result = client
            .call(Frame::Health {
                request_id: "req-health-2".into(),
            })
            .await;
        assert!(matches!(
            result,
            Err(ref error) if error.code == ErrorCode::TimeoutError
        ));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn unsolicited_frames_are_queued_separately() {
        let dir = tempdir().unwrap();
        let sock_path = dir.path().join("unsolicited.sock");
        let server = IpcServer::bind(&sock_path, None).unwrap();
        let server_task = tokio::spawn(async move {
            let channel = server.accept().await.unwrap();
            channel.send(Frame::Ready).unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let client = IpcClient::new(sock_path);
        // force a connection so the demux task is running.
        let _ = client.send(Frame::Ready).await;
        let frame = client.recv_unsolicited().await.unwrap();
        assert!(matches!(frame, Frame::Ready));
        server_task.await.unwrap();
    }
}

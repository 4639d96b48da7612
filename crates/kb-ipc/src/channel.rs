//! The duplex NDJSON frame channel shared by both the server's accepted
//! connections and the client's outbound connection.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use kb_core::error::{ErrorCode, PluginError};

use crate::wire::Frame;

/// Dispatches an `adapter:call` frame to the named in-process adapter
/// method, per spec §4.4. Implemented by whoever owns the real platform
/// adapters (the parent process); the channel itself has no adapter logic.
#[async_trait]
pub trait AdapterDispatch: Send + Sync {
    /// Invoke `adapter.method(args)`, returning its JSON result.
    async fn dispatch(&self, adapter: &str, method: &str, args: Vec<Value>) -> Result<Value, PluginError>;
}

/// A duplex NDJSON frame channel over one Unix-domain socket connection.
///
/// Incoming `adapter:call` frames are dispatched inline (if a dispatcher was
/// supplied) and answered with `adapter:response`; every other frame is
/// handed to the owner via [`Channel::recv`].
pub struct Channel {
    outbox: mpsc::UnboundedSender<Frame>,
    inbox: mpsc::UnboundedReceiver<Frame>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Channel {
    /// Wrap an established `stream`, optionally dispatching inbound
    /// `adapter:call` frames through `dispatcher`.
    #[must_use]
    pub fn new(stream: UnixStream, dispatcher: Option<Arc<dyn AdapterDispatch>>) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel::<Frame>();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel::<Frame>();

        let writer_task = spawn_writer(write_half, outbox_rx);
        let reader_task = spawn_reader(read_half, inbox_tx, outbox_tx.clone(), dispatcher);

        Self {
            outbox: outbox_tx,
            inbox: inbox_rx,
            reader_task,
            writer_task,
        }
    }

    /// Send one frame.
    pub fn send(&self, frame: Frame) -> Result<(), PluginError> {
        self.outbox.send(frame).map_err(|_| {
            PluginError::new(ErrorCode::PlatformError, "ipc channel closed").with_details(
                serde_json::json!({ "transport": "ipc" }),
            )
        })
    }

    /// Receive the next non-`adapter:call` frame, or `None` once the peer
    /// has closed the connection.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbox.recv().await
    }

    /// Tear down the reader/writer tasks.
    pub async fn close(self) {
        drop(self.outbox);
        self.reader_task.abort();
        let _ = self.writer_task.await;
    }

    /// A cloneable handle that can send frames without holding `&mut self`,
    /// so a demux task can own the `Channel` for [`Channel::recv`] while the
    /// caller keeps a way to send.
    #[must_use]
    pub fn sender(&self) -> ChannelSender {
        ChannelSender {
            outbox: self.outbox.clone(),
        }
    }
}

/// A cloneable send-only handle onto a [`Channel`].
#[derive(Clone)]
pub struct ChannelSender {
    outbox: mpsc::UnboundedSender<Frame>,
}

impl ChannelSender {
    /// Send one frame.
    pub fn send(&self, frame: Frame) -> Result<(), PluginError> {
        self.outbox.send(frame).map_err(|_| {
            PluginError::new(ErrorCode::PlatformError, "ipc channel closed").with_details(
                serde_json::json!({ "transport": "ipc" }),
            )
        })
    }
}

fn spawn_writer(
    mut write_half: OwnedWriteHalf,
    mut outbox_rx: mpsc::UnboundedReceiver<Frame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            let line = frame.to_line();
            if let Err(error) = write_half.write_all(line.as_bytes()).await {
                warn!(%error, "ipc write failed, closing writer task");
                break;
            }
        }
    })
}

fn spawn_reader(
    read_half: OwnedReadHalf,
    inbox_tx: mpsc::UnboundedSender<Frame>,
    outbox_tx: mpsc::UnboundedSender<Frame>,
    dispatcher: Option<Arc<dyn AdapterDispatch>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Frame::from_line(&line) {
                        Ok(Frame::AdapterCall {
                            request_id,
                            adapter,
                            method,
                            args,
                            ..
                        }) => {
                            let dispatcher = dispatcher.clone();
                            let outbox_tx = outbox_tx.clone();
                            tokio::spawn(async move {
                                let response = match &dispatcher {
                                    Some(d) => match d.dispatch(&adapter, &method, args).await {
                                        Ok(result) => Frame::AdapterResponse {
                                            request_id: request_id.clone(),
                                            result: Some(result),
                                            error: None,
                                        },
                                        Err(error) => Frame::AdapterResponse {
                                            request_id: request_id.clone(),
                                            result: None,
                                            error: Some(error),
                                        },
                                    },
                                    None => Frame::AdapterResponse {
                                        request_id: request_id.clone(),
                                        result: None,
                                        error: Some(PluginError::new(
                                            ErrorCode::PlatformError,
                                            "no adapter dispatcher configured",
                                        )),
                                    },
                                };
                                let _ = outbox_tx.send(response);
                            });
                        }
                        Ok(frame) => {
                            if inbox_tx.send(frame).is_err() {
                                break;
                            }
                        }
                        Err(error) => {
                            debug!(%error, %line, "failed to parse ipc frame, dropping");
                        }
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    warn!(%error, "ipc read failed, closing reader task");
                    break;
                }
            }
        }
    })
}

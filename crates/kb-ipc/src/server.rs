//! The parent-side IPC server: binds a per-execution Unix-domain socket and
//! hands each accepted connection back as a [`Channel`], per spec §4.4.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::UnixListener;

use crate::channel::{AdapterDispatch, Channel};

/// Listens on a single Unix-domain socket path and accepts connections from
/// the subprocess worker that path was minted for.
///
/// Grounded on the teacher's `spawn_socket_server()`/accept-loop shape, but
/// the framing underneath each accepted [`Channel`] is NDJSON rather than
/// the teacher's length-prefixed frames.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
    dispatcher: Option<Arc<dyn AdapterDispatch>>,
}

impl IpcServer {
    /// Bind a new listener at `path`. The path must not already exist;
    /// callers own cleanup (the socket file and its parent directory).
    pub fn bind(path: &Path, dispatcher: Option<Arc<dyn AdapterDispatch>>) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
            dispatcher,
        })
    }

    /// The socket path this server is bound to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept the next incoming connection and wrap it in a [`Channel`].
    ///
    /// Per execution a worker opens exactly one connection, but the server
    /// does not enforce that; callers that want a strict one-shot socket
    /// should call this once and then drop the `IpcServer`.
    pub async fn accept(&self) -> std::io::Result<Channel> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(Channel::new(stream, self.dispatcher.clone()))
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Frame;
    use tempfile::tempdir;
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn accepts_connection_and_exchanges_frames() {
        let dir = tempdir().unwrap();
        let sock_path = dir.path().join("kb-subprocess-exec-1.sock");
        let server = IpcServer::bind(&sock_path, None).unwrap();

        let client_path = sock_path.clone();
        let client_task = tokio::spawn(async move {
            let stream = UnixStream::connect(&client_path).await.unwrap();
            let channel = Channel::new(stream, None);
            channel.send(Frame::Ready).unwrap();
        });

        let mut channel = server.accept().await.unwrap();
        let frame = channel.recv().await.unwrap();
        assert!(matches!(frame, Frame::Ready));
        client_task.await.unwrap();
    }

    #[tokio::test]
    async fn bind_removes_stale_socket_file() {
        let dir = tempdir().unwrap();
        let sock_path = dir.path().join("stale.sock");
        std::fs::write(&sock_path, b"not a socket").unwrap();
        let server = IpcServer::bind(&sock_path, None);
        assert!(server.is_ok());
    }

    #[tokio::test]
    async fn drop_removes_socket_file() {
        let dir = tempdir().unwrap();
        let sock_path = dir.path().join("cleanup.sock");
        {
            let _server = IpcServer::bind(&sock_path, None).unwrap();
            assert!(sock_path.exists());
        }
        assert!(!sock_path.exists());
    }
}

//! The sandboxed filesystem facade handed to plugin handlers.
//!
//! Every method consults C1 before touching the real filesystem. Permission
//! refusals surface as `PermissionDenied`; anything the OS itself reports
//! (not-found, already-exists, …) propagates unchanged so handlers can tell
//! policy apart from ordinary I/O failure, per spec §4.2.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kb_core::error::{ErrorCode, PluginError};
use kb_permissions::PermissionEvaluator;

/// A single directory entry returned by `readdirWithStats`.
#[derive(Debug, Clone)]
pub struct DirEntryStat {
    /// Entry name within the directory.
    pub name: String,
    /// True if the entry is itself a directory.
    pub is_dir: bool,
    /// Size in bytes; `0` for directories.
    pub size: u64,
}

/// The sandboxed fs facade.
pub struct FsShim {
    evaluator: Arc<PermissionEvaluator>,
}

impl FsShim {
    /// Build a facade bound to `evaluator`.
    #[must_use]
    pub fn new(evaluator: Arc<PermissionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Read a file's contents as UTF-8 text.
    pub async fn read_file(&self, path: &Path) -> Result<String, PluginError> {
        self.evaluator
            .check_read(path)
            .map_err(|denial| permission_denied(&denial))?;
        tokio::fs::read_to_string(path).await.map_err(io_error)
    }

    /// Read a file's raw bytes.
    pub async fn read_file_buffer(&self, path: &Path) -> Result<Vec<u8>, PluginError> {
        self.evaluator
            .check_read(path)
            .map_err(|denial| permission_denied(&denial))?;
        tokio::fs::read(path).await.map_err(io_error)
    }

    /// Write `contents` to `path`, auto-creating parent directories.
    ///
    /// `append` selects append-vs-truncate semantics; `encoding` is accepted
    /// for parity with the handler-facing contract but this facade only
    /// supports UTF-8 text payloads.
    pub async fn write_file(
        &self,
        path: &Path,
        contents: &str,
        append: bool,
    ) -> Result<(), PluginError> {
        self.evaluator
            .check_write(path)
            .map_err(|denial| permission_denied(&denial))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .await
            .map_err(io_error)?;
        file.write_all(contents.as_bytes()).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;
        Ok(())
    }

    /// List a directory's entry names.
    pub async fn readdir(&self, path: &Path) -> Result<Vec<String>, PluginError> {
        self.evaluator
            .check_read(path)
            .map_err(|denial| permission_denied(&denial))?;
        read_dir_names(path).await
    }

    /// List a directory with per-entry metadata.
    pub async fn readdir_with_stats(&self, path: &Path) -> Result<Vec<DirEntryStat>, PluginError> {
        self.evaluator
            .check_read(path)
            .map_err(|denial| permission_denied(&denial))?;

        let mut read_dir = tokio::fs::read_dir(path).await.map_err(io_error)?;
        let mut out = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(io_error)? {
            let metadata = entry.metadata().await.map_err(io_error)?;
            out.push(DirEntryStat {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }
        Ok(out)
    }

    /// Stat a path; fails with the OS's not-found error if it does not exist.
    pub async fn stat(&self, path: &Path) -> Result<DirEntryStat, PluginError> {
        self.evaluator
            .check_read(path)
            .map_err(|denial| permission_denied(&denial))?;
        let metadata = tokio::fs::metadata(path).await.map_err(io_error)?;
        Ok(DirEntryStat {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        })
    }

    /// Check existence; never throws for a missing path.
    pub async fn exists(&self, path: &Path) -> Result<bool, PluginError> {
        self.evaluator
            .check_read(path)
            .map_err(|denial| permission_denied(&denial))?;
        Ok(tokio::fs::metadata(path).await.is_ok())
    }

    /// Create a directory, optionally recursively.
    pub async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), PluginError> {
        self.evaluator
            .check_write(path)
            .map_err(|denial| permission_denied(&denial))?;
        if recursive {
            tokio::fs::create_dir_all(path).await.map_err(io_error)
        } else {
            tokio::fs::create_dir(path).await.map_err(io_error)
        }
    }

    /// Remove a file or directory.
    pub async fn rm(&self, path: &Path, recursive: bool, force: bool) -> Result<(), PluginError> {
        self.evaluator
            .check_write(path)
            .map_err(|denial| permission_denied(&denial))?;

        let result = if recursive {
            tokio::fs::remove_dir_all(path).await
        } else {
            match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_dir() => tokio::fs::remove_dir(path).await,
                _ => tokio::fs::remove_file(path).await,
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if force && e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }

    /// Copy a file, checking read on the source and write on the destination.
    pub async fn copy(&self, from: &Path, to: &Path) -> Result<(), PluginError> {
        self.evaluator
            .check_read(from)
            .map_err(|denial| permission_denied(&denial))?;
        self.evaluator
            .check_write(to)
            .map_err(|denial| permission_denied(&denial))?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::copy(from, to).await.map_err(io_error)?;
        Ok(())
    }

    /// Move (rename) a file, checking read on the source and write on the
    /// destination — a move is a write to the destination and an implicit
    /// deletion of the source, so both are gated.
    pub async fn move_path(&self, from: &Path, to: &Path) -> Result<(), PluginError> {
        self.evaluator
            .check_read(from)
            .map_err(|denial| permission_denied(&denial))?;
        self.evaluator
            .check_write(to)
            .map_err(|denial| permission_denied(&denial))?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::rename(from, to).await.map_err(io_error)
    }

    /// Join `segments` onto `base` — a pure path helper with no permission
    /// check, since it performs no I/O.
    #[must_use]
    pub fn join_path(base: &Path, segments: &[&str]) -> PathBuf {
        let mut out = base.to_path_buf();
        for segment in segments {
            out.push(segment);
        }
        out
    }
}

async fn read_dir_names(path: &Path) -> Result<Vec<String>, PluginError> {
    let mut read_dir = tokio::fs::read_dir(path).await.map_err(io_error)?;
    let mut out = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(io_error)? {
        out.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(out)
}

fn permission_denied(denial: &kb_permissions::PermissionDenial) -> PluginError {
    PluginError::new(ErrorCode::PermissionDenied, denial.message())
        .with_details(serde_json::json!({ "path": denial.subject() }))
}

fn io_error(err: std::io::Error) -> PluginError {
    PluginError::new(ErrorCode::InternalError, err.to_string())
        .with_details(serde_json::json!({ "ioErrorKind": format!("{:?}", err.kind()) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::{FsPermissions, PermissionSpec};
    use tempfile::tempdir;

    fn shim_for(cwd: &Path, outdir: &Path) -> FsShim {
        let perms = PermissionSpec {
            fs: FsPermissions {
                read: vec![],
                write: vec![],
            },
            ..Default::default()
        };
        let evaluator = PermissionEvaluator::new(perms, cwd.to_path_buf(), outdir.to_path_buf());
        FsShim::new(Arc::new(evaluator))
    }

    #[tokio::test]
    async fn write_under_outdir_then_read_back() {
        let dir = tempdir().unwrap();
        let cwd = dir.path().join("ws");
        let outdir = dir.path().join("out");
        tokio::fs::create_dir_all(&cwd).await.unwrap();
        tokio::fs::create_dir_all(&outdir).await.unwrap();
        let shim = shim_for(&cwd, &outdir);

        let target = outdir.join("result.txt");
        shim.write_file(&target, "hello", false).await.unwrap();
        let contents = shim.read_file(&target).await.unwrap();
        assert_eq!(contents, "hello");
    }

    #[tokio::test]
    async fn write_outside_outdir_is_permission_denied() {
        let dir = tempdir().unwrap();
        let cwd = dir.path().join("ws");
        let outdir = dir.path().join("out");
        tokio::fs::create_dir_all(&cwd).await.unwrap();
        tokio::fs::create_dir_all(&outdir).await.unwrap();
        let shim = shim_for(&cwd, &outdir);

        let err = shim
            .write_file(&cwd.join("escape.txt"), "x", false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn write_file_auto_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let cwd = dir.path().join("ws");
        let outdir = dir.path().join("out");
        tokio::fs::create_dir_all(&cwd).await.unwrap();
        tokio::fs::create_dir_all(&outdir).await.unwrap();
        let shim = shim_for(&cwd, &outdir);

        let target = outdir.join("nested/deep/result.txt");
        shim.write_file(&target, "hi", false).await.unwrap();
        assert!(tokio::fs::metadata(&target).await.is_ok());
    }

    #[tokio::test]
    async fn missing_file_read_propagates_os_error_not_permission_denied() {
        let dir = tempdir().unwrap();
        let cwd = dir.path().join("ws");
        let outdir = dir.path().join("out");
        tokio::fs::create_dir_all(&cwd).await.unwrap();
        tokio::fs::create_dir_all(&outdir).await.unwrap();
        let shim = shim_for(&cwd, &outdir);

        let err = shim.read_file(&cwd.join("missing.txt")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
    }
}

//! Per-workspace file tree, rooted at `apps/<user>/<app>` under the storage
//! root. Every operation resolves its path against the workspace root and
//! refuses any resolution that escapes it, symlinks included.

use crate::error::ApiError;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Directory names skipped by recursive listing.
const PRUNED_DIRS: &[&str] = &["node_modules", ".git", "dist", ".next", "build", ".cache"];

const DEFAULT_MAX_DEPTH: usize = 8;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("access denied: {path}")]
    AccessDenied { path: String },

    #[error("forbidden path: {path}")]
    ForbiddenPath { path: String },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl StoreError {
    fn from_io(path: &str, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound {
                path: path.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => StoreError::AccessDenied {
                path: path.to_string(),
            },
            _ => StoreError::Io {
                path: path.to_string(),
                source,
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::AccessDenied { .. } | StoreError::ForbiddenPath { .. } => {
                ApiError::Forbidden(e.to_string())
            }
            StoreError::InvalidPath { .. } => ApiError::Validation(e.to_string()),
            StoreError::Io { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

/// A directory entry as reported by [`WorkspaceStore::list`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntryInfo {
    pub name: String,
    pub is_directory: bool,
}

/// A node in a recursive listing; `path` is workspace-relative.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub size: u64,
    pub is_directory: bool,
    pub modified: Option<i64>,
}

/// Safe file operations within one workspace root.
#[derive(Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    /// Open (and create if needed) the workspace root for `(user_id, app_id)`.
    pub fn open(storage_root: &Path, user_id: i64, app_id: i64) -> Result<Self, StoreError> {
        let root = storage_root
            .join("apps")
            .join(user_id.to_string())
            .join(app_id.to_string());
        std::fs::create_dir_all(&root).map_err(|e| StoreError::from_io("<root>", e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path to an absolute one, or fail without
    /// touching the filesystem content.
    ///
    /// Rejects absolute inputs, `..` escapes, and symlink chains whose real
    /// location is outside the workspace root.
    fn resolve(&self, rel: &str) -> Result<PathBuf, StoreError> {
        if rel.contains('\0') {
            return Err(StoreError::InvalidPath {
                path: rel.to_string(),
            });
        }

        let mut parts: Vec<std::ffi::OsString> = Vec::new();
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(c) => parts.push(c.to_os_string()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(StoreError::ForbiddenPath {
                            path: rel.to_string(),
                        });
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StoreError::ForbiddenPath {
                        path: rel.to_string(),
                    });
                }
            }
        }

        let mut full = self.root.clone();
        for part in parts {
            full.push(part);
        }
        self.ensure_within_root(rel, &full)?;
        Ok(full)
    }

    /// Verify that the real location of `full` (following symlinks on the
    /// deepest existing ancestor) stays under the workspace root.
    fn ensure_within_root(&self, rel: &str, full: &Path) -> Result<(), StoreError> {
        let canon_root = self
            .root
            .canonicalize()
            .map_err(|e| StoreError::from_io(rel, e))?;

        let mut probe = full.to_path_buf();
        let canonical = loop {
            match probe.canonicalize() {
                Ok(resolved) => break resolved,
                Err(_) => {
                    let is_dangling_symlink = probe
                        .symlink_metadata()
                        .map(|m| m.file_type().is_symlink())
                        .unwrap_or(false);
                    if is_dangling_symlink {
                        return Err(StoreError::ForbiddenPath {
                            path: rel.to_string(),
                        });
                    }
                    match probe.parent() {
                        Some(parent) => probe = parent.to_path_buf(),
                        None => break canon_root.clone(),
                    }
                }
            }
        };

        if canonical.starts_with(&canon_root) {
            Ok(())
        } else {
            Err(StoreError::ForbiddenPath {
                path: rel.to_string(),
            })
        }
    }

    pub async fn read(&self, path: &str) -> Result<String, StoreError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| StoreError::from_io(path, e))
    }

    /// Write a file, creating missing parent directories.
    pub async fn write(&self, path: &str, contents: impl AsRef<[u8]>) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(path, e))?;
        }
        tokio::fs::write(&full, contents.as_ref())
            .await
            .map_err(|e| StoreError::from_io(path, e))
    }

    /// Remove a file or a directory tree.
    pub async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        let metadata = tokio::fs::symlink_metadata(&full)
            .await
            .map_err(|e| StoreError::from_io(path, e))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&full)
                .await
                .map_err(|e| StoreError::from_io(path, e))
        } else {
            tokio::fs::remove_file(&full)
                .await
                .map_err(|e| StoreError::from_io(path, e))
        }
    }

    pub async fn list(&self, dir: &str) -> Result<Vec<DirEntryInfo>, StoreError> {
        let full = self.resolve(dir)?;
        let mut entries = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| StoreError::from_io(dir, e))?;

        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::from_io(dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StoreError::from_io(dir, e))?;
            out.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory: file_type.is_dir(),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Walk the tree under `dir`, skipping build/output directories and
    /// stopping at `max_depth` levels below it.
    pub async fn list_recursive(
        &self,
        dir: &str,
        max_depth: Option<usize>,
    ) -> Result<Vec<FileNode>, StoreError> {
        let max_depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let base = self.resolve(dir)?;
        let root = self.root.clone();

        let mut out = Vec::new();
        let mut stack = vec![(base, 0usize)];
        while let Some((current, depth)) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&current)
                .await
                .map_err(|e| StoreError::from_io(dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::from_io(dir, e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StoreError::from_io(dir, e))?;
                let is_directory = file_type.is_dir();
                if is_directory && PRUNED_DIRS.contains(&name.as_str()) {
                    continue;
                }

                let rel = entry
                    .path()
                    .strip_prefix(&root)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| name.clone());
                out.push(FileNode {
                    path: rel,
                    name,
                    is_directory,
                });

                if is_directory && depth + 1 < max_depth {
                    stack.push((entry.path(), depth + 1));
                }
            }
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    pub async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::metadata(&full).await.is_ok())
    }

    pub async fn stat(&self, path: &str) -> Result<FileStat, StoreError> {
        let full = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&full)
            .await
            .map_err(|e| StoreError::from_io(path, e))?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);
        Ok(FileStat {
            size: metadata.len(),
            is_directory: metadata.is_dir(),
            modified,
        })
    }

    pub async fn ensure_dir(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| StoreError::from_io(path, e))
    }

    pub async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(to, e))?;
        }
        tokio::fs::copy(&src, &dst)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_io(from, e))
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(to, e))?;
        }
        tokio::fs::rename(&src, &dst)
            .await
            .map_err(|e| StoreError::from_io(from, e))
    }

    /// Remove the entire workspace root. Used when the workspace is deleted.
    pub async fn delete_root(self) -> Result<(), StoreError> {
        tokio::fs::remove_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::from_io("<root>", e))
    }
}

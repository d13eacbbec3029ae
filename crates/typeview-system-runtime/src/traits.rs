/*
 * traits.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The SystemRuntime trait and the types it hands out.
 */

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A template-relative path tried to leave its root.
    #[error("Path outside allowed boundary: {}", .0.display())]
    PathViolation(PathBuf),

    #[error("Failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RuntimeError {
    /// True when the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit status; -1 if the process was killed by a signal.
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Scratch directory owned by its holder and removed when dropped.
#[derive(Debug)]
pub struct TempDir {
    inner: tempfile::TempDir,
}

impl TempDir {
    pub(crate) fn new(inner: tempfile::TempDir) -> Self {
        Self { inner }
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

impl AsRef<Path> for TempDir {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Resolve a slash-separated, template-relative path under `root`.
///
/// A leading `/` is accepted (resource paths are stored absolute), but `..`,
/// drive prefixes, or a second root are rejected with
/// [`RuntimeError::PathViolation`].
pub fn join_relative(root: &Path, relative: &str) -> RuntimeResult<PathBuf> {
    let mut joined = root.to_path_buf();
    for component in Path::new(relative.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(RuntimeError::PathViolation(PathBuf::from(relative)));
            }
        }
    }
    Ok(joined)
}

/// Host operations used by the preview pipeline.
///
/// Filesystem calls are synchronous: template reads are local and small.
/// Subprocess execution is async, since an engine run is the pipeline's main
/// suspension point.
#[async_trait]
pub trait SystemRuntime: Send + Sync {
    // ── files ──────────────────────────────────────────────────────────────

    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Read a file that must be UTF-8.
    fn file_read_string(&self, path: &Path) -> RuntimeResult<String> {
        String::from_utf8(self.file_read(path)?).map_err(|e| {
            RuntimeError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not valid UTF-8: {}", path.display(), e),
            ))
        })
    }

    /// Create or truncate `path` and write `contents`.
    fn file_write(&self, path: &Path, contents: &[u8]) -> RuntimeResult<()>;

    fn file_remove(&self, path: &Path) -> RuntimeResult<()>;

    /// Whether `path` exists, and is of `kind` when one is given.
    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool>;

    fn is_file(&self, path: &Path) -> RuntimeResult<bool> {
        self.path_exists(path, Some(PathKind::File))
    }

    fn is_dir(&self, path: &Path) -> RuntimeResult<bool> {
        self.path_exists(path, Some(PathKind::Directory))
    }

    // ── directories ────────────────────────────────────────────────────────

    fn dir_create(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    fn dir_remove(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    /// Entries of `path`, sorted by path.
    fn dir_list(&self, path: &Path) -> RuntimeResult<Vec<PathBuf>>;

    /// A fresh scratch directory whose name starts with `prefix`.
    fn temp_dir(&self, prefix: &str) -> RuntimeResult<TempDir>;

    // ── environment ────────────────────────────────────────────────────────

    fn env_get(&self, name: &str) -> RuntimeResult<Option<String>>;

    /// Locate an executable: `env_var` first, if it names an existing file,
    /// then `name` on the search path. The default only consults `env_var`.
    fn find_binary(&self, name: &str, env_var: &str) -> Option<PathBuf> {
        let _ = name;
        let path = PathBuf::from(self.env_get(env_var).ok().flatten()?);
        self.is_file(&path).unwrap_or(false).then_some(path)
    }

    // ── processes ──────────────────────────────────────────────────────────

    /// Run `program` to completion, capturing its output.
    ///
    /// Only a failure to start is an error; a non-zero exit is reported in
    /// [`CommandOutput::code`].
    async fn exec_command(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> RuntimeResult<CommandOutput>;
}

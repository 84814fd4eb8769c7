//! JSON file storage backend
//!
//! Stores the whole state as one pretty-printed JSON document. The parent
//! directory and the file are created with the initial state on first access.
//! Reads and writes are guarded by an advisory lock file next to the document.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::traits::{BackendType, StateBackend};

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON file backend implementation
pub struct FileBackend {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl FileBackend {
    /// Creates a new file backend for the given path
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let mut lock_name = file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        lock_name.push(".lock");
        let lock_file_path = file_path.with_file_name(lock_name);
        Self {
            file_path,
            lock_file_path,
        }
    }

    /// Returns the path to the state document
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Acquire a lock on the lock file, exclusive for writes and shared for reads
    fn acquire_lock(&self, lock_file: &File, exclusive: bool) -> Result<()> {
        let start = Instant::now();
        loop {
            let attempt = if exclusive {
                FileExt::try_lock_exclusive(lock_file)
            } else {
                FileExt::try_lock_shared(lock_file)
            };
            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another process may be writing: {:?}",
                            self.file_path
                        );
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to acquire lock on {:?}", self.lock_file_path)
                    })
                }
            }
        }
    }

    fn write_lock(&self) -> Result<File> {
        let mut lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to create lock file: {:?}", self.lock_file_path))?;
        self.acquire_lock(&lock_file, true)?;

        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        Ok(lock_file)
    }

    fn read_lock(&self) -> Result<Option<File>> {
        if !self.lock_file_path.exists() {
            return Ok(None);
        }
        let lock_file = OpenOptions::new()
            .read(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_file_path))?;
        self.acquire_lock(&lock_file, false)?;
        Ok(Some(lock_file))
    }
}

impl StateBackend for FileBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::File
    }

    fn location(&self) -> String {
        self.file_path.display().to_string()
    }

    fn seeds_missing_document(&self) -> bool {
        true
    }

    fn read_document(&self) -> Result<Option<String>> {
        if !self.file_path.exists() {
            return Ok(None);
        }
        let _lock = self.read_lock()?;
        let contents = fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read file: {:?}", self.file_path))?;
        Ok(Some(contents))
    }

    fn write_document(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
            }
        }

        // Lock is released when the handle is dropped
        let _lock = self.write_lock()?;
        fs::write(&self.file_path, contents)
            .with_context(|| format!("Failed to write file: {:?}", self.file_path))?;
        Ok(())
    }
}

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BankError;
use crate::models::QuestionBank;

/// Handles saving and loading the question catalog from disk with file
/// locking for rudimentary multi-user support
pub struct Storage {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let lock_file_path = file_path.with_extension("yaml.lock");
        Self {
            file_path,
            lock_file_path,
        }
    }

    /// Returns the path to the storage file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Acquire an exclusive lock on the file for writing
    /// Returns the lock file handle which must be held during the operation
    fn acquire_write_lock(&self) -> Result<File> {
        // Create parent directories if needed
        if let Some(parent) = self.lock_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to create lock file: {:?}", self.lock_file_path))?;

        // Try to acquire exclusive lock with timeout
        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(5);

        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > timeout {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another writer may be active: {:?}",
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

    /// Acquire a shared lock on the file for reading
    fn acquire_read_lock(&self) -> Result<Option<File>> {
        if !self.lock_file_path.exists() {
            return Ok(None);
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_file_path))?;

        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(5);

        loop {
            match FileExt::try_lock_shared(&lock_file) {
                Ok(()) => return Ok(Some(lock_file)),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > timeout {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another writer may be active: {:?}",
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

    /// Parses the catalog from disk. Caller holds whatever lock is needed.
    fn read_bank(&self) -> Result<QuestionBank> {
        let file = File::open(&self.file_path)
            .with_context(|| format!("Failed to open file: {:?}", self.file_path))?;
        let reader = BufReader::new(file);

        let bank: QuestionBank = serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse YAML from {:?}", self.file_path))?;

        bank.validate_unique_codes()?;

        Ok(bank)
    }

    /// Serializes the catalog to a temp file and renames it into place, so
    /// a crash mid-write never leaves a torn store. Caller holds the lock.
    fn write_bank(&self, bank: &QuestionBank) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(bank)?;
        let tmp_path = self.file_path.with_extension("yaml.tmp");
        fs::write(&tmp_path, yaml)
            .with_context(|| format!("Failed to write temp file: {:?}", tmp_path))?;
        fs::rename(&tmp_path, &self.file_path)
            .with_context(|| format!("Failed to replace file: {:?}", self.file_path))?;

        Ok(())
    }

    /// Loads the catalog from the YAML file with file locking
    pub fn load(&self) -> Result<QuestionBank> {
        // Create the file if it doesn't exist
        if !self.file_path.exists() {
            let default_bank = QuestionBank::new();
            self.save(&default_bank)?;
            return Ok(default_bank);
        }

        let _lock = self.acquire_read_lock()?;
        self.read_bank()
    }

    /// Saves the catalog to the YAML file with file locking
    pub fn save(&self, bank: &QuestionBank) -> Result<()> {
        let mut lock_file = self.acquire_write_lock()?;

        // Write lock holder info (optional, for debugging)
        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        self.write_bank(bank)
    }

    /// Perform an atomic update operation with proper locking
    ///
    /// Reloads the file, applies the change, and only rewrites the file if
    /// the closure succeeds; on a closure error nothing is written and the
    /// store is exactly as it was.
    pub fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut QuestionBank) -> Result<(), BankError>,
    ) -> Result<QuestionBank, BankError> {
        let mut lock_file = self.acquire_write_lock()?;

        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        // Load latest version from disk
        let mut bank = if self.file_path.exists() {
            self.read_bank()?
        } else {
            QuestionBank::new()
        };

        update_fn(&mut bank)?;

        self.write_bank(&bank)?;

        // Lock is released when lock_file is dropped
        Ok(bank)
    }
}

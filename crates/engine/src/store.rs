//! Durable wallet store
//!
//! The whole wallet sequence is held in memory and rewritten as a single
//! JSON snapshot after every mutation. Mutations are staged on a copy and
//! only committed to memory once the snapshot is on disk, so a failed
//! persist leaves memory and disk in agreement.
//!
//! An open store holds an exclusive advisory lock on `<file>.lock` until it
//! is dropped; a second opener of the same file fails instead of racing
//! snapshot writes.

use crate::error::{StoreError, StoreResult};
use crate::wallet::{is_valid_claim_amount, WalletRecord};
use chrono::Utc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Ordered, persisted collection of managed wallets
#[derive(Debug)]
pub struct WalletStore {
    path: PathBuf,
    wallets: Vec<WalletRecord>,
    _lock: File,
}

impl WalletStore {
    /// Lock and load the store at `path`, creating an empty one if the file
    /// is absent.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let lock = acquire_lock(&path)?;

        match fs::read_to_string(&path) {
            Ok(data) => {
                let wallets: Vec<WalletRecord> = serde_json::from_str(&data)?;
                info!("Loaded {} wallets from {}", wallets.len(), path.display());
                Ok(Self {
                    path,
                    wallets,
                    _lock: lock,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                write_snapshot(&path, b"[]")?;
                info!("Created new wallet store at {}", path.display());
                Ok(Self {
                    path,
                    wallets: Vec::new(),
                    _lock: lock,
                })
            }
            Err(e) => Err(StoreError::Storage(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wallets in creation order.
    pub fn list(&self) -> &[WalletRecord] {
        &self.wallets
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WalletRecord> {
        self.wallets.get(index)
    }

    pub fn find(&self, address: &str) -> Option<&WalletRecord> {
        self.wallets.iter().find(|w| w.address() == address)
    }

    /// Generate `n` new wallets, append them and persist.
    pub async fn create(&mut self, n: usize) -> StoreResult<Vec<WalletRecord>> {
        let created: Vec<WalletRecord> = (0..n).map(|_| WalletRecord::generate()).collect();
        self.append(created).await
    }

    pub(crate) async fn append(&mut self, records: Vec<WalletRecord>) -> StoreResult<Vec<WalletRecord>> {
        let mut staged = self.wallets.clone();
        staged.extend(records.iter().cloned());
        self.commit(staged).await?;

        debug!("Appended {} wallets, store now holds {}", records.len(), self.wallets.len());
        Ok(records)
    }

    /// Remove the wallet at 0-based `index`.
    pub async fn delete(&mut self, index: usize) -> StoreResult<WalletRecord> {
        if index >= self.wallets.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: self.wallets.len(),
            });
        }

        let mut staged = self.wallets.clone();
        let removed = staged.remove(index);
        self.commit(staged).await?;

        info!("Deleted wallet {}", removed.address());
        Ok(removed)
    }

    /// Record a successful claim for `address` and return the updated record.
    ///
    /// `amount` must be finite and positive.
    pub async fn record_claim_success(
        &mut self,
        address: &str,
        amount: f64,
        tx_ref: Option<String>,
    ) -> StoreResult<WalletRecord> {
        if !is_valid_claim_amount(amount) {
            return Err(StoreError::InvalidAmount(amount));
        }

        let position = self
            .wallets
            .iter()
            .position(|w| w.address() == address)
            .ok_or_else(|| StoreError::NotFound(address.to_string()))?;

        let mut staged = self.wallets.clone();
        staged[position].apply_claim(amount, tx_ref, Utc::now());
        let updated = staged[position].clone();
        self.commit(staged).await?;

        Ok(updated)
    }

    async fn commit(&mut self, staged: Vec<WalletRecord>) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(&staged)?;
        let path = self.path.clone();

        let written = tokio::task::spawn_blocking(move || write_snapshot(&path, &data))
            .await
            .unwrap_or_else(|e| Err(StoreError::Storage(io::Error::new(ErrorKind::Other, e.to_string()))));

        if let Err(e) = written {
            error!("Failed to persist wallet store to {}: {}", self.path.display(), e);
            return Err(e);
        }
        self.wallets = staged;
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "wallets".into());
    name.push(".lock");
    path.with_file_name(name)
}

fn acquire_lock(path: &Path) -> StoreResult<File> {
    let lock_path = lock_path(path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;

    file.try_lock_exclusive().map_err(|e| {
        StoreError::Storage(io::Error::new(
            e.kind(),
            format!("wallet store {} is in use by another process: {}", path.display(), e),
        ))
    })?;

    debug!("Locked {}", lock_path.display());
    Ok(file)
}

/// Write a full snapshot via temp file + rename. Blocking.
fn write_snapshot(path: &Path, data: &[u8]) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Storage(e.error))?;

    Ok(())
}

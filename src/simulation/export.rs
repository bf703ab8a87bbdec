//! Ledger export
//!
//! Writes the stored batch as a pretty-printed JSON snapshot into the export
//! directory. Exporting never touches the ledger; it can be repeated any
//! number of times between a generate and a cleanup.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::simulation::error::{SimulationError, SimulationResult};
use crate::simulation::ledger::{SimulationBatch, SimulationLedger};
use crate::store::LedgerSlot;

/// Prefix of every export file name
const EXPORT_FILE_PREFIX: &str = "activity-export";

/// Where an export was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReceipt {
    /// Human readable confirmation
    pub message: String,
    /// File name
    pub file: String,
    /// Full path of the file
    pub path: String,
    /// URL the file can be fetched from
    pub url: String,
}

/// Writes ledger snapshots to disk
#[derive(Debug, Clone)]
pub struct ExportSerializer {
    dir: PathBuf,
    base_url: Option<String>,
}

impl ExportSerializer {
    /// Serializer writing into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), base_url: None }
    }

    /// Publish receipts under `base_url` instead of `file://` URLs
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Export directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Export the batch stored in `ledger`
    ///
    /// Fails with [`SimulationError::NoData`] when no batch is stored.
    #[instrument(skip(self, store, ledger), fields(dir = %self.dir.display()))]
    pub fn export<S: LedgerSlot + ?Sized>(
        &self,
        store: &S,
        ledger: &SimulationLedger,
        now: DateTime<Utc>,
    ) -> SimulationResult<ExportReceipt> {
        let batch = ledger.load(store)?.ok_or(SimulationError::NoData)?;
        self.write_snapshot(&batch, now)
    }

    /// Write `batch` to a new file named after `now`
    ///
    /// An existing file is never overwritten; a numeric suffix is appended
    /// until the name is free.
    pub fn write_snapshot(
        &self,
        batch: &SimulationBatch,
        now: DateTime<Utc>,
    ) -> SimulationResult<ExportReceipt> {
        let dir_display = self.dir.display().to_string();
        fs::create_dir_all(&self.dir).map_err(|e| SimulationError::export_failed(&dir_display, e))?;

        let json = serde_json::to_string_pretty(batch)
            .map_err(|e| SimulationError::export_failed(&dir_display, io::Error::from(e)))?;

        let stem = format!("{}-{}", EXPORT_FILE_PREFIX, now.format("%Y-%m-%d-%H-%M-%S"));
        let (file, path) = self.create_unique(&stem, json.as_bytes())?;

        info!("Exported batch {} to {}", batch.batch_id, path.display());
        Ok(ExportReceipt {
            message: "Activity data exported successfully".to_string(),
            url: self.url_for(&file, &path),
            path: path.display().to_string(),
            file,
        })
    }

    fn create_unique(&self, stem: &str, contents: &[u8]) -> SimulationResult<(String, PathBuf)> {
        let mut attempt = 0u32;
        loop {
            let file = if attempt == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}-{}.json", stem, attempt)
            };
            let path = self.dir.join(&file);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(handle) => {
                    write_or_remove(&path, handle, contents)?;
                    return Ok((file, path));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Export file {} exists, trying next suffix", path.display());
                    attempt += 1;
                }
                Err(e) => {
                    return Err(SimulationError::export_failed(path.display().to_string(), e));
                }
            }
        }
    }

    fn url_for(&self, file: &str, path: &Path) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), file),
            None => {
                let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                format!("file://{}", absolute.display())
            }
        }
    }
}

/// Write `contents` to the freshly created file at `path`
///
/// A failed write deletes the file so no truncated snapshot is left behind.
fn write_or_remove<W: Write>(path: &Path, mut writer: W, contents: &[u8]) -> SimulationResult<()> {
    match writer.write_all(contents).and_then(|()| writer.flush()) {
        Ok(()) => Ok(()),
        Err(e) => {
            drop(writer);
            if let Err(remove) = fs::remove_file(path) {
                warn!("Could not remove partial export {}: {}", path.display(), remove);
            }
            Err(SimulationError::export_failed(path.display().to_string(), e))
        }
    }
}

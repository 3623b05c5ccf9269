//! JSON record store.
//!
//! The [`RecordStore`] owns one document: a JSON array of [`Record`]s. It is
//! read once at the start of a run and, if anything was added, replaced as a
//! whole at the end. There is no incremental flush.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sheetsync_shared::{MissingStorePolicy, Record, RecordKey, Result, SheetSyncError};
use tracing::{debug, info, warn};

/// Handle on the store document at a fixed path.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    missing: MissingStorePolicy,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, missing: MissingStorePolicy) -> Self {
        Self {
            path: path.into(),
            missing,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record, in document order.
    ///
    /// A missing document is empty or an error depending on the policy. A
    /// document that exists but does not parse is always an error.
    pub fn load(&self) -> Result<Vec<Record>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return match self.missing {
                    MissingStorePolicy::Empty => {
                        info!(path = %self.path.display(), "store not found, starting empty");
                        Ok(Vec::new())
                    }
                    MissingStorePolicy::Fail => Err(SheetSyncError::Store(format!(
                        "{} does not exist",
                        self.path.display()
                    ))),
                };
            }
            Err(e) => return Err(SheetSyncError::io(&self.path, e)),
        };

        let records: Vec<Record> = serde_json::from_str(&content).map_err(|e| {
            SheetSyncError::Store(format!("invalid store {}: {e}", self.path.display()))
        })?;

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.key()) {
                warn!(key = %record.key(), "store contains a duplicate key");
            }
        }

        debug!(path = %self.path.display(), records = records.len(), "store loaded");
        Ok(records)
    }

    /// Replace the document with `records`.
    ///
    /// Writes pretty-printed UTF-8 JSON (non-ASCII left unescaped) to a temp
    /// file next to the target, then renames it into place.
    pub fn save(&self, records: &[Record]) -> Result<()> {
        let mut json = serde_json::to_string_pretty(records)
            .map_err(|e| SheetSyncError::Store(format!("JSON serialization failed: {e}")))?;
        json.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SheetSyncError::io(parent, e))?;
        }

        let temp = self.temp_path();
        std::fs::write(&temp, json).map_err(|e| SheetSyncError::io(&temp, e))?;
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(SheetSyncError::io(&self.path, e));
        }

        info!(path = %self.path.display(), records = records.len(), "store written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        self.path.with_file_name(format!(".{file_name}.tmp"))
    }
}

/// Keys of the given records.
pub fn existing_keys(records: &[Record]) -> HashSet<RecordKey> {
    records.iter().map(Record::key).collect()
}

/// `existing` in its original order followed by `new` in production order.
pub fn append(existing: Vec<Record>, new: Vec<Record>) -> Vec<Record> {
    let mut all = existing;
    all.extend(new);
    all
}

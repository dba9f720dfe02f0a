use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::state::UsageState;
use super::{StorageError, USAGE_FILENAME};

/// File-backed store for [`UsageState`].
///
/// `load` never fails to the caller: a missing or corrupt record is replaced
/// by a freshly initialized one, and an unreadable record degrades to an
/// in-memory default for the current call (counters restart at zero until
/// storage recovers).
#[derive(Debug)]
pub struct UsageStore {
    data_dir: PathBuf,
    path: PathBuf,
    resources: Vec<String>,
}

impl UsageStore {
    /// `resources` are the configured keys used when initializing a fresh
    /// record.
    pub fn new(data_dir: impl Into<PathBuf>, resources: Vec<String>) -> Self {
        let data_dir = data_dir.into();
        let path = data_dir.join(USAGE_FILENAME);
        Self {
            data_dir,
            path,
            resources,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self, now: DateTime<Utc>) -> UsageState {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<UsageState>(&raw) {
                Ok(state) => state,
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "usage record is corrupt, reinitializing"
                    );
                    self.initialize(now)
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no usage record, initializing");
                self.initialize(now)
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "usage record unreadable, falling back to in-memory defaults"
                );
                UsageState::initial(self.resources.iter().cloned(), now)
            }
        }
    }

    /// Atomically replace the record: the new content is written to a
    /// temporary file in the data directory and renamed over the target, so
    /// a concurrent `load` sees either the old record or the new one, never
    /// a partial write.
    pub fn save(&self, state: &UsageState) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir)?;

        let json = serde_json::to_vec_pretty(state)?;
        let mut file = NamedTempFile::new_in(&self.data_dir)?;
        file.write_all(&json)?;
        file.persist(&self.path)?;
        Ok(())
    }

    fn initialize(&self, now: DateTime<Utc>) -> UsageState {
        let state = UsageState::initial(self.resources.iter().cloned(), now);
        if let Err(err) = self.save(&state) {
            warn!(
                path = %self.path.display(),
                error = %err,
                "failed to persist freshly initialized usage record"
            );
        }
        state
    }
}

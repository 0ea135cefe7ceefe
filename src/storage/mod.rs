use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

/// Date format of the history values, e.g. `2025-01-14`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Identifier -> last-seen date, as persisted
pub type History = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("could not write history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Compute the dedup identifier of a URL. The same URL always maps to the
/// same identifier, across runs and processes.
#[must_use]
pub fn identifier(url: &str) -> String {
    format!("{:x}", md5::compute(url.trim().as_bytes()))
}

/// Return the entries seen within `retention_days` of `today`. Entries with
/// an unparsable date are dropped.
#[must_use]
pub fn prune(history: &History, retention_days: i64, today: NaiveDate) -> History {
    history
        .iter()
        .filter(|(id, seen)| match NaiveDate::parse_from_str(seen, DATE_FORMAT) {
            Ok(date) => (today - date).num_days() <= retention_days,
            Err(e) => {
                debug!(id = %id, date = %seen, error = %e, "Dropping history entry with bad date");
                false
            }
        })
        .map(|(id, seen)| (id.clone(), seen.clone()))
        .collect()
}

/// Flat JSON file of seen item identifiers
pub struct HistoryStore {
    path: PathBuf,
    entries: History,
}

impl HistoryStore {
    /// Load the history from `path`. A missing, empty or corrupt file yields
    /// an empty history.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => History::new(),
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "History file is unreadable, starting empty"
                );
                History::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => History::new(),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not read history file, starting empty"
                );
                History::new()
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "Loaded history");

        Self { path, entries }
    }

    /// Drop entries older than the retention window and return how many went
    pub fn prune(&mut self, retention_days: i64, today: NaiveDate) -> usize {
        let before = self.entries.len();
        self.entries = prune(&self.entries, retention_days, today);
        before - self.entries.len()
    }

    /// Check if an identifier is in the history
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Mark an identifier as seen on `date`
    pub fn record(&mut self, id: String, date: NaiveDate) {
        self.entries.insert(id, date.format(DATE_FORMAT).to_string());
    }

    /// Overwrite the history file with the current entries
    pub fn save(&self) -> Result<(), HistoryError> {
        let contents = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, contents).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "Saved history");
        Ok(())
    }

    #[allow(dead_code)]
    #[must_use]
    pub fn entries(&self) -> &History {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

use chrono::NaiveDate;
use tracing::info;

use crate::{config::AppConfig, storage::HistoryError, HistoryStore};

/// Drop expired entries from the history file without running a digest
pub struct Vacuum {
    config: AppConfig,
}

impl Vacuum {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Vacuum {
            config: config.clone(),
        }
    }

    /// Prune and save the history, returning the number of entries removed
    pub fn run(&self, today: NaiveDate) -> Result<usize, HistoryError> {
        let mut history = HistoryStore::load(&self.config.history_file);
        if history.is_empty() {
            info!(path = %history.path().display(), "History is empty, nothing to vacuum");
            return Ok(0);
        }
        let removed = history.prune(self.config.retention_days, today);
        history.save()?;
        info!(removed, kept = history.len(), path = %history.path().display(), "Vacuumed history");

        Ok(removed)
    }
}

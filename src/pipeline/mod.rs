use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    feeds::prelude::{FetchResult, ItemExtractor, SourceFetcher},
    sender::{DigestMessage, DigestSender},
    storage::HistoryError,
    summarizer::Summarize,
    FeedSource, HistoryStore, NormalizedItem,
};

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// No unseen items; nothing was summarized, sent or saved
    NothingNew,
    /// The summarizer failed or returned nothing; nothing was sent or saved
    SummaryFailed,
    /// The digest was generated and handed to the sender
    Delivered,
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub items: usize,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub delivered: Vec<String>,
    pub failed_recipients: Vec<String>,
}

/// Fetch, dedup, summarize, send and persist, once per invocation
pub struct DigestPipeline<'a, S, M> {
    config: &'a AppConfig,
    fetcher: &'a SourceFetcher,
    summarizer: &'a S,
    sender: &'a M,
    recipients: Vec<String>,
    today: NaiveDate,
    persist: bool,
}

impl<'a, S: Summarize, M: DigestSender> DigestPipeline<'a, S, M> {
    pub fn new(
        config: &'a AppConfig,
        fetcher: &'a SourceFetcher,
        summarizer: &'a S,
        sender: &'a M,
        recipients: Vec<String>,
        today: NaiveDate,
    ) -> Self {
        Self {
            config,
            fetcher,
            summarizer,
            sender,
            recipients,
            today,
            persist: true,
        }
    }

    /// Skip saving the history at the end of the run
    #[must_use]
    pub fn without_persist(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Run the whole digest. Source, parse and per-recipient send failures are
    /// logged and absorbed; only a failure to save the history is returned.
    ///
    /// Items are recorded in the history as they are extracted, so once the
    /// digest is generated they count as seen even for recipients whose
    /// delivery failed.
    pub async fn run(&self) -> Result<RunReport, HistoryError> {
        let mut history = HistoryStore::load(&self.config.history_file);
        let pruned = history.prune(self.config.retention_days, self.today);
        info!(entries = history.len(), pruned, "History loaded");

        let sources = self.config.sources();
        let fetched = self.fetcher.fetch_all(&sources).await;
        let mut report = RunReport {
            outcome: RunOutcome::NothingNew,
            items: 0,
            sources_ok: 0,
            sources_failed: 0,
            delivered: Vec::new(),
            failed_recipients: Vec::new(),
        };
        let items = self.collect_items(fetched, &mut history, &mut report);
        report.items = items.len();

        if items.is_empty() {
            info!("No new items, nothing to send");
            return Ok(report);
        }

        let body = match self.summarizer.summarize(&items).await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, items = items.len(), "Summarization failed, aborting the run");
                report.outcome = RunOutcome::SummaryFailed;
                return Ok(report);
            }
        };

        let message = DigestMessage::render(
            &body,
            &self.config.subject_template(),
            &self.config.digest,
            self.today,
        );
        for recipient in &self.recipients {
            match self.sender.send_digest(recipient, &message).await {
                Ok(()) => {
                    info!(recipient = %recipient, "Digest sent");
                    report.delivered.push(recipient.clone());
                }
                Err(e) => {
                    warn!(recipient = %recipient, error = %e, "Could not send digest");
                    report.failed_recipients.push(recipient.clone());
                }
            }
        }
        report.outcome = RunOutcome::Delivered;

        if self.persist {
            if let Err(e) = history.save() {
                error!(path = %history.path().display(), error = %e, "Could not save history");
                return Err(e);
            }
        }

        Ok(report)
    }

    /// Extract and dedup every fetched source, in source order
    fn collect_items(
        &self,
        fetched: Vec<(&FeedSource, FetchResult)>,
        history: &mut HistoryStore,
        report: &mut RunReport,
    ) -> Vec<NormalizedItem> {
        let extractor = ItemExtractor::new(self.config.summary_max_chars, self.today);
        let mut items = Vec::new();

        for (source, result) in fetched {
            let entries = match result.and_then(|content| extractor.extract(&content, source)) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        url = %source.endpoint,
                        category = %source.category,
                        error = %e,
                        "Skipping source"
                    );
                    report.sources_failed += 1;
                    continue;
                }
            };
            report.sources_ok += 1;

            let found = entries.len();
            let new_items = extractor.collect(entries, source, history);
            info!(
                url = %source.endpoint,
                category = %source.category,
                found,
                new = new_items.len(),
                "Source scanned"
            );
            items.extend(new_items);
        }

        items
    }
}

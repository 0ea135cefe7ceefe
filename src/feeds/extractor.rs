use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::Html;

use crate::{github, identifier, FeedSource, HistoryStore, NormalizedItem, RawEntry, SourceKind};

use super::{parser::parse_feed, SourceError};

/// Appended to summaries cut at the character budget
pub const ELLIPSIS: &str = "...";
/// Summary used when an entry carries no text at all
pub const NO_SUMMARY: &str = "No summary available";

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("markup pattern is valid"));

/// Strip all markup from an HTML fragment and collapse whitespace. Entity
/// encoded markup is decoded and stripped as well.
pub fn strip_markup(html: &str) -> String {
    let text = fragment_text(html);
    if MARKUP.is_match(&text) {
        return fragment_text(&text);
    }
    text
}

fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_chars` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}{ELLIPSIS}", cut.trim_end())
}

/// Clean a raw summary into plain text within the character budget
pub fn clean_summary(raw: &str, max_chars: usize) -> String {
    let text = strip_markup(raw);
    if text.is_empty() {
        return NO_SUMMARY.to_string();
    }
    truncate(&text, max_chars)
}

/// Pick the first non-blank of summary, description and content
pub fn raw_summary(entry: &RawEntry) -> Option<&str> {
    [&entry.summary, &entry.description, &entry.content]
        .into_iter()
        .filter_map(Option::as_deref)
        .find(|s| !s.trim().is_empty())
}

/// Turns fetched content into deduplicated items for one run
pub struct ItemExtractor {
    summary_max_chars: usize,
    today: NaiveDate,
}

impl ItemExtractor {
    #[must_use]
    pub fn new(summary_max_chars: usize, today: NaiveDate) -> Self {
        Self {
            summary_max_chars,
            today,
        }
    }

    /// Parse fetched content according to the kind of source
    pub fn extract(
        &self,
        content: &[u8],
        source: &FeedSource,
    ) -> Result<Vec<RawEntry>, SourceError> {
        match source.kind {
            SourceKind::Feed => parse_feed(content, source),
            SourceKind::GithubTrending => {
                github::parse_trending(&String::from_utf8_lossy(content), source)
            }
        }
    }

    /// Produce an item for an unseen entry and record it as seen today.
    /// Entries already in the history are skipped.
    pub fn normalize(
        &self,
        entry: RawEntry,
        source: &FeedSource,
        history: &mut HistoryStore,
    ) -> Option<NormalizedItem> {
        let id = identifier(&entry.link);
        if history.contains(&id) {
            return None;
        }
        history.record(id, self.today);

        let summary = match raw_summary(&entry) {
            Some(raw) => clean_summary(raw, self.summary_max_chars),
            None => NO_SUMMARY.to_string(),
        };

        Some(NormalizedItem {
            category: source.category.clone(),
            title: entry.title,
            url: entry.link,
            summary,
            source: entry.source_label,
        })
    }

    /// Apply the per-source cap, then dedup what is left
    pub fn collect(
        &self,
        entries: Vec<RawEntry>,
        source: &FeedSource,
        history: &mut HistoryStore,
    ) -> Vec<NormalizedItem> {
        entries
            .into_iter()
            .take(source.limit)
            .filter_map(|entry| self.normalize(entry, source, history))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::prune;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
    }

    fn source(limit: usize) -> FeedSource {
        FeedSource {
            category: "Tech & AI".to_string(),
            endpoint: "https://example.com/rss".to_string(),
            limit,
            kind: SourceKind::Feed,
            name: None,
        }
    }

    fn entry(n: usize) -> RawEntry {
        RawEntry {
            title: format!("Item {n}"),
            link: format!("https://example.com/{n}"),
            description: Some(format!("<p>Description {n}</p>")),
            source_label: "Example".to_string(),
            ..RawEntry::default()
        }
    }

    fn history() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::load(dir.path().join("history.json"));
        (dir, store)
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<p>Hello   <b>world</b></p>\n\n<div> again </div>"),
            "Hello world again"
        );
        assert_eq!(strip_markup("Fish &amp; chips"), "Fish & chips");
        assert_eq!(
            strip_markup("&lt;p&gt;Encoded &lt;i&gt;twice&lt;/i&gt;&lt;/p&gt;"),
            "Encoded twice"
        );
        assert_eq!(strip_markup("a < b and c > d"), "a < b and c > d");
        assert_eq!(strip_markup("   "), "");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("hello world again", 6), "hello...");
        assert_eq!(truncate("привет мир", 6), "привет...");
    }

    #[test]
    fn test_clean_summary_respects_budget() {
        let raw = format!("<div>{}</div>", "<p>lorem ipsum dolor</p> ".repeat(100));
        let cleaned = clean_summary(&raw, 300);
        assert!(cleaned.chars().count() <= 300 + ELLIPSIS.len());
        assert!(cleaned.ends_with(ELLIPSIS));
        assert!(!cleaned.contains('<'));
    }

    #[test]
    fn test_summary_fallback_order() {
        let mut e = RawEntry {
            summary: Some("summary".to_string()),
            description: Some("description".to_string()),
            content: Some("content".to_string()),
            ..RawEntry::default()
        };
        assert_eq!(raw_summary(&e), Some("summary"));
        e.summary = Some("  ".to_string());
        assert_eq!(raw_summary(&e), Some("description"));
        e.description = None;
        assert_eq!(raw_summary(&e), Some("content"));
        e.content = None;
        assert_eq!(raw_summary(&e), None);
    }

    #[test]
    fn test_normalize_records_and_skips_seen() {
        let (_dir, mut history) = history();
        let extractor = ItemExtractor::new(300, today());
        let src = source(3);

        let item = extractor.normalize(entry(1), &src, &mut history).unwrap();
        assert_eq!(item.category, "Tech & AI");
        assert_eq!(item.title, "Item 1");
        assert_eq!(item.url, "https://example.com/1");
        assert_eq!(item.summary, "Description 1");
        assert_eq!(item.source, "Example");
        assert_eq!(
            history.entries().get(&identifier("https://example.com/1")),
            Some(&"2025-01-20".to_string())
        );

        assert!(extractor.normalize(entry(1), &src, &mut history).is_none());
    }

    #[test]
    fn test_normalize_without_any_summary() {
        let (_dir, mut history) = history();
        let extractor = ItemExtractor::new(300, today());
        let e = RawEntry {
            description: None,
            ..entry(7)
        };
        let item = extractor.normalize(e, &source(3), &mut history).unwrap();
        assert_eq!(item.summary, NO_SUMMARY);
    }

    #[test]
    fn test_seen_today_is_skipped_after_prune() {
        let (_dir, mut history) = history();
        history.record(identifier("https://example.com/1"), today());
        history.prune(0, today());

        let extractor = ItemExtractor::new(300, today());
        assert!(extractor.normalize(entry(1), &source(3), &mut history).is_none());
    }

    #[test]
    fn test_expired_entry_reappears() {
        let (_dir, mut history) = history();
        let retention = 5;
        let expired = today() - chrono::Duration::days(retention + 1);
        history.record(identifier("https://example.com/1"), expired);

        let pruned = prune(history.entries(), retention, today());
        assert!(pruned.is_empty());

        history.prune(retention, today());
        let extractor = ItemExtractor::new(300, today());
        assert!(extractor.normalize(entry(1), &source(3), &mut history).is_some());
    }

    #[test]
    fn test_collect_applies_cap_before_dedup() {
        let (_dir, mut history) = history();
        let extractor = ItemExtractor::new(300, today());
        let entries: Vec<RawEntry> = (1..=5).map(entry).collect();

        let items = extractor.collect(entries.clone(), &source(2), &mut history);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://example.com/1");
        assert_eq!(items[1].url, "https://example.com/2");

        // the first two are seen now; the cap still stops at the first two entries
        let items = extractor.collect(entries, &source(2), &mut history);
        assert!(items.is_empty());
    }

    #[test]
    fn test_cap_counts_entries_with_links() {
        let (_dir, mut history) = history();
        let extractor = ItemExtractor::new(300, today());
        let rss = r#"<rss version="2.0"><channel><title>T</title><link>https://e.com</link>
            <description>d</description>
            <item><title>No link</title></item>
            <item><title>A</title><link>https://e.com/a</link></item>
            <item><title>B</title><link>https://e.com/b</link></item>
            <item><title>C</title><link>https://e.com/c</link></item>
            </channel></rss>"#;

        let entries = extractor.extract(rss.as_bytes(), &source(2)).unwrap();
        let items = extractor.collect(entries, &source(2), &mut history);
        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://e.com/a", "https://e.com/b"]);
    }

    #[test]
    fn test_extract_dispatches_on_kind() {
        let extractor = ItemExtractor::new(300, today());
        let rss = r#"<rss version="2.0"><channel><title>T</title><link>https://e.com</link><description>d</description>
            <item><title>A</title><link>https://e.com/a</link></item></channel></rss>"#;
        let entries = extractor.extract(rss.as_bytes(), &source(3)).unwrap();
        assert_eq!(entries.len(), 1);

        let trending = FeedSource {
            kind: SourceKind::GithubTrending,
            ..source(3)
        };
        assert!(extractor.extract(rss.as_bytes(), &trending).is_err());
    }
}

use rss::Channel;
use tracing::debug;

use crate::{is_missing_url, FeedSource, RawEntry, DEFAULT_SOURCE_LABEL};

use super::SourceError;

const UNTITLED: &str = "(untitled)";

/// Parse feed XML into raw entries. RSS 2.0 is tried first, Atom and RSS 1.0
/// are handled by the fallback parser.
pub fn parse_feed(content: &[u8], source: &FeedSource) -> Result<Vec<RawEntry>, SourceError> {
    match Channel::read_from(content) {
        Ok(channel) => Ok(from_channel(&channel, source)),
        Err(rss_error) => match feed_rs::parser::parse(content) {
            Ok(feed) => Ok(from_feed(feed, source)),
            Err(e) => Err(SourceError::Parse(format!("not RSS ({rss_error}) nor Atom ({e})"))),
        },
    }
}

/// The feed's own title, else the configured name, else the default label
pub fn source_label(feed_title: Option<&str>, source: &FeedSource) -> String {
    feed_title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or(source.name.as_deref())
        .unwrap_or(DEFAULT_SOURCE_LABEL)
        .to_string()
}

fn from_channel(channel: &Channel, source: &FeedSource) -> Vec<RawEntry> {
    let label = source_label(Some(channel.title()), source);

    channel
        .items()
        .iter()
        .filter_map(|item| {
            let link = item
                .link()
                .filter(|l| !is_missing_url(l))
                .or_else(|| item.guid().filter(|g| g.is_permalink()).map(|g| g.value()))
                .filter(|l| !is_missing_url(l));
            let Some(link) = link else {
                debug!(title = ?item.title(), "Skipping RSS item without a link");
                return None;
            };

            Some(RawEntry {
                title: title_or_default(item.title()),
                link: link.trim().to_string(),
                summary: None,
                description: item.description().map(ToString::to_string),
                content: item.content().map(ToString::to_string),
                source_label: label.clone(),
            })
        })
        .collect()
}

fn from_feed(feed: feed_rs::model::Feed, source: &FeedSource) -> Vec<RawEntry> {
    let label = source_label(feed.title.as_ref().map(|t| t.content.as_str()), source);

    feed.entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
                .or_else(|| entry.links.first())
                .map(|l| l.href.trim().to_string())
                .filter(|l| !is_missing_url(l));
            let Some(link) = link else {
                debug!(id = %entry.id, "Skipping feed entry without a link");
                return None;
            };

            Some(RawEntry {
                title: title_or_default(entry.title.as_ref().map(|t| t.content.as_str())),
                link,
                summary: entry.summary.map(|t| t.content),
                description: None,
                content: entry.content.and_then(|c| c.body),
                source_label: label.clone(),
            })
        })
        .collect()
}

fn title_or_default(title: Option<&str>) -> String {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
        .to_string()
}

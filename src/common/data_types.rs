use serde::{Deserialize, Serialize};

/// How the bytes fetched from an endpoint should be interpreted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// RSS 2.0, RSS 1.0 or Atom XML
    #[default]
    Feed,
    /// The GitHub trending HTML page
    GithubTrending,
}

/// One configured endpoint, flattened out of its category
#[derive(Clone, Debug, PartialEq)]
pub struct FeedSource {
    pub category: String,
    pub endpoint: String,
    pub limit: usize,
    pub kind: SourceKind,
    /// Label used when the feed itself carries no title
    pub name: Option<String>,
}

/// A single entry as parsed out of a feed or page, before cleaning
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub source_label: String,
}

/// An unseen item handed to the summarizer
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedItem {
    pub category: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source: String,
}

use std::time::Duration;

use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::{debug, warn};

use crate::{config::FetchConfig, FeedSource};

use super::SourceError;

/// Raw bytes of one source, or the reason there are none
pub type FetchResult = Result<Vec<u8>, SourceError>;

/// Retrieves raw content from the configured endpoints. Every request carries
/// the same user agent and timeout, whatever parser ends up reading the bytes.
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&config.accept) {
            Ok(value) => {
                headers.insert(ACCEPT, value);
            }
            Err(e) => warn!(accept = %config.accept, error = %e, "Ignoring invalid Accept header"),
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client })
    }

    /// Fetch a single source. Any transport error or non-success status fails
    /// this source only.
    pub async fn fetch(&self, source: &FeedSource) -> FetchResult {
        let response = self.client.get(&source.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let content = response.bytes().await?;
        debug!(url = %source.endpoint, bytes = content.len(), "Fetched source");
        Ok(content.to_vec())
    }

    /// Fetch all sources concurrently. Results come back in source order.
    pub async fn fetch_all<'a>(
        &self,
        sources: &'a [FeedSource],
    ) -> Vec<(&'a FeedSource, FetchResult)> {
        join_all(
            sources
                .iter()
                .map(|source| async move { (source, self.fetch(source).await) }),
        )
        .await
    }
}

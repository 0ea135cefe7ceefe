use scraper::{Html, Selector};
use url::Url;

use crate::{feeds::prelude::SourceError, FeedSource, RawEntry};

/// Label of entries scraped from the trending page
pub const LABEL: &str = "GitHub Trending";

const ROW_SELECTOR: &str = "article.Box-row";
const LINK_SELECTOR: &str = "h2 a";
const DESCRIPTION_SELECTOR: &str = "p";

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("bad selector {css}: {e:?}")))
}

/// Scrape repositories off the GitHub trending page. A page without any
/// repository rows is a parse failure, since the layout must have changed.
pub fn parse_trending(html: &str, source: &FeedSource) -> Result<Vec<RawEntry>, SourceError> {
    let base = Url::parse(&source.endpoint)
        .map_err(|e| SourceError::Parse(format!("bad endpoint {}: {e}", source.endpoint)))?;
    let rows = selector(ROW_SELECTOR)?;
    let links = selector(LINK_SELECTOR)?;
    let descriptions = selector(DESCRIPTION_SELECTOR)?;
    let label = source.name.clone().unwrap_or_else(|| LABEL.to_string());

    let document = Html::parse_document(html);
    let mut found_rows = false;
    let mut entries = Vec::new();
    for row in document.select(&rows) {
        found_rows = true;
        let Some(anchor) = row.select(&links).next() else {
            continue;
        };
        let Some(link) = anchor.value().attr("href").and_then(|href| base.join(href).ok()) else {
            continue;
        };

        // "owner /\n   repo" -> "owner/repo"
        let title = collapse(&anchor.text().collect::<String>()).replace(" / ", "/");
        let description = row
            .select(&descriptions)
            .next()
            .map(|p| collapse(&p.text().collect::<String>()))
            .filter(|d| !d.is_empty());

        entries.push(RawEntry {
            title,
            link: link.to_string(),
            summary: None,
            description,
            content: None,
            source_label: label.clone(),
        });
    }

    if !found_rows {
        return Err(SourceError::Parse(format!(
            "no '{ROW_SELECTOR}' rows on {}",
            source.endpoint
        )));
    }

    Ok(entries)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::SourceKind;

    fn source() -> FeedSource {
        FeedSource {
            category: "Open Source".to_string(),
            endpoint: "https://github.com/trending?since=daily".to_string(),
            limit: 5,
            kind: SourceKind::GithubTrending,
            name: None,
        }
    }

    const PAGE: &str = r#"<html><body><main>
      <article class="Box-row">
        <h2 class="h3 lh-condensed">
          <a href="/rust-lang/rust" data-view-component="true">
            <span class="text-normal">rust-lang /</span>
            rust
          </a>
        </h2>
        <p class="col-9 color-fg-muted my-1 pr-4">
          Empowering everyone to build reliable and efficient software.
        </p>
      </article>
      <article class="Box-row">
        <h2><a href="/tokio-rs/tokio"><span>tokio-rs /</span> tokio</a></h2>
      </article>
      <article class="Box-row">
        <h2>No link here</h2>
      </article>
    </main></body></html>"#;

    #[test]
    fn test_parse_trending() {
        let entries = parse_trending(PAGE, &source()).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "rust-lang/rust");
        assert_eq!(entries[0].link, "https://github.com/rust-lang/rust");
        assert_eq!(
            entries[0].description.as_deref(),
            Some("Empowering everyone to build reliable and efficient software.")
        );
        assert_eq!(entries[0].source_label, LABEL);

        assert_eq!(entries[1].title, "tokio-rs/tokio");
        assert_eq!(entries[1].description, None);
    }

    #[test]
    fn test_page_without_rows() {
        let result = parse_trending("<html><body><p>Rate limited</p></body></html>", &source());
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_configured_name_wins() {
        let mut src = source();
        src.name = Some("Trending Repos".to_string());
        let entries = parse_trending(PAGE, &src).unwrap();
        assert_eq!(entries[0].source_label, "Trending Repos");
    }
}

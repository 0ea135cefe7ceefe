mod data_types;

/// Label used when neither the feed nor the configuration names a source
pub const DEFAULT_SOURCE_LABEL: &str = "News";

/// Check if a link is missing or blank
pub fn is_missing_url(url: &str) -> bool {
    url.trim().is_empty()
}

pub mod prelude {
    pub use super::data_types::*;
    pub use super::{is_missing_url, DEFAULT_SOURCE_LABEL};
}

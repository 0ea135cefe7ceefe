mod extractor;
mod fetcher;
mod parser;

use thiserror::Error;

/// Why a single source contributed nothing to the run
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("could not parse content: {0}")]
    Parse(String),
}

pub mod prelude {
    pub use super::extractor::*;
    pub use super::fetcher::*;
    pub use super::parser::*;
    pub use super::SourceError;
}

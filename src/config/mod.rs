use lettre::{address::AddressError, message::Mailbox};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    sender::{ConsoleSender, Sender, SmtpSender},
    FeedSource, SourceKind,
};

const DEFAULT_HISTORY_FILE: &str = "news_history.json";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const DEFAULT_PROMPT: &str = "You are a professional news analyst. From the {count} items below, pick the 7-8 most valuable stories, favouring technology breakthroughs and major world events.

Output HTML only, no Markdown. Render every story with this template and keep the class names:

<div class=\"news-card\">
    <div class=\"card-header\">
        <span class=\"category-tag\">CATEGORY</span>
        <span class=\"source-tag\">SOURCE</span>
    </div>
    <h3 class=\"news-title\"><a href=\"LINK\" target=\"_blank\">TITLE</a></h3>
    <div class=\"news-content\">
        <p><strong>Key facts:</strong> what happened.</p>
        <p><strong>Why it matters:</strong> the impact.</p>
    </div>
</div>

Source items:
{items}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default)]
    pub kind: SourceKind,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub sources: Vec<SourceConfig>,
}

fn default_limit() -> usize {
    3
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub api_base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub prompt: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 3000,
            timeout_secs: 120,
            prompt: None,
        }
    }
}

impl SummarizerConfig {
    /// The prompt template; `{count}` and `{items}` are substituted
    pub fn prompt_template(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: String,
    pub from: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_smtp_port() -> u16 {
    465
}

fn default_sender_name() -> String {
    "DailyBot".to_string()
}

fn default_subject() -> String {
    "Daily Briefing - {date}".to_string()
}

/// Port where the server expects TLS from the first byte; any other port
/// upgrades a plain connection with STARTTLS
pub const IMPLICIT_TLS_PORT: u16 = 465;

impl SmtpConfig {
    /// Sender mailbox. `from` is either a bare address or `Name <address>`;
    /// `sender_name` is used when it carries no name of its own.
    pub fn mailbox(&self) -> Result<Mailbox, AddressError> {
        let mailbox: Mailbox = self.from.trim().parse()?;
        if mailbox.name.is_some() {
            return Ok(mailbox);
        }
        Ok(Mailbox::new(Some(self.sender_name.clone()), mailbox.email))
    }

    /// Login name, falling back to the sender address
    pub fn login(&self) -> String {
        match (&self.username, self.mailbox()) {
            (Some(username), _) => username.clone(),
            (None, Ok(mailbox)) => mailbox.email.to_string(),
            (None, Err(_)) => self.from.clone(),
        }
    }

    #[must_use]
    pub fn implicit_tls(&self) -> bool {
        self.port == IMPLICIT_TLS_PORT
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DigestStyle {
    pub title: String,
    pub footer: String,
    pub css: Option<String>,
}

impl Default for DigestStyle {
    fn default() -> Self {
        Self {
            title: "Global Daily Briefing".to_string(),
            footer: "Generated by news-digest".to_string(),
            css: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_history_file")]
    pub history_file: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub digest: DigestStyle,
}

fn default_history_file() -> String {
    DEFAULT_HISTORY_FILE.to_string()
}

fn default_retention_days() -> i64 {
    5
}

fn default_summary_max_chars() -> usize {
    300
}

impl AppConfig {
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Read {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(contents)?;

        Ok(config)
    }

    /// Apply credential overrides. `lookup` is normally `std::env::var`:
    /// `API_KEY`, `SENDER_EMAIL`, `EMAIL_PASSWORD` and `RECEIVER_EMAIL`
    /// (comma separated) are honoured.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("API_KEY") {
            self.summarizer.api_key = Some(key);
        }
        if let Some(smtp) = self.smtp.as_mut() {
            if let Some(from) = lookup("SENDER_EMAIL") {
                smtp.from = from;
            }
            if let Some(password) = lookup("EMAIL_PASSWORD") {
                smtp.password = password;
            }
            if let Some(to) = lookup("RECEIVER_EMAIL") {
                smtp.recipients = to
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.iter().all(|c| c.sources.is_empty()) {
            return Err(ConfigError::Invalid("no sources configured".to_string()));
        }
        if let Some(category) = self.categories.iter().find(|c| c.limit == 0) {
            return Err(ConfigError::Invalid(format!(
                "category '{}' has a zero item limit",
                category.name
            )));
        }
        if self.summary_max_chars == 0 {
            return Err(ConfigError::Invalid(
                "summary_max_chars must be positive".to_string(),
            ));
        }
        if self.retention_days < 0 {
            return Err(ConfigError::Invalid(
                "retention_days must not be negative".to_string(),
            ));
        }
        if let Some(smtp) = &self.smtp {
            if smtp.recipients.is_empty() {
                return Err(ConfigError::Invalid("no recipients configured".to_string()));
            }
            if smtp.mailbox().is_err() {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is not a valid sender address",
                    smtp.from
                )));
            }
            for address in &smtp.recipients {
                if address.parse::<Mailbox>().is_err() {
                    return Err(ConfigError::Invalid(format!(
                        "'{address}' is not a valid email address"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Flatten the categories into the ordered list of sources to fetch
    pub fn sources(&self) -> Vec<FeedSource> {
        self.categories
            .iter()
            .flat_map(|category| {
                category.sources.iter().map(|source| FeedSource {
                    category: category.name.clone(),
                    endpoint: source.url.clone(),
                    limit: category.limit,
                    kind: source.kind,
                    name: source.name.clone(),
                })
            })
            .collect()
    }

    /// Mail the digest when SMTP is configured, print it otherwise
    pub fn get_sender(&self, dry_run: bool) -> Sender {
        match &self.smtp {
            Some(config) if !dry_run => Sender::Smtp(SmtpSender::new(config)),
            _ => Sender::Console(ConsoleSender {}),
        }
    }

    /// Subject line template; `{date}` is substituted
    pub fn subject_template(&self) -> String {
        self.smtp
            .as_ref()
            .map_or_else(default_subject, |smtp| smtp.subject.clone())
    }

    /// Recipients of the digest; the console sender gets a single pseudo-recipient
    pub fn recipients(&self, dry_run: bool) -> Vec<String> {
        match &self.smtp {
            Some(config) if !dry_run => config.recipients.clone(),
            _ => vec!["stdout".to_string()],
        }
    }
}

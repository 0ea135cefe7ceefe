use std::sync::LazyLock;

use chrono::NaiveDate;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::config::{DigestStyle, SmtpConfig};
use crate::feeds::prelude::strip_markup;

const DEFAULT_CSS: &str = "body { font-family: Helvetica, Arial, sans-serif; background: #f4f4f4; padding: 20px; }
.container { max-width: 700px; margin: 0 auto; background: #fff; padding: 20px; border-radius: 8px; }
.news-card { border-bottom: 1px solid #eee; margin-bottom: 20px; padding-bottom: 20px; }
.news-title { font-size: 18px; margin: 10px 0; }
.news-title a { color: #333; text-decoration: none; }
.category-tag { background: #007bff; color: white; padding: 2px 5px; font-size: 12px; border-radius: 3px; }
.source-tag { color: #888; font-size: 12px; margin-left: 6px; }
.footer { text-align: center; color: #888; font-size: 12px; margin-top: 20px; }";

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(?:p|div|h[1-6]|li|ul|ol|tr|table|blockquote)\s*>|<br\s*/?>")
        .expect("block break pattern is valid")
});

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A rendered digest, ready to go to any number of recipients
#[derive(Clone, Debug)]
pub struct DigestMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl DigestMessage {
    /// Wrap the summarizer output into the final message
    pub fn render(
        body: &str,
        subject_template: &str,
        style: &DigestStyle,
        date: NaiveDate,
    ) -> Self {
        Self {
            subject: subject_template.replace("{date}", &formatted_date(date)),
            html: digest_to_html(body, style, date),
            text: digest_to_text(body, style, date),
        }
    }
}

pub trait DigestSender {
    async fn send_digest(&self, recipient: &str, message: &DigestMessage) -> Result<(), SendError>;
}

pub enum Sender {
    Console(ConsoleSender),
    Smtp(SmtpSender),
}

impl DigestSender for Sender {
    async fn send_digest(&self, recipient: &str, message: &DigestMessage) -> Result<(), SendError> {
        match self {
            Sender::Console(sender) => sender.send_digest(recipient, message).await,
            Sender::Smtp(sender) => sender.send_digest(recipient, message).await,
        }
    }
}

/// Prints the digest instead of mailing it
pub struct ConsoleSender {}

pub struct SmtpSender {
    config: SmtpConfig,
}

impl SmtpSender {
    #[must_use]
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn from_mailbox(&self) -> Result<Mailbox, SendError> {
        Ok(self.config.mailbox()?)
    }

    fn transport(&self) -> Result<SmtpTransport, SendError> {
        let builder = if self.config.implicit_tls() {
            SmtpTransport::relay(&self.config.host)?
        } else {
            SmtpTransport::starttls_relay(&self.config.host)?
        };
        let creds = Credentials::new(self.config.login(), self.config.password.clone());

        Ok(builder.port(self.config.port).credentials(creds).build())
    }
}

impl DigestSender for SmtpSender {
    async fn send_digest(&self, recipient: &str, message: &DigestMessage) -> Result<(), SendError> {
        let email = lettre::Message::builder()
            .from(self.from_mailbox()?)
            .to(recipient.parse()?)
            .subject(message.subject.clone())
            .multipart(
                MultiPart::mixed().multipart(
                    MultiPart::alternative()
                        .singlepart(SinglePart::plain(message.text.clone()))
                        .multipart(
                            MultiPart::related().singlepart(SinglePart::html(message.html.clone())),
                        ),
                ),
            )?;

        self.transport()?.send(&email)?;
        debug!(recipient = %recipient, "Digest mailed");
        Ok(())
    }
}

impl DigestSender for ConsoleSender {
    async fn send_digest(
        &self,
        _recipient: &str,
        message: &DigestMessage,
    ) -> Result<(), SendError> {
        println!("Subject: {}\n\n{}", message.subject, message.html);
        Ok(())
    }
}

/// Wrap the digest body into a styled HTML document
pub fn digest_to_html(body: &str, style: &DigestStyle, date: NaiveDate) -> String {
    format!(
        "<html><head><meta charset=\"utf-8\"><style>{css}</style></head><body>\
         <div class=\"container\"><h2>{title} ({date})</h2>{body}\
         <div class=\"footer\">{footer}</div></div></body></html>",
        css = style.css.as_deref().unwrap_or(DEFAULT_CSS),
        title = style.title,
        date = formatted_date(date),
        footer = style.footer,
    )
}

/// Plain text alternative of the digest
pub fn digest_to_text(body: &str, style: &DigestStyle, date: NaiveDate) -> String {
    format!(
        "{title} ({date})\n\n{body}\n\n{footer}",
        title = style.title,
        date = formatted_date(date),
        body = html_to_text(body),
        footer = style.footer,
    )
}

/// Strip markup, one line per block element
fn html_to_text(body: &str) -> String {
    BLOCK_BREAK
        .split(body)
        .map(strip_markup)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn formatted_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 14).unwrap()
    }

    #[test]
    fn test_render_message() {
        let style = DigestStyle::default();
        let message = DigestMessage::render(
            "<div class=\"news-card\"><h3>Rust 2.0</h3></div>",
            "Daily Briefing - {date}",
            &style,
            date(),
        );

        assert_eq!(message.subject, "Daily Briefing - 2025-01-14");
        assert!(message.html.contains("<h2>Global Daily Briefing (2025-01-14)</h2>"));
        assert!(message.html.contains("<div class=\"news-card\"><h3>Rust 2.0</h3></div>"));
        assert!(message.html.contains(".news-card {"));
        assert!(message.html.contains(&style.footer));
        assert_eq!(
            message.text,
            format!("Global Daily Briefing (2025-01-14)\n\nRust 2.0\n\n{}", style.footer)
        );
    }

    #[test]
    fn test_text_keeps_block_breaks() {
        let body = "<div class=\"news-card\"><div class=\"card-header\">\
            <span class=\"category-tag\">Tech</span> <span class=\"source-tag\">HN</span></div>\
            <h3 class=\"news-title\"><a href=\"https://e.com/1\">Rust 2.0</a></h3>\
            <div class=\"news-content\"><p><strong>Key facts:</strong> released.</p>\
            <p>Why it matters:<br>speed.</p></div></div>\
            <div class=\"news-card\"><h3>Second</h3></div>";
        let text = digest_to_text(body, &DigestStyle::default(), date());

        assert_eq!(
            text,
            format!(
                "Global Daily Briefing (2025-01-14)\n\nTech HN\nRust 2.0\nKey facts: released.\n\
                 Why it matters:\nspeed.\nSecond\n\n{}",
                DigestStyle::default().footer
            )
        );
    }

    #[test]
    fn test_custom_css() {
        let style = DigestStyle {
            css: Some("body { color: red; }".to_string()),
            ..DigestStyle::default()
        };
        let html = digest_to_html("x", &style, date());
        assert!(html.contains("<style>body { color: red; }</style>"));
        assert!(!html.contains(".news-card {"));
    }

    #[tokio::test]
    async fn test_smtp_rejects_bad_recipient() {
        let sender = SmtpSender::new(&SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: None,
            password: String::new(),
            from: "bot@example.com".to_string(),
            sender_name: "DailyBot".to_string(),
            recipients: vec![],
            subject: String::new(),
        });
        let message = DigestMessage::render("x", "s", &DigestStyle::default(), date());
        let result = sender.send_digest("not an address", &message).await;
        assert!(matches!(result, Err(SendError::Address(_))));
    }

    #[tokio::test]
    async fn test_smtp_accepts_named_sender() {
        let sender = SmtpSender::new(&SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: None,
            password: String::new(),
            from: "DailyBot <bot@example.com>".to_string(),
            sender_name: "DailyBot".to_string(),
            recipients: vec![],
            subject: String::new(),
        });
        let message = DigestMessage::render("x", "s", &DigestStyle::default(), date());

        assert_eq!(sender.from_mailbox().unwrap().email.to_string(), "bot@example.com");
        // the message builds; only the connection fails
        let result = sender.send_digest("reader@example.com", &message).await;
        assert!(matches!(result, Err(SendError::Smtp(_))));
    }

    #[tokio::test]
    async fn test_smtp_unreachable_host() {
        let sender = SmtpSender::new(&SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: None,
            password: String::new(),
            from: "bot@example.com".to_string(),
            sender_name: "DailyBot".to_string(),
            recipients: vec![],
            subject: String::new(),
        });
        let message = DigestMessage::render("x", "s", &DigestStyle::default(), date());
        let result = sender.send_digest("reader@example.com", &message).await;
        assert!(matches!(result, Err(SendError::Smtp(_))));
    }
}

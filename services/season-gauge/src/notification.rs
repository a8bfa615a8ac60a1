//! Report delivery.
//!
//! The [`Notifier`] trait is the only thing the run pipeline knows about the
//! chat sink. [`TelegramNotifier`] posts to the Bot API `sendMessage` method
//! with Markdown, falling back to plain text when Telegram cannot parse the
//! entities.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DeliveryError;
use season_common::config::NotificationConfig;

/// Telegram's per-message length limit.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Destination for rendered reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. Long messages may be split by the implementation.
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Credentials for an enabled notifier.
struct Credentials {
    bot_token: String,
    chat_id: String,
}

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    credentials: Option<Credentials>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Create a notifier from explicit configuration.
    ///
    /// Missing or empty `bot_token`/`chat_id` leaves the notifier disabled.
    pub fn new(config: &NotificationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(config, client)
    }

    pub fn with_client(config: &NotificationConfig, client: reqwest::Client) -> Self {
        let credentials = match (&config.bot_token, &config.chat_id) {
            (Some(token), Some(chat)) if config.is_configured() => Some(Credentials {
                bot_token: token.trim().to_string(),
                chat_id: chat.trim().to_string(),
            }),
            _ => None,
        };

        Self {
            credentials,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Check if delivery is possible
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    fn api_url(&self, bot_token: &str, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, bot_token)
    }

    async fn post(
        &self,
        credentials: &Credentials,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, DeliveryError> {
        self.client
            .post(self.api_url(&credentials.bot_token, "sendMessage"))
            .json(body)
            .send()
            .await
            // reqwest errors embed the URL, which carries the token.
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))
    }

    /// Send one chunk with Markdown, retrying once as plain text on a parse error.
    async fn send_single_chunk(
        &self,
        credentials: &Credentials,
        text: &str,
    ) -> Result<(), DeliveryError> {
        let body = serde_json::json!({
            "chat_id": credentials.chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });

        let resp = self.post(credentials, &body).await?;
        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status().as_u16();
        let error_text = resp.text().await.unwrap_or_default();

        // Telegram returns "Bad Request: can't parse entities" for Markdown errors
        if status == 400 && error_text.contains("parse entities") {
            tracing::warn!(
                error = %error_text,
                "Telegram Markdown parsing failed, retrying without parse_mode"
            );

            let body_plain = serde_json::json!({
                "chat_id": credentials.chat_id,
                "text": strip_markdown(text)
            });

            let resp_plain = self.post(credentials, &body_plain).await?;
            if resp_plain.status().is_success() {
                return Ok(());
            }

            return Err(DeliveryError::Rejected {
                status: resp_plain.status().as_u16(),
                body: resp_plain.text().await.unwrap_or_default(),
            });
        }

        Err(DeliveryError::Rejected {
            status,
            body: error_text,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let Some(credentials) = self.credentials.as_ref() else {
            tracing::warn!("Telegram bot token or chat id missing, report not sent");
            return Err(DeliveryError::NotConfigured);
        };

        let chunks = split_message(text, MAX_MESSAGE_LEN);
        let total = chunks.len();
        for (index, chunk) in chunks.iter().enumerate() {
            self.send_single_chunk(credentials, chunk).await?;
            tracing::debug!(chunk = index + 1, total, "Telegram chunk delivered");
        }

        tracing::info!(chunks = total, "Report delivered to Telegram");
        Ok(())
    }
}

/// Plain-text rendering of legacy Telegram Markdown.
///
/// Escaped characters (`\_`) become literal, unescaped `*`, `_` and `` ` ``
/// markers are dropped.
pub fn strip_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&next @ ('_' | '*' | '`' | '[' | '\\')) => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            },
            '*' | '_' | '`' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Largest char boundary not after `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0)
}

/// Split a message into chunks of at most `max_len` bytes, preferring
/// paragraph and line boundaries.
pub fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.len() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let hard_limit = floor_char_boundary(remaining, max_len);
        let window = &remaining[..hard_limit];
        let split_pos = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(' '))
            .unwrap_or(hard_limit);

        let actual_split = if split_pos == 0 { hard_limit } else { split_pos };
        // A single character wider than max_len still has to go somewhere.
        let actual_split = if actual_split == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map_or(remaining.len(), |(i, _)| i)
        } else {
            actual_split
        };

        chunks.push(remaining[..actual_split].to_string());
        remaining = remaining[actual_split..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>, chat: Option<&str>) -> NotificationConfig {
        NotificationConfig {
            bot_token: token.map(str::to_string),
            chat_id: chat.map(str::to_string),
            ..NotificationConfig::default()
        }
    }

    #[test]
    fn test_disabled_without_credentials() {
        assert!(!TelegramNotifier::new(&config(None, Some("42"))).is_enabled());
        assert!(!TelegramNotifier::new(&config(Some("t"), None)).is_enabled());
        assert!(!TelegramNotifier::new(&config(Some(""), Some("42"))).is_enabled());
        assert!(TelegramNotifier::new(&config(Some("t"), Some("42"))).is_enabled());
    }

    #[tokio::test]
    async fn test_send_without_credentials_is_not_configured() {
        let notifier = TelegramNotifier::new(&config(None, None));
        assert_eq!(
            notifier.send("hello").await,
            Err(DeliveryError::NotConfigured)
        );
    }

    #[test]
    fn test_api_url() {
        let mut cfg = config(Some("123:abc"), Some("42"));
        cfg.api_base = "http://localhost:9/".to_string();
        let notifier = TelegramNotifier::new(&cfg);
        assert_eq!(
            notifier.api_url("123:abc", "sendMessage"),
            "http://localhost:9/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_strip_markdown() {
        assert_eq!(
            strip_markdown("❌ *Analysis failed* (2024-08-05): `credit\\_spread` is 5\\*"),
            "❌ Analysis failed (2024-08-05): credit_spread is 5*"
        );
        assert_eq!(strip_markdown("trailing \\"), "trailing \\");
        assert_eq!(strip_markdown("[link"), "[link");
    }

    #[test]
    fn split_message_short() {
        let result = split_message("Hello, World!", MAX_MESSAGE_LEN);
        assert_eq!(result, vec!["Hello, World!".to_string()]);
    }

    #[test]
    fn split_message_long() {
        let msg = "x".repeat(5000);
        let result = split_message(&msg, MAX_MESSAGE_LEN);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn split_message_prefers_line_breaks() {
        let line = "a".repeat(30);
        let msg = format!("{line}\n{line}\n{line}");
        let result = split_message(&msg, 70);
        assert_eq!(result, vec![format!("{line}\n{line}"), line]);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        let msg = "❄️".repeat(2000);
        let result = split_message(&msg, MAX_MESSAGE_LEN);
        assert!(result.len() > 1);
        assert!(result.iter().all(|c| c.len() <= MAX_MESSAGE_LEN));
        assert_eq!(result.concat(), msg);
    }
}

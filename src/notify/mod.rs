pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{Environment, NotifyConfig};

pub use telegram::TelegramChannel;

/// Out-of-band delivery of challenge codes to the operator.
///
/// `send` reports delivery as a plain bool: callers treat a failed send as a
/// warning, never as a reason to refuse the request.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: &str) -> bool;

    fn name(&self) -> &'static str;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, message: &str) -> bool {
        info!(target: "notify", "{}", message);
        true
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Stands in for a missing transport outside development. Nothing is
/// delivered and the message is never written anywhere.
#[derive(Debug, Default)]
pub struct WithheldChannel;

#[async_trait]
impl NotificationChannel for WithheldChannel {
    async fn send(&self, _message: &str) -> bool {
        warn!("No notification transport configured; challenge code withheld");
        false
    }

    fn name(&self) -> &'static str {
        "withheld"
    }
}

/// Telegram when both bot token and chat id are configured. Otherwise the log
/// in development and nothing at all elsewhere, so live codes stay out of logs.
pub fn from_config(config: &NotifyConfig, environment: &Environment) -> anyhow::Result<Arc<dyn NotificationChannel>> {
    match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
            let channel = TelegramChannel::new(
                &config.telegram_api_base,
                token,
                chat_id,
                std::time::Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(channel))
        }
        _ if matches!(environment, Environment::Development) => {
            info!("Telegram not configured, challenge codes go to the log");
            Ok(Arc::new(LogChannel))
        }
        _ => {
            warn!("Telegram not configured in {:?}; challenge codes cannot be delivered", environment);
            Ok(Arc::new(WithheldChannel))
        }
    }
}

/*
 * Notification channels
 *
 * The challenge code is the second factor: it must reach the operator through
 * a path that does not pass through the browser session that asked for it.
 *
 * - TelegramChannel: Bot API sendMessage, Markdown formatted
 * - LogChannel: development fallback, code lands in the `notify` log target
 * - WithheldChannel: staging/production without Telegram, every send fails
 */

#[cfg(test)]
mod tests {
    use super::*;

    fn notify_config(token: Option<&str>, chat: Option<&str>) -> NotifyConfig {
        NotifyConfig {
            telegram_bot_token: token.map(str::to_string),
            telegram_chat_id: chat.map(str::to_string),
            telegram_api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn log_channel_always_delivers() {
        assert!(LogChannel.send("hello").await);
    }

    #[test]
    fn missing_credentials_fall_back_to_log_in_development() {
        let channel = from_config(&notify_config(Some("token"), None), &Environment::Development).unwrap();
        assert_eq!(channel.name(), "log");

        let channel = from_config(&notify_config(Some(""), Some("42")), &Environment::Development).unwrap();
        assert_eq!(channel.name(), "log");
    }

    #[tokio::test]
    async fn production_never_logs_codes() {
        for environment in [Environment::Staging, Environment::Production] {
            let channel = from_config(&notify_config(None, None), &environment).unwrap();
            assert_eq!(channel.name(), "withheld");
            assert!(!channel.send("Code: `AB12CD`").await);
        }
    }

    #[test]
    fn full_credentials_select_telegram() {
        let channel = from_config(&notify_config(Some("123:abc"), Some("42")), &Environment::Production).unwrap();
        assert_eq!(channel.name(), "telegram");
    }
}

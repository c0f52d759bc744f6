use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::NotificationChannel;

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Delivers messages through the Telegram Bot API `sendMessage` method
pub struct TelegramChannel {
    client: reqwest::Client,
    endpoint: Url,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(api_base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        // "./" keeps a `bot123:ABC` segment from parsing as a URL scheme
        let endpoint = base.join(&format!("./bot{}/sendMessage", bot_token))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(&self, message: &str) -> bool {
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", message),
            ("parse_mode", "Markdown"),
        ];

        // The endpoint embeds the bot token; keep it out of logged errors
        let response = match self.client.post(self.endpoint.clone()).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Telegram request failed: {}", e.without_url());
                return false;
            }
        };

        match response.json::<SendMessageResponse>().await {
            Ok(body) if body.ok => {
                debug!("Telegram message delivered");
                true
            }
            Ok(body) => {
                warn!("Telegram rejected message: {}", body.description.unwrap_or_default());
                false
            }
            Err(e) => {
                warn!("Unreadable Telegram response: {}", e.without_url());
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, routing::post, Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    async fn fake_bot_api(ok: bool) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let recorded = seen.clone();
        let app = Router::new().route(
            "/:bot/sendMessage",
            post(move |Path(bot): Path<String>, Form(form): Form<HashMap<String, String>>| {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().unwrap().push((bot, form));
                    Json(serde_json::json!({ "ok": ok, "description": "chat not found" }))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    #[tokio::test]
    async fn posts_markdown_message_to_bot_endpoint() {
        let (base, seen) = fake_bot_api(true).await;
        let channel = TelegramChannel::new(&base, "123:abc", "42", Duration::from_secs(5)).unwrap();

        assert!(channel.send("*Code*: `ABC123`").await);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (bot, form) = &seen[0];
        assert_eq!(bot, "bot123:abc");
        assert_eq!(form["chat_id"], "42");
        assert_eq!(form["text"], "*Code*: `ABC123`");
        assert_eq!(form["parse_mode"], "Markdown");
    }

    #[tokio::test]
    async fn api_refusal_is_reported_as_failure() {
        let (base, _) = fake_bot_api(false).await;
        let channel = TelegramChannel::new(&base, "123:abc", "42", Duration::from_secs(5)).unwrap();
        assert!(!channel.send("hello").await);
    }

    #[tokio::test]
    async fn unreachable_api_is_reported_as_failure() {
        let port = portpicker::pick_unused_port().unwrap();
        let base = format!("http://127.0.0.1:{}", port);
        let channel = TelegramChannel::new(&base, "123:abc", "42", Duration::from_secs(2)).unwrap();
        assert!(!channel.send("hello").await);
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let channel =
            TelegramChannel::new("http://proxy.local/telegram", "t0k", "1", Duration::from_secs(1)).unwrap();
        assert_eq!(channel.endpoint.as_str(), "http://proxy.local/telegram/bott0k/sendMessage");
    }
}

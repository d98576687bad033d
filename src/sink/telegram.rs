use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{NotificationConfig, TelegramCredentials};
use crate::error::{ConfigError, NotifyError};
use crate::sink::Notifier;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends notifications through the Telegram Bot API `sendMessage` method
pub struct TelegramNotifier {
    client: Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, credentials: TelegramCredentials) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/bot{}/sendMessage",
                api_url.trim_end_matches('/'),
                credentials.bot_token
            ),
            chat_id: credentials.chat_id,
        })
    }

    /// Missing secrets are a configuration error
    pub fn from_config(config: &NotificationConfig) -> Result<Self, ConfigError> {
        let credentials = config.credentials()?;
        Self::new(&config.telegram_api_url, credentials)
            .map_err(|e| ConfigError::InvalidValue {
                key: "notification".to_string(),
                value: e.to_string(),
            })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SendMessageRequest {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            // The request URL embeds the bot token
            .map_err(|e| NotifyError::Http(e.without_url()))?;

        let status = response.status();
        let body: Option<TelegramResponse> = response.json().await.ok();

        match body {
            Some(reply) if status.is_success() && reply.ok => Ok(()),
            reply => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: reply
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> TelegramCredentials {
        TelegramCredentials {
            bot_token: "123:abc".to_string(),
            chat_id: "-1001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(json!({ "chat_id": "-1001", "text": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&server.uri(), credentials()).unwrap();
        notifier.send("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_error_hides_bot_token() {
        let notifier = TelegramNotifier::new(
            "http://127.0.0.1:1",
            TelegramCredentials {
                bot_token: "123456:SECRET-TOKEN".to_string(),
                chat_id: "-1001".to_string(),
            },
        )
        .unwrap();

        let err = notifier.send("hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
        let text = format!("{} {:?}", err, err);
        assert!(!text.contains("SECRET-TOKEN"), "token leaked: {}", text);
    }

    #[tokio::test]
    async fn test_rejected_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&server.uri(), credentials()).unwrap();
        match notifier.send("hello").await {
            Err(NotifyError::Rejected { status, description }) => {
                assert_eq!(status, 400);
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ok_false_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false })))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&server.uri(), credentials()).unwrap();
        assert!(matches!(
            notifier.send("hello").await,
            Err(NotifyError::Rejected { status: 200, .. })
        ));
    }

    #[test]
    fn test_from_config_requires_secrets() {
        let result = TelegramNotifier::from_config(&NotificationConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }
}

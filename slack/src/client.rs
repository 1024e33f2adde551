//! Thin Slack Web API client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::SlackConfig;
use crate::error::{SlackError, SlackResult, api_error};

const USERS_PAGE_SIZE: u32 = 200;

/// Who we are, from `auth.test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    config: SlackConfig,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> SlackResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SlackError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    pub async fn auth_test(&self) -> SlackResult<BotIdentity> {
        let response = self.post("auth.test", self.config.bot_token(), &json!({})).await?;

        let user_id = str_field(&response, "user_id")?;
        let name = response
            .get("user")
            .and_then(|v| v.as_str())
            .unwrap_or(&user_id)
            .to_string();

        Ok(BotIdentity { user_id, name })
    }

    /// Every member of the workspace, following pagination cursors.
    pub async fn users_list(&self) -> SlackResult<Vec<SlackUser>> {
        let mut users = Vec::new();
        let mut cursor = String::new();

        loop {
            let limit = USERS_PAGE_SIZE.to_string();
            let mut query = vec![("limit", limit.as_str())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let response = self.get("users.list", &query).await?;
            let members = response
                .get("members")
                .cloned()
                .ok_or_else(|| SlackError::InvalidPayload("users.list without members".into()))?;
            users.extend(serde_json::from_value::<Vec<SlackUser>>(members)?);

            cursor = response
                .pointer("/response_metadata/next_cursor")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if cursor.is_empty() {
                break;
            }
        }

        debug!(count = users.len(), "fetched workspace users");
        Ok(users)
    }

    /// Posts `text` and returns the new message's `ts`.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> SlackResult<String> {
        let mut payload = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = json!(thread_ts);
        }

        let response = self
            .post("chat.postMessage", self.config.bot_token(), &payload)
            .await?;
        str_field(&response, "ts")
    }

    /// Fresh WebSocket URL for Socket Mode. Uses the app-level token.
    pub async fn open_socket_url(&self) -> SlackResult<String> {
        let response = self
            .post("apps.connections.open", self.config.app_token(), &json!({}))
            .await?;
        str_field(&response, "url")
    }

    async fn post(&self, method: &str, token: &str, payload: &Value) -> SlackResult<Value> {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(token)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(payload)
            .send()
            .await?;

        check_response(method, response).await
    }

    async fn get(&self, method: &str, query: &[(&str, &str)]) -> SlackResult<Value> {
        let response = self
            .http
            .get(self.url(method))
            .bearer_auth(self.config.bot_token())
            .query(query)
            .send()
            .await?;

        check_response(method, response).await
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.config.api_base_url(), method)
    }
}

async fn check_response(method: &str, response: reqwest::Response) -> SlackResult<Value> {
    if response.status() == 429 {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        return Err(SlackError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(SlackError::Api(format!("{} returned {}: {}", method, status, body)));
    }

    let body: Value = response.json().await?;
    if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
        let code = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown");
        return Err(api_error(method, code));
    }

    Ok(body)
}

fn str_field(body: &Value, field: &str) -> SlackResult<String> {
    body.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| SlackError::InvalidPayload(format!("missing {} in response", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SlackClient {
        let config =
            SlackConfig::new("xoxb-bot", "xapp-app").with_api_base_url(format!("{}/api", server.uri()));
        SlackClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn auth_test_returns_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth.test"))
            .and(header("Authorization", "Bearer xoxb-bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "user_id": "UBOT", "user": "oracle"
            })))
            .mount(&server)
            .await;

        let identity = client(&server).auth_test().await.unwrap();
        assert_eq!(
            identity,
            BotIdentity {
                user_id: "UBOT".into(),
                name: "oracle".into()
            }
        );
    }

    #[tokio::test]
    async fn invalid_auth_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth.test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_auth"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).auth_test().await.unwrap_err();
        assert!(matches!(err, SlackError::Auth(_)));
    }

    #[tokio::test]
    async fn post_message_in_thread_returns_ts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(body_json(json!({
                "channel": "C1", "text": "Prompting Chain:\nx", "thread_ts": "1.0"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "2.0"})))
            .expect(1)
            .mount(&server)
            .await;

        let ts = client(&server)
            .post_message("C1", "Prompting Chain:\nx", Some("1.0"))
            .await
            .unwrap();
        assert_eq!(ts, "2.0");
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_message("C1", "hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn users_list_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users.list"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": [{"id": "U2", "name": "bob"}],
                "response_metadata": {"next_cursor": ""}
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/users.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": [{"id": "U1", "name": "alice", "real_name": "Alice"}],
                "response_metadata": {"next_cursor": "page2"}
            })))
            .mount(&server)
            .await;

        let users = client(&server).users_list().await.unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn socket_url_uses_app_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/apps.connections.open"))
            .and(header("Authorization", "Bearer xapp-app"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "url": "wss://example/ws"})),
            )
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).open_socket_url().await.unwrap(),
            "wss://example/ws"
        );
    }
}

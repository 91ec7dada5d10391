//! Blocking HTTP client for the Slack Web API.
//!
//! Each call is a single GET; retrying on 429 is the caller's job (see
//! `export::rate_limit`). This client only classifies the outcome.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, COOKIE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::types::Envelope;
use super::{
    AuthIdentity, ConversationApi, ConversationsPage, HistoryPage, MembersPage, UsersPage,
    WorkspaceApi, OLDEST_TIMESTAMP,
};
use crate::config::ExportConfig;
use crate::error::ApiError;

/// Page size for workspace listing endpoints
const LIST_LIMIT: &str = "1000";

pub struct SlackClient {
    http: Client,
    base_url: String,
    token: String,
    cookie: Option<String>,
}

impl SlackClient {
    /// Build a client for `config.api_base_url`. `cookie` is sent verbatim as a
    /// Cookie header, which browser-session (xoxc) tokens require.
    pub fn new(config: &ExportConfig, token: impl Into<String>, cookie: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("slack-export/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            token: token.into(),
            cookie,
        })
    }

    fn get<T: DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url, method);

        let mut request = self.http.get(&url).bearer_auth(&self.token).query(params);
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().map_err(|source| ApiError::Transport {
            method: method.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                method: method.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|source| ApiError::Transport {
            method: method.to_string(),
            source,
        })?;

        decode_body(method, &body)
    }
}

/// Seconds from a `Retry-After` header, if present and numeric
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Check the `ok` envelope, then decode the payload
fn decode_body<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, ApiError> {
    let decode_err = |source: serde_json::Error| ApiError::Decode {
        method: method.to_string(),
        source,
    };

    let envelope: Envelope = serde_json::from_str(body).map_err(decode_err)?;
    if !envelope.ok {
        return Err(ApiError::Slack {
            method: method.to_string(),
            error: envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
        });
    }

    serde_json::from_str(body).map_err(decode_err)
}

impl ConversationApi for SlackClient {
    fn history(&self, channel: &str, latest: Option<&str>, limit: u32) -> Result<HistoryPage, ApiError> {
        let limit = limit.to_string();
        let mut params = vec![
            ("channel", channel),
            ("oldest", OLDEST_TIMESTAMP),
            ("limit", limit.as_str()),
        ];
        if let Some(latest) = latest {
            params.push(("latest", latest));
        }
        self.get("conversations.history", &params)
    }

    fn replies(
        &self,
        channel: &str,
        ts: &str,
        latest: Option<&str>,
        limit: u32,
    ) -> Result<HistoryPage, ApiError> {
        let limit = limit.to_string();
        let mut params = vec![
            ("channel", channel),
            ("ts", ts),
            ("oldest", OLDEST_TIMESTAMP),
            ("limit", limit.as_str()),
        ];
        if let Some(latest) = latest {
            params.push(("latest", latest));
        }
        self.get("conversations.replies", &params)
    }
}

impl WorkspaceApi for SlackClient {
    fn auth_test(&self) -> Result<AuthIdentity, ApiError> {
        self.get("auth.test", &[])
    }

    fn list_users(&self, cursor: Option<&str>) -> Result<UsersPage, ApiError> {
        let mut params = vec![("limit", LIST_LIMIT)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.get("users.list", &params)
    }

    fn list_conversations(&self, types: &str, cursor: Option<&str>) -> Result<ConversationsPage, ApiError> {
        let mut params = vec![("types", types), ("limit", LIST_LIMIT)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.get("conversations.list", &params)
    }

    fn conversation_members(&self, channel: &str, cursor: Option<&str>) -> Result<MembersPage, ApiError> {
        let mut params = vec![("channel", channel), ("limit", LIST_LIMIT)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.get("conversations.members", &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_reads_numeric_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(retry_after(&headers), Some(30));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn decode_body_returns_payload_when_ok() {
        let body = r#"{"ok":true,"messages":[{"ts":"2.000001"},{"ts":"1.000001"}],"has_more":true}"#;
        let page: HistoryPage = decode_body("conversations.history", body).unwrap();
        assert!(page.has_more);
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].ts, "2.000001");
    }

    #[test]
    fn decode_body_surfaces_slack_error() {
        let body = r#"{"ok":false,"error":"channel_not_found"}"#;
        let err = decode_body::<HistoryPage>("conversations.history", body).unwrap_err();
        match err {
            ApiError::Slack { method, error } => {
                assert_eq!(method, "conversations.history");
                assert_eq!(error, "channel_not_found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_body_rejects_non_json() {
        let err = decode_body::<HistoryPage>("conversations.history", "<html>").unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn conversations_page_ignores_empty_cursor() {
        let body = r#"{"ok":true,"channels":[{"id":"C1","name":"general","is_member":true}],"response_metadata":{"next_cursor":""}}"#;
        let page: ConversationsPage = decode_body("conversations.list", body).unwrap();
        assert_eq!(page.channels[0].display_name(), "general");
        assert!(page.channels[0].is_member);
        assert_eq!(page.next_cursor(), None);
    }
}

//! Generation backend client.
//!
//! DESIGN
//! ======
//! Generation requests are posted as `chatgpt_request` events to a hosted
//! event endpoint, authenticated with the user's access token. The endpoint
//! answers with the model's structured JSON output; interpreting that JSON
//! is left to the generation service.

use reqwest::StatusCode;
use serde::Serialize;

use super::error_body;
use super::types::{GenerationError, GenerationRequest, NameGenerator, Session};

pub const CHAT_EVENT_TYPE: &str = "chatgpt_request";

#[derive(Serialize)]
struct EventEnvelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    app_id: Option<&'a str>,
    #[serde(rename = "type")]
    event_type: &'a str,
    data: &'a GenerationRequest,
}

pub struct EventClient {
    http: reqwest::Client,
    events_url: String,
    app_id: Option<String>,
}

impl EventClient {
    #[must_use]
    pub fn new(http: reqwest::Client, events_url: impl Into<String>, app_id: Option<String>) -> Self {
        Self { http, events_url: events_url.into(), app_id }
    }
}

#[async_trait::async_trait]
impl NameGenerator for EventClient {
    async fn generate(
        &self,
        session: &Session,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError> {
        let envelope = EventEnvelope { app_id: self.app_id.as_deref(), event_type: CHAT_EVENT_TYPE, data: request };
        let response = self
            .http
            .post(&self.events_url)
            .bearer_auth(session.access_token.as_str())
            .json(&envelope)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GenerationError::Backend { status: status.as_u16(), body: error_body(response).await });
        }

        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(format!("body is not JSON: {e}")))
    }
}

#[cfg(test)]
#[path = "generation_test.rs"]
mod tests;

//! Persistence backend client: `GET /api/getNames`, `POST /api/saveName`.

use reqwest::StatusCode;

use super::error_body;
use super::types::{NameStore, SavedNameRecord, Session, StoreError};

const LIST_PATH: &str = "/api/getNames";
const SAVE_PATH: &str = "/api/saveName";

pub struct NamesApi {
    http: reqwest::Client,
    base_url: String,
}

impl NamesApi {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl NameStore for NamesApi {
    async fn list_names(&self, session: &Session) -> Result<Vec<SavedNameRecord>, StoreError> {
        let response = self
            .http
            .get(self.endpoint(LIST_PATH))
            .bearer_auth(session.access_token.as_str())
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(StoreError::Status { status: status.as_u16(), body: error_body(response).await });
        }

        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn save_name(&self, session: &Session, name: &str) -> Result<(), StoreError> {
        let response = self
            .http
            .post(self.endpoint(SAVE_PATH))
            .bearer_auth(session.access_token.as_str())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(StoreError::Status { status: status.as_u16(), body: error_body(response).await });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "names_test.rs"]
mod tests;

use std::env;

use async_trait::async_trait;
use quest_core::model::{ActivityId, PlayRecordId};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use storage::repository::{
    PlayCountRepository, PlayRecord, PlayRecordRepository, PlayRecordUpdate, StorageError,
};
use url::Url;

use crate::error::PlayRecordClientError;

/// Where the hosted play-record backend lives.
#[derive(Clone, Debug)]
pub struct PlayRecordConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
}

impl PlayRecordConfig {
    /// # Errors
    ///
    /// Returns `url::ParseError` when `base_url` is not an absolute URL.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(base_url.trim())?;
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        Ok(Self { base_url, api_key })
    }

    /// Reads `QUEST_RECORDS_URL` and `QUEST_RECORDS_KEY`. `None` means plays
    /// are recorded in local storage.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let raw = env::var("QUEST_RECORDS_URL").ok()?;
        if raw.trim().is_empty() {
            return None;
        }
        match Self::new(&raw, env::var("QUEST_RECORDS_KEY").ok()) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!(url = %raw, error = %err, "ignoring invalid QUEST_RECORDS_URL");
                None
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

/// Play records and play counts kept by a remote backend over JSON/HTTP.
#[derive(Clone)]
pub struct HttpPlayRecorder {
    client: Client,
    config: PlayRecordConfig,
}

impl HttpPlayRecorder {
    #[must_use]
    pub fn new(config: PlayRecordConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PlayRecordConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, PlayRecordClientError> {
        let response = self.authorized(request).send().await?;
        if !response.status().is_success() {
            return Err(PlayRecordClientError::HttpStatus(response.status()));
        }
        Ok(response)
    }

    /// Open a record on the backend.
    ///
    /// # Errors
    ///
    /// Returns `PlayRecordClientError` when the request fails or the response
    /// carries no id.
    pub async fn start(&self, activity_id: ActivityId) -> Result<PlayRecordId, PlayRecordClientError> {
        let url = self.config.endpoint(&format!("activities/{activity_id}/plays"));
        let body: CreatedBody = self.send(self.client.post(url)).await?.json().await?;
        body.id.ok_or(PlayRecordClientError::MissingId)
    }

    /// Send the final numbers of a play-through.
    ///
    /// # Errors
    ///
    /// Returns `PlayRecordClientError` when the request fails.
    pub async fn update(
        &self,
        id: PlayRecordId,
        update: &PlayRecordUpdate,
    ) -> Result<(), PlayRecordClientError> {
        let url = self.config.endpoint(&format!("plays/{id}"));
        let payload = UpdateBody {
            score: update.score,
            completed: update.completed,
            duration_secs: update.duration_secs,
        };
        self.send(self.client.patch(url).json(&payload)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `PlayRecordClientError` when the request fails.
    pub async fn fetch(&self, id: PlayRecordId) -> Result<PlayRecord, PlayRecordClientError> {
        let url = self.config.endpoint(&format!("plays/{id}"));
        let body: RecordBody = self.send(self.client.get(url)).await?.json().await?;
        Ok(PlayRecord {
            id,
            activity_id: body.activity_id,
            score: body.score,
            completed: body.completed,
            duration_secs: body.duration_secs,
        })
    }

    /// # Errors
    ///
    /// Returns `PlayRecordClientError` when the request fails.
    pub async fn bump_count(&self, activity_id: ActivityId) -> Result<u64, PlayRecordClientError> {
        let url = self.config.endpoint(&format!("activities/{activity_id}/play-count"));
        let body: CountBody = self.send(self.client.post(url)).await?.json().await?;
        Ok(body.plays)
    }

    /// # Errors
    ///
    /// Returns `PlayRecordClientError` when the request fails.
    pub async fn count(&self, activity_id: ActivityId) -> Result<u64, PlayRecordClientError> {
        let url = self.config.endpoint(&format!("activities/{activity_id}/play-count"));
        let body: CountBody = self.send(self.client.get(url)).await?.json().await?;
        Ok(body.plays)
    }
}

#[async_trait]
impl PlayRecordRepository for HttpPlayRecorder {
    async fn record_play_start(
        &self,
        activity_id: ActivityId,
    ) -> Result<PlayRecordId, StorageError> {
        Ok(self.start(activity_id).await?)
    }

    async fn update_play_record(
        &self,
        id: PlayRecordId,
        update: &PlayRecordUpdate,
    ) -> Result<(), StorageError> {
        Ok(self.update(id, update).await?)
    }

    async fn get_play_record(&self, id: PlayRecordId) -> Result<PlayRecord, StorageError> {
        Ok(self.fetch(id).await?)
    }
}

#[async_trait]
impl PlayCountRepository for HttpPlayRecorder {
    async fn increment_play_count(&self, activity_id: ActivityId) -> Result<u64, StorageError> {
        Ok(self.bump_count(activity_id).await?)
    }

    async fn play_count(&self, activity_id: ActivityId) -> Result<u64, StorageError> {
        Ok(self.count(activity_id).await?)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedBody {
    id: Option<PlayRecordId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    score: u32,
    completed: bool,
    duration_secs: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordBody {
    activity_id: ActivityId,
    #[serde(default)]
    score: Option<u32>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    duration_secs: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CountBody {
    plays: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_relative_urls_and_blank_keys() {
        assert!(PlayRecordConfig::new("not a url", None).is_err());

        let config =
            PlayRecordConfig::new(" https://records.example.com/api/ ", Some("  ".into())).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(
            config.endpoint("plays/1"),
            "https://records.example.com/api/plays/1"
        );
    }

    #[test]
    fn record_body_reads_camel_case_fields() {
        let body: RecordBody =
            serde_json::from_str(r#"{"activityId":7,"score":120,"completed":true,"durationSecs":30}"#)
                .unwrap();
        assert_eq!(body.activity_id, ActivityId::new(7));
        assert_eq!(body.score, Some(120));
        assert!(body.completed);
        assert_eq!(body.duration_secs, Some(30));
    }

    #[tokio::test]
    async fn unreachable_backend_surfaces_as_connection_error() {
        let recorder =
            HttpPlayRecorder::new(PlayRecordConfig::new("http://127.0.0.1:9", None).unwrap());
        let err = recorder
            .record_play_start(ActivityId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }
}

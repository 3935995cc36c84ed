//! HTTP client for the course backend

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::models::{
    Ack, DocumentProgressUpdate, Envelope, ErrorBody, QuizAvailability, QuizSession,
    ResumePosition, WatchUpdate,
};
use crate::config::Config;
use crate::content::RawUnit;
use crate::progression::{ProgressionStatus, UnitReview};

/// Course backend client
pub struct ApiClient {
    /// HTTP client
    client: Client,
    /// Base URL, without trailing slash
    base_url: String,
    /// Bearer token for authentication
    token: Option<String>,
}

impl ApiClient {
    /// Upper bound for the blocking teardown write
    const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a new client for `base_url`
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url, token })
    }

    /// Create a client from the application configuration
    pub fn from_config(config: &Config, token: Option<String>) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, token, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn token(&self) -> Result<&str, ApiError> {
        self.token.as_deref().ok_or_else(|| ApiError::Auth("no bearer token configured".into()))
    }

    /// Fetch the units of a course with their content and quiz pools
    pub async fn course_units(&self, course_id: &str) -> Result<Vec<RawUnit>, ApiError> {
        self.get(&format!("courses/{course_id}/units"), &[]).await
    }

    /// Fetch units that gained content after the student completed them
    pub async fn units_needing_review(&self, course_id: &str) -> Result<Vec<UnitReview>, ApiError> {
        self.get("units-needing-review", &[("courseId", course_id)]).await
    }

    /// Fetch the server's view of whether progression is blocked
    pub async fn progression_status(&self, course_id: &str) -> Result<ProgressionStatus, ApiError> {
        self.get("progression-status", &[("courseId", course_id)]).await
    }

    /// Record a watch-progress update
    pub async fn post_watch(&self, video_id: &str, update: &WatchUpdate) -> Result<Ack, ApiError> {
        self.post(&format!("video/{video_id}/watch"), update).await
    }

    /// Record a document reading update
    pub async fn post_document_progress(
        &self,
        document_id: &str,
        update: &DocumentProgressUpdate,
    ) -> Result<Ack, ApiError> {
        self.post(&format!("document/{document_id}/progress"), update).await
    }

    /// Fetch the saved playback position of a video
    pub async fn resume_position(&self, video_id: &str) -> Result<ResumePosition, ApiError> {
        self.get(&format!("video/{video_id}/resume-position"), &[]).await
    }

    /// Ask the backend to generate a quiz for a unit
    pub async fn generate_quiz(&self, unit_id: &str) -> Result<QuizSession, ApiError> {
        self.post(&format!("unit/{unit_id}/quiz/generate"), &serde_json::json!({})).await
    }

    /// Check whether a unit's quiz can be taken
    pub async fn quiz_availability(&self, unit_id: &str) -> Result<QuizAvailability, ApiError> {
        self.get(&format!("unit/{unit_id}/quiz/availability"), &[]).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let token = self.token()?;
        let response =
            self.client.get(self.url(path)).bearer_auth(token).query(query).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.into_inner())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        let token = self.token()?;
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(T::default());
        }

        let envelope: Envelope<T> = serde_json::from_str(&text)?;
        Ok(envelope.into_inner())
    }

    /// POST that blocks the calling thread until the backend answers.
    ///
    /// Used while the page is being torn down, when an async round trip may
    /// never complete. reqwest's blocking client cannot run inside an async
    /// runtime, so the request runs on a scoped thread.
    pub fn post_blocking<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let token = self.token()?.to_string();
        let url = self.url(path);
        let body = serde_json::to_vec(body)?;

        std::thread::scope(|scope| {
            let handle = scope.spawn(move || -> Result<(), ApiError> {
                let client =
                    reqwest::blocking::Client::builder().timeout(Self::TEARDOWN_TIMEOUT).build()?;
                let response = client
                    .post(&url)
                    .bearer_auth(&token)
                    .header("content-type", "application/json")
                    .body(body)
                    .send()?;

                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    let text = response.text().unwrap_or_default();
                    Err(status_error(status, &text))
                }
            });

            match handle.join() {
                Ok(result) => result,
                Err(_) => Err(ApiError::Blocking("delivery thread panicked".into())),
            }
        })
    }
}

/// Map a non-success status to the error taxonomy
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();
    let message = if parsed.message.is_empty() {
        body.trim().to_string()
    } else {
        parsed.message
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Auth(message),
        StatusCode::CONFLICT | StatusCode::LOCKED => {
            ApiError::ProgressionConflict { blocking_unit: parsed.blocking_unit_id, message }
        }
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => ApiError::Validation(message),
        _ => ApiError::Api { status: status.as_u16(), message },
    }
}

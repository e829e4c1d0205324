//! HTTP report repository backed by reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use tracing::debug;

use super::repository::{CreateAnnouncementRequest, CreatedAnnouncement, ReportRepository};
use crate::api::error::ApiError;
use crate::config::ApiConfig;
use crate::photos::PhotoAttachmentMetadata;

const PROVIDER_NAME: &str = "petspot";
const ANNOUNCEMENTS_PATH: &str = "/api/v1/announcements";

/// Report repository talking to the announcements REST API
pub struct HttpReportRepository {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReportRepository {
    /// Create a repository from the API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn announcements_url(&self) -> String {
        format!("{}{}", self.base_url, ANNOUNCEMENTS_PATH)
    }

    fn photos_url(&self, announcement_id: &str) -> String {
        format!(
            "{}{}/{}/photos",
            self.base_url, ANNOUNCEMENTS_PATH, announcement_id
        )
    }

    /// Turn a non-success response into the matching error
    async fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status().as_u16();
        if (200..=299).contains(&status) {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, retry_after, body))
    }
}

/// Map an unsuccessful HTTP status to an [`ApiError`]
pub(crate) fn status_error(status: u16, retry_after: Option<u64>, body: String) -> ApiError {
    match status {
        401 => ApiError::unauthorized(PROVIDER_NAME),
        403 => ApiError::forbidden(PROVIDER_NAME),
        404 => ApiError::not_found(PROVIDER_NAME),
        429 => ApiError::rate_limited(PROVIDER_NAME, retry_after),
        status => ApiError::http(PROVIDER_NAME, status, body),
    }
}

#[async_trait]
impl ReportRepository for HttpReportRepository {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn create_announcement(
        &self,
        request: &CreateAnnouncementRequest,
    ) -> Result<CreatedAnnouncement, ApiError> {
        let url = self.announcements_url();
        debug!(%url, status = %request.status, "creating announcement");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;
        let response = Self::check_status(response).await?;

        response
            .json::<CreatedAnnouncement>()
            .await
            .map_err(|e| ApiError::decoding(PROVIDER_NAME, e.to_string()))
    }

    async fn upload_photo(
        &self,
        announcement_id: &str,
        photo: &PhotoAttachmentMetadata,
        management_password: &str,
    ) -> Result<(), ApiError> {
        let bytes = tokio::fs::read(&photo.cached_location)
            .await
            .map_err(|e| {
                ApiError::local_file(
                    PROVIDER_NAME,
                    format!("{}: {}", photo.cached_location.display(), e),
                )
            })?;

        let part = Part::bytes(bytes)
            .file_name(photo.file_name.clone())
            .mime_str(&photo.media_type_identifier)
            .map_err(|e| ApiError::local_file(PROVIDER_NAME, e.to_string()))?;
        let form = Form::new().part("photo", part);

        let url = self.photos_url(announcement_id);
        debug!(%url, size = photo.file_size_bytes, "uploading photo");

        let response = self
            .client
            .post(&url)
            .basic_auth(announcement_id, Some(management_password))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }
}

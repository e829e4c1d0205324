//! Report Repository trait and its request/response types
//!
//! The repository is the backend collaborator of the submission: it creates
//! an announcement and then attaches the photo to it.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::photos::PhotoAttachmentMetadata;

/// Body of the create-announcement call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    pub species: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    /// `MALE` or `FEMALE`
    pub sex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    /// Date the pet went missing or was found
    pub last_seen_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_longitude: Option<f64>,
    pub email: String,
    pub phone: String,
    /// `MISSING` or `FOUND`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microchip_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
}

/// Phase 1 result: the new announcement and the credential that manages it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAnnouncement {
    pub id: String,
    pub management_password: String,
}

/// Trait for report backends
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Get the provider name (used in errors and logs)
    fn name(&self) -> &str;

    /// Create the announcement record
    async fn create_announcement(
        &self,
        request: &CreateAnnouncementRequest,
    ) -> Result<CreatedAnnouncement, ApiError>;

    /// Attach the cached photo to an existing announcement
    async fn upload_photo(
        &self,
        announcement_id: &str,
        photo: &PhotoAttachmentMetadata,
        management_password: &str,
    ) -> Result<(), ApiError>;
}

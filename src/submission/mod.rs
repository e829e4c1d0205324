//! Two-phase report submission
//!
//! Phase 1 creates the announcement and yields its management credential.
//! Phase 2 uploads the cached photo with that credential. The phases run
//! strictly in order and phase 2 never starts unless phase 1 succeeded. A
//! phase 2 failure leaves an announcement without a photo on the backend;
//! nothing is rolled back and the credential is handed back to the caller so
//! it can retry the upload alone.

pub mod cancel;
pub mod payload;

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{ApiError, CreatedAnnouncement, ReportRepository};
use crate::config::SubmissionConfig;
use crate::flow::FlowState;
use crate::photos::PhotoAttachmentMetadata;
use crate::validation::ValidationResult;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use payload::build_request;

/// What a successful submission hands back for the summary screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub announcement_id: String,
    pub management_password: String,
}

/// Why phase 2 did not complete
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    #[error(transparent)]
    Api(ApiError),

    #[error("upload cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("a photo must be attached before submitting")]
    MissingPhoto,

    #[error("the report is not valid ({0})")]
    InvalidReport(ValidationResult),

    #[error("could not create the announcement: {0}")]
    Create(ApiError),

    #[error("submission cancelled before the announcement was created")]
    Cancelled,

    /// The announcement exists on the backend without its photo
    #[error("announcement {} was created but its photo was not uploaded: {reason}", .created.id)]
    Upload {
        created: CreatedAnnouncement,
        reason: UploadFailure,
    },
}

impl SubmissionError {
    /// Credential of an announcement left without its photo
    pub fn partial_announcement(&self) -> Option<&CreatedAnnouncement> {
        match self {
            SubmissionError::Upload { created, .. } => Some(created),
            _ => None,
        }
    }

    /// Whether pressing retry with the same data may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmissionError::Create(e) => e.is_retryable(),
            SubmissionError::Upload {
                reason: UploadFailure::Api(e),
                ..
            } => e.is_retryable(),
            SubmissionError::Upload {
                reason: UploadFailure::Cancelled,
                ..
            } => true,
            SubmissionError::Cancelled => true,
            SubmissionError::MissingPhoto | SubmissionError::InvalidReport(_) => false,
        }
    }

    /// Backend error behind a failed phase, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            SubmissionError::Create(e)
            | SubmissionError::Upload {
                reason: UploadFailure::Api(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

/// Backoff for automatic photo upload retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            min_delay,
            max_delay,
        }
    }

    /// Fail on the first error
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn from_config(config: &SubmissionConfig) -> Self {
        Self {
            max_retries: config.upload_retries,
            min_delay: Duration::from_millis(config.retry_min_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Runs the create-then-upload protocol against a [`ReportRepository`]
pub struct SubmissionOrchestrator {
    repository: Arc<dyn ReportRepository>,
    retry: RetryPolicy,
}

impl SubmissionOrchestrator {
    pub fn new(repository: Arc<dyn ReportRepository>) -> Self {
        Self::with_retry(repository, RetryPolicy::default())
    }

    pub fn with_retry(repository: Arc<dyn ReportRepository>, retry: RetryPolicy) -> Self {
        Self { repository, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Submit a completed flow: create the announcement, then upload its photo
    ///
    /// Fails before any network call when the photo is missing or the report
    /// does not validate. The create call is never retried automatically.
    #[instrument(skip_all, fields(status = state.kind.status()))]
    pub async fn submit(
        &self,
        state: &FlowState,
        photo: Option<&PhotoAttachmentMetadata>,
        cancel: &CancelSignal,
    ) -> Result<SubmissionResult, SubmissionError> {
        let photo = match (state.photo_attachment, photo) {
            (Some(id), Some(photo)) if photo.id == id => photo,
            _ => return Err(SubmissionError::MissingPhoto),
        };
        let request = build_request(state).map_err(SubmissionError::InvalidReport)?;

        info!(provider = self.repository.name(), "creating announcement");
        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("submission cancelled before the announcement was created");
                return Err(SubmissionError::Cancelled);
            }
            result = self.repository.create_announcement(&request) => {
                result.map_err(|e| {
                    warn!(error = %e, "announcement creation failed");
                    SubmissionError::Create(e)
                })?
            }
        };
        info!(announcement_id = %created.id, "announcement created");

        self.upload_photo(&created, photo, cancel).await
    }

    /// Phase 2 alone: attach the photo to an already created announcement
    ///
    /// Transient failures are retried with backoff; anything else, including
    /// cancellation, comes back as [`SubmissionError::Upload`].
    #[instrument(skip_all, fields(announcement_id = %created.id))]
    pub async fn upload_photo(
        &self,
        created: &CreatedAnnouncement,
        photo: &PhotoAttachmentMetadata,
        cancel: &CancelSignal,
    ) -> Result<SubmissionResult, SubmissionError> {
        let repository = self.repository.as_ref();
        let op = move || async move {
            repository
                .upload_photo(&created.id, photo, &created.management_password)
                .await
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadFailure::Cancelled),
            result = op
                .retry(self.retry.backoff())
                .when(ApiError::is_retryable)
                .adjust(retry_delay)
                .notify(|err, dur| {
                    warn!("Retrying photo upload after {:?}: {}", dur, err);
                }) => result.map_err(UploadFailure::Api),
        };

        match outcome {
            Ok(()) => {
                info!(photo_id = %photo.id, "photo uploaded");
                Ok(SubmissionResult {
                    announcement_id: created.id.clone(),
                    management_password: created.management_password.clone(),
                })
            }
            Err(reason) => {
                warn!(%reason, "announcement exists without its photo");
                Err(SubmissionError::Upload {
                    created: created.clone(),
                    reason,
                })
            }
        }
    }
}

/// Delay before the next upload attempt
///
/// A server-provided Retry-After replaces the backoff step. `None` means the
/// retries are used up and stays `None`.
fn retry_delay(err: &ApiError, backoff: Option<Duration>) -> Option<Duration> {
    backoff.map(|delay| err.retry_after().map(Duration::from_secs).unwrap_or(delay))
}

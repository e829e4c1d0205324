//! In-memory report repository for tests and dry runs

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::repository::{CreateAnnouncementRequest, CreatedAnnouncement, ReportRepository};
use crate::api::error::ApiError;
use crate::photos::PhotoAttachmentMetadata;

const MOCK_PROVIDER: &str = "mock";

/// A recorded repository call
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Create(CreateAnnouncementRequest),
    Upload {
        announcement_id: String,
        photo_id: uuid::Uuid,
        management_password: String,
    },
}

/// Mock repository with scripted results
///
/// Queued results are consumed in order; once a queue is empty every call
/// succeeds (`abc` / `654321` for creates).
#[derive(Clone)]
pub struct MockReportRepository {
    create_results: Arc<Mutex<VecDeque<Result<CreatedAnnouncement, ApiError>>>>,
    upload_results: Arc<Mutex<VecDeque<Result<(), ApiError>>>>,
    /// Delay applied before each upload completes
    pub upload_delay: Arc<Mutex<Option<Duration>>>,
    /// Record of calls made
    pub call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockReportRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReportRepository {
    pub fn new() -> Self {
        Self {
            create_results: Arc::new(Mutex::new(VecDeque::new())),
            upload_results: Arc::new(Mutex::new(VecDeque::new())),
            upload_delay: Arc::new(Mutex::new(None)),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue the result of the next create call
    pub fn push_create_result(&self, result: Result<CreatedAnnouncement, ApiError>) {
        self.create_results.lock().unwrap().push_back(result);
    }

    /// Queue the result of the next upload call
    pub fn push_upload_result(&self, result: Result<(), ApiError>) {
        self.upload_results.lock().unwrap().push_back(result);
    }

    /// Make every upload take `delay` (for cancellation tests)
    pub fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Create(_)))
            .count()
    }

    pub fn upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Upload { .. }))
            .count()
    }

    /// The last create request body, if any
    pub fn last_request(&self) -> Option<CreateAnnouncementRequest> {
        self.calls().into_iter().rev().find_map(|c| match c {
            MockCall::Create(request) => Some(request),
            _ => None,
        })
    }

    pub fn default_announcement() -> CreatedAnnouncement {
        CreatedAnnouncement {
            id: "abc".to_string(),
            management_password: "654321".to_string(),
        }
    }
}

#[async_trait]
impl ReportRepository for MockReportRepository {
    fn name(&self) -> &str {
        MOCK_PROVIDER
    }

    async fn create_announcement(
        &self,
        request: &CreateAnnouncementRequest,
    ) -> Result<CreatedAnnouncement, ApiError> {
        self.call_log
            .lock()
            .unwrap()
            .push(MockCall::Create(request.clone()));
        self.create_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::default_announcement()))
    }

    async fn upload_photo(
        &self,
        announcement_id: &str,
        photo: &PhotoAttachmentMetadata,
        management_password: &str,
    ) -> Result<(), ApiError> {
        self.call_log.lock().unwrap().push(MockCall::Upload {
            announcement_id: announcement_id.to_string(),
            photo_id: photo.id,
            management_password: management_password.to_string(),
        });

        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.upload_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

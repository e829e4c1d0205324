//! One report from first screen to summary
//!
//! [`ReportSession`] is the caller of the submission: it remembers an
//! announcement that was created without its photo so that a retry only
//! re-runs the upload instead of creating a duplicate.

use thiserror::Error;
use tracing::{info, warn};

use crate::api::CreatedAnnouncement;
use crate::flow::{FlowError, FlowSessionStore, FlowUpdate};
use crate::location::{LocationPermissionHandler, LocationRequestResult};
use crate::submission::{
    CancelSignal, SubmissionError, SubmissionOrchestrator, SubmissionResult,
};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

pub struct ReportSession {
    store: FlowSessionStore,
    orchestrator: SubmissionOrchestrator,
    /// Store generation the announcement was created for, and the announcement
    pending: Option<(u64, CreatedAnnouncement)>,
}

impl ReportSession {
    pub fn new(store: FlowSessionStore, orchestrator: SubmissionOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
            pending: None,
        }
    }

    pub fn store(&self) -> &FlowSessionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FlowSessionStore {
        &mut self.store
    }

    /// Announcement created by an earlier attempt whose photo upload failed
    ///
    /// Forgotten once the store is cleared, however that happens.
    pub fn pending_announcement(&self) -> Option<&CreatedAnnouncement> {
        self.pending
            .as_ref()
            .filter(|(generation, _)| *generation == self.store.generation())
            .map(|(_, created)| created)
    }

    /// Continue from the last data step and submit the report
    ///
    /// After a partial failure only the photo upload is retried. On success
    /// the flow moves to `Completed` with the management password recorded.
    pub async fn submit(&mut self, cancel: &CancelSignal) -> Result<SubmissionResult, SessionError> {
        if let Some(created) = self.pending_announcement().cloned() {
            info!(announcement_id = %created.id, "retrying photo upload only");
            let photo = self
                .store
                .photo()
                .cloned()
                .ok_or(SubmissionError::MissingPhoto)?;
            let result = self
                .orchestrator
                .upload_photo(&created, &photo, cancel)
                .await;
            return self.settle(result);
        }

        self.pending = None;
        let last = self.store.kind().last_data_step();
        self.store.advance(last)?;

        let result = self
            .orchestrator
            .submit(self.store.state(), self.store.photo(), cancel)
            .await;
        self.settle(result)
    }

    fn settle(
        &mut self,
        result: Result<SubmissionResult, SubmissionError>,
    ) -> Result<SubmissionResult, SessionError> {
        match result {
            Ok(submitted) => {
                self.pending = None;
                self.store
                    .mark_submitted(submitted.management_password.clone());
                info!(announcement_id = %submitted.announcement_id, "report submitted");
                Ok(submitted)
            }
            Err(e) => {
                if let Some(created) = e.partial_announcement() {
                    self.pending = Some((self.store.generation(), created.clone()));
                }
                Err(e.into())
            }
        }
    }

    /// Clear the flow once the summary has been shown
    pub fn finish(&mut self) {
        self.pending = None;
        self.store.clear();
    }

    /// Abandon the report
    pub fn cancel(&mut self) {
        if let Some(created) = self.pending_announcement() {
            warn!(announcement_id = %created.id, "abandoning announcement without a photo");
        }
        self.pending = None;
        self.store.clear();
    }

    /// Fill the coordinates from the device location, if one is available
    pub async fn capture_location(
        &mut self,
        handler: &LocationPermissionHandler,
    ) -> Result<LocationRequestResult, SessionError> {
        let result = handler.request_location_with_permissions().await;
        if let Some(coordinate) = result.location {
            self.store.update(FlowUpdate::default().coordinates(
                format!("{:.6}", coordinate.latitude),
                format!("{:.6}", coordinate.longitude),
            ))?;
        }
        Ok(result)
    }
}

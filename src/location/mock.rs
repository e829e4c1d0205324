//! Scriptable location service

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Coordinate, LocationService, PermissionStatus};

/// Mock location service for tests and the CLI
///
/// The prompt answers with `prompt_response` and makes it the new status.
/// Fetches succeed only while authorized.
#[derive(Clone)]
pub struct MockLocationService {
    pub status: Arc<Mutex<PermissionStatus>>,
    pub prompt_response: Arc<Mutex<PermissionStatus>>,
    pub location: Arc<Mutex<Option<Coordinate>>>,
    /// Number of prompts shown
    pub prompts: Arc<Mutex<usize>>,
    /// Timeout passed to each fetch
    pub fetches: Arc<Mutex<Vec<Duration>>>,
}

impl MockLocationService {
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            status: Arc::new(Mutex::new(status)),
            prompt_response: Arc::new(Mutex::new(PermissionStatus::Authorized)),
            location: Arc::new(Mutex::new(None)),
            prompts: Arc::new(Mutex::new(0)),
            fetches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Authorized, always at `coordinate`
    pub fn authorized_at(coordinate: Coordinate) -> Self {
        let mock = Self::new(PermissionStatus::Authorized);
        mock.set_location(Some(coordinate));
        mock
    }

    /// Simulate a change made in system settings
    pub fn set_status(&self, status: PermissionStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_prompt_response(&self, status: PermissionStatus) {
        *self.prompt_response.lock().unwrap() = status;
    }

    pub fn set_location(&self, location: Option<Coordinate>) {
        *self.location.lock().unwrap() = location;
    }

    pub fn prompt_count(&self) -> usize {
        *self.prompts.lock().unwrap()
    }

    pub fn fetch_timeouts(&self) -> Vec<Duration> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocationService for MockLocationService {
    fn authorization_status(&self) -> PermissionStatus {
        *self.status.lock().unwrap()
    }

    async fn request_when_in_use_authorization(&self) -> PermissionStatus {
        *self.prompts.lock().unwrap() += 1;
        let response = *self.prompt_response.lock().unwrap();
        *self.status.lock().unwrap() = response;
        response
    }

    async fn request_location(&self, timeout: Duration) -> Option<Coordinate> {
        self.fetches.lock().unwrap().push(timeout);
        if self.authorization_status().is_authorized() {
            *self.location.lock().unwrap()
        } else {
            None
        }
    }
}

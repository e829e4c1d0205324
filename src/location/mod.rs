//! Location permission state and best-effort location fetches
//!
//! The handler wraps a platform [`LocationService`]. It asks for permission
//! when none has been decided yet, fetches a coordinate only when
//! authorized, and tells observers when the settled permission changes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod mock;

pub use mock::MockLocationService;

/// Location permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    NotDetermined,
    /// A system prompt is outstanding
    Requesting,
    Authorized,
    Denied,
    Restricted,
}

impl PermissionStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, PermissionStatus::Authorized)
    }

    /// Only denial and restriction need the user to visit system settings
    pub fn needs_settings_prompt(&self) -> bool {
        matches!(self, PermissionStatus::Denied | PermissionStatus::Restricted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Platform location provider
#[async_trait]
pub trait LocationService: Send + Sync {
    fn authorization_status(&self) -> PermissionStatus;

    /// Show the system permission prompt and wait for the answer
    async fn request_when_in_use_authorization(&self) -> PermissionStatus;

    /// Fetch the current position, giving up after `timeout`
    async fn request_location(&self, timeout: Duration) -> Option<Coordinate>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationRequestResult {
    pub location: Option<Coordinate>,
    pub status: PermissionStatus,
}

/// Handle returned by [`LocationPermissionHandler::observe_status_changes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Called with `(status, did_become_authorized)`
pub type StatusCallback = Arc<dyn Fn(PermissionStatus, bool) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct StatusState {
    current: PermissionStatus,
    settled: PermissionStatus,
}

pub struct LocationPermissionHandler {
    service: Arc<dyn LocationService>,
    fetch_timeout: Duration,
    status: Mutex<StatusState>,
    observers: Mutex<Vec<(ObserverId, StatusCallback)>>,
    next_observer: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocationPermissionHandler {
    pub fn new(service: Arc<dyn LocationService>, fetch_timeout: Duration) -> Self {
        let initial = service.authorization_status();
        Self {
            service,
            fetch_timeout,
            status: Mutex::new(StatusState {
                current: initial,
                settled: initial,
            }),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
        }
    }

    /// Current status, `Requesting` while a prompt is outstanding
    pub fn status(&self) -> PermissionStatus {
        lock(&self.status).current
    }

    pub fn needs_settings_prompt(&self) -> bool {
        self.status().needs_settings_prompt()
    }

    /// Ask for permission if undecided, then fetch a location if authorized
    pub async fn request_location_with_permissions(&self) -> LocationRequestResult {
        let mut status = self.service.authorization_status();
        if status == PermissionStatus::NotDetermined {
            self.handle_authorization_change(PermissionStatus::Requesting);
            debug!("requesting location permission");
            status = self.service.request_when_in_use_authorization().await;
        }
        self.handle_authorization_change(status);

        let location = if status.is_authorized() {
            self.service.request_location(self.fetch_timeout).await
        } else {
            None
        };
        debug!(status = ?status, found = location.is_some(), "location request finished");

        LocationRequestResult { location, status }
    }

    pub fn observe_status_changes(
        &self,
        callback: impl Fn(PermissionStatus, bool) + Send + Sync + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        let callback: StatusCallback = Arc::new(callback);
        lock(&self.observers).push((id, callback));
        id
    }

    /// Returns whether the observer was registered
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.len();
        observers.retain(|(observer, _)| *observer != id);
        observers.len() != before
    }

    /// Record a status from a live prompt response
    ///
    /// Observers hear about it only when the settled status changed.
    pub fn handle_authorization_change(&self, status: PermissionStatus) {
        let change = {
            let mut state = lock(&self.status);
            state.current = status;
            if status == PermissionStatus::Requesting || state.settled == status {
                None
            } else {
                let became_authorized = status.is_authorized() && !state.settled.is_authorized();
                state.settled = status;
                Some(became_authorized)
            }
        };

        if let Some(became_authorized) = change {
            debug!(status = ?status, became_authorized, "location permission changed");
            let callbacks: Vec<StatusCallback> = lock(&self.observers)
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            for callback in callbacks {
                callback(status, became_authorized);
            }
        }
    }

    /// Re-read the platform status, catching changes made in system settings
    pub fn refresh_on_foreground(&self) -> PermissionStatus {
        let status = self.service.authorization_status();
        self.handle_authorization_change(status);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Events = Arc<Mutex<Vec<(PermissionStatus, bool)>>>;

    fn handler(service: &MockLocationService) -> LocationPermissionHandler {
        LocationPermissionHandler::new(Arc::new(service.clone()), Duration::from_secs(10))
    }

    fn record(handler: &LocationPermissionHandler) -> (ObserverId, Events) {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let id = handler.observe_status_changes(move |status, became| {
            sink.lock().unwrap().push((status, became));
        });
        (id, events)
    }

    fn warsaw() -> Coordinate {
        Coordinate {
            latitude: 52.2297,
            longitude: 21.0122,
        }
    }

    #[tokio::test]
    async fn test_not_determined_prompts_then_fetches() {
        let service = MockLocationService::new(PermissionStatus::NotDetermined);
        service.set_prompt_response(PermissionStatus::Authorized);
        service.set_location(Some(warsaw()));
        let handler = handler(&service);
        let (_, events) = record(&handler);

        let result = handler.request_location_with_permissions().await;

        assert_eq!(result.status, PermissionStatus::Authorized);
        assert_eq!(result.location, Some(warsaw()));
        assert_eq!(service.prompt_count(), 1);
        assert_eq!(service.fetch_timeouts(), vec![Duration::from_secs(10)]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(PermissionStatus::Authorized, true)]
        );
    }

    #[tokio::test]
    async fn test_prompt_denied_skips_fetch() {
        let service = MockLocationService::new(PermissionStatus::NotDetermined);
        service.set_prompt_response(PermissionStatus::Denied);
        service.set_location(Some(warsaw()));
        let handler = handler(&service);

        let result = handler.request_location_with_permissions().await;

        assert_eq!(result.status, PermissionStatus::Denied);
        assert!(result.location.is_none());
        assert!(service.fetch_timeouts().is_empty());
        assert!(handler.needs_settings_prompt());
    }

    #[tokio::test]
    async fn test_denied_does_not_prompt_again() {
        let service = MockLocationService::new(PermissionStatus::Restricted);
        let handler = handler(&service);
        let (_, events) = record(&handler);

        let result = handler.request_location_with_permissions().await;

        assert_eq!(result.status, PermissionStatus::Restricted);
        assert_eq!(service.prompt_count(), 0);
        assert!(events.lock().unwrap().is_empty());
        assert!(handler.needs_settings_prompt());
    }

    #[tokio::test]
    async fn test_authorized_fetch_may_find_nothing() {
        let service = MockLocationService::new(PermissionStatus::Authorized);
        let handler = handler(&service);

        let result = handler.request_location_with_permissions().await;
        assert_eq!(result.status, PermissionStatus::Authorized);
        assert!(result.location.is_none());
        assert!(!handler.needs_settings_prompt());
    }

    #[test]
    fn test_requesting_is_transient_and_silent() {
        let service = MockLocationService::new(PermissionStatus::NotDetermined);
        let handler = handler(&service);
        let (_, events) = record(&handler);

        handler.handle_authorization_change(PermissionStatus::Requesting);
        assert_eq!(handler.status(), PermissionStatus::Requesting);
        assert!(!handler.needs_settings_prompt());
        assert!(events.lock().unwrap().is_empty());

        handler.handle_authorization_change(PermissionStatus::Denied);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(PermissionStatus::Denied, false)]
        );
    }

    #[test]
    fn test_foreground_refresh_picks_up_settings_change() {
        let service = MockLocationService::new(PermissionStatus::Denied);
        let handler = handler(&service);
        let (_, events) = record(&handler);

        assert_eq!(handler.refresh_on_foreground(), PermissionStatus::Denied);
        assert!(events.lock().unwrap().is_empty());

        service.set_status(PermissionStatus::Authorized);
        handler.refresh_on_foreground();
        handler.refresh_on_foreground();

        assert_eq!(
            *events.lock().unwrap(),
            vec![(PermissionStatus::Authorized, true)]
        );
        assert_eq!(handler.status(), PermissionStatus::Authorized);
    }

    #[test]
    fn test_remove_observer() {
        let service = MockLocationService::new(PermissionStatus::NotDetermined);
        let handler = handler(&service);
        let (id, events) = record(&handler);

        assert!(handler.remove_observer(id));
        assert!(!handler.remove_observer(id));

        handler.handle_authorization_change(PermissionStatus::Authorized);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_settings_prompt_only_for_denied_or_restricted() {
        assert!(PermissionStatus::Denied.needs_settings_prompt());
        assert!(PermissionStatus::Restricted.needs_settings_prompt());
        assert!(!PermissionStatus::NotDetermined.needs_settings_prompt());
        assert!(!PermissionStatus::Requesting.needs_settings_prompt());
        assert!(!PermissionStatus::Authorized.needs_settings_prompt());
    }
}

//! Report backend integration
//!
//! This module provides:
//! - The [`ReportRepository`] trait used by the submission
//! - An HTTP implementation for the announcements API
//! - An in-memory mock with scripted results
//! - Error handling with retry classification

pub mod error;
pub mod http;
pub mod mock;
pub mod repository;

pub use error::ApiError;
pub use http::HttpReportRepository;
pub use mock::{MockCall, MockReportRepository};
pub use repository::{CreateAnnouncementRequest, CreatedAnnouncement, ReportRepository};

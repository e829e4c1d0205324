//! Petflow - report missing and found pets
//!
//! The crate is the core behind the "report a pet" screens: a step-by-step
//! form state machine with per-step validation, a local cache for the
//! attached photo, a two-phase submission to the announcements backend and
//! location permission handling. Rendering layers drive it through
//! [`report::ReportSession`] and observe [`flow::FlowSnapshot`]s.

pub mod api;
pub mod config;
pub mod draft;
pub mod flow;
pub mod location;
pub mod logging;
pub mod photos;
pub mod report;
pub mod submission;
pub mod validation;

pub use flow::{FlowKind, FlowSessionStore, FlowStep};
pub use report::{ReportSession, SessionError};
pub use submission::{SubmissionOrchestrator, SubmissionResult};

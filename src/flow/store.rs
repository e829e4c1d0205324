//! Session state machine for one report
//!
//! The store exclusively owns the [`FlowState`] and the photo cache for the
//! flow's lifetime. Every mutation publishes a [`FlowSnapshot`] on a watch
//! channel; failed Continue presses also emit a [`FlowNotice::Toast`].

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::types::{
    AdvanceOutcome, FlowKind, FlowNotice, FlowSnapshot, FlowState, FlowStep, FlowUpdate,
    RetreatOutcome,
};
use crate::photos::{PhotoAttachmentCache, PhotoAttachmentMetadata, PhotoError, PhotoSource};
use crate::validation::{validate_step, Field, ValidationResult};

const NOTICE_CAPACITY: usize = 16;

/// Errors returned by store transitions
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("the report has already been submitted")]
    Completed,

    #[error("cannot continue from {requested:?}: the flow is on {current:?}")]
    StepMismatch {
        requested: FlowStep,
        current: FlowStep,
    },

    #[error("please correct the highlighted fields ({0})")]
    Validation(ValidationResult),

    #[error(transparent)]
    Photo(#[from] PhotoError),
}

/// Owns the accumulated form data and the current step pointer
pub struct FlowSessionStore {
    state: FlowState,
    errors: ValidationResult,
    photos: PhotoAttachmentCache,
    snapshots: watch::Sender<FlowSnapshot>,
    notices: broadcast::Sender<FlowNotice>,
    generation: u64,
}

impl FlowSessionStore {
    /// Start a new session of `kind`, caching photos in `photos`
    pub fn new(kind: FlowKind, photos: PhotoAttachmentCache) -> Self {
        let state = FlowState::new(kind);
        let (snapshots, _) = watch::channel(FlowSnapshot {
            state: state.clone(),
            errors: ValidationResult::new(),
            photo: None,
        });
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        debug!(kind = ?kind, "report flow started");
        Self {
            state,
            errors: ValidationResult::new(),
            photos,
            snapshots,
            notices,
            generation: 0,
        }
    }

    // ─── Read Access ────────────────────────────────────────────────────────

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn current_step(&self) -> FlowStep {
        self.state.current_step
    }

    pub fn kind(&self) -> FlowKind {
        self.state.kind
    }

    /// Inline errors from the last failed Continue (minus fields edited since)
    pub fn errors(&self) -> &ValidationResult {
        &self.errors
    }

    /// Bumped by every [`Self::clear`]; tells one report apart from the next
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Metadata of the attached photo
    pub fn photo(&self) -> Option<&PhotoAttachmentMetadata> {
        self.state
            .photo_attachment
            .and_then(|id| self.photos.get(id))
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            state: self.state.clone(),
            errors: self.errors.clone(),
            photo: self.photo().cloned(),
        }
    }

    /// Receive a snapshot after every mutation
    pub fn subscribe(&self) -> watch::Receiver<FlowSnapshot> {
        self.snapshots.subscribe()
    }

    /// Receive transient notices (toasts)
    pub fn notices(&self) -> broadcast::Receiver<FlowNotice> {
        self.notices.subscribe()
    }

    // ─── Transitions ────────────────────────────────────────────────────────

    /// Merge user input into the state without validating it
    ///
    /// Errors of the touched fields are dropped. Changing the species clears
    /// the breed (and its error) so it has to be picked again.
    pub fn update(&mut self, update: FlowUpdate) -> Result<(), FlowError> {
        self.ensure_open()?;
        if update.is_empty() {
            return Ok(());
        }

        let state = &mut self.state;
        let errors = &mut self.errors;

        if let Some(microchip) = update.microchip_number {
            state.microchip_number = microchip;
            errors.remove(Field::MicrochipNumber);
        }
        if let Some(species) = update.animal_species {
            if state.animal_species.as_deref() != Some(species.as_str()) {
                state.animal_breed = None;
                errors.remove(Field::AnimalBreed);
            }
            state.animal_species = Some(species).filter(|s| !s.trim().is_empty());
            errors.remove(Field::AnimalSpecies);
        }
        if let Some(breed) = update.animal_breed {
            state.animal_breed = Some(breed).filter(|b| !b.trim().is_empty());
            errors.remove(Field::AnimalBreed);
        }
        if let Some(gender) = update.animal_gender {
            state.animal_gender = Some(gender);
            errors.remove(Field::AnimalGender);
        }
        if let Some(age) = update.animal_age {
            state.animal_age = age;
            errors.remove(Field::AnimalAge);
        }
        if let Some(date) = update.event_date {
            state.event_date = date;
        }
        if let Some(latitude) = update.latitude {
            state.latitude = latitude;
            errors.remove(Field::Latitude);
        }
        if let Some(longitude) = update.longitude {
            state.longitude = longitude;
            errors.remove(Field::Longitude);
        }
        if let Some(description) = update.additional_description {
            state.additional_description = description;
            errors.remove(Field::AdditionalDescription);
        }
        if let Some(phone) = update.phone {
            state.contact.phone = phone;
            errors.remove(Field::Phone);
        }
        if let Some(email) = update.email {
            state.contact.email = email;
            errors.remove(Field::Email);
        }
        if let Some(reward) = update.reward_description {
            state.contact.reward_description = Some(reward).filter(|r| !r.trim().is_empty());
        }

        self.publish();
        Ok(())
    }

    /// Validate `from` and move one step forward
    ///
    /// `from` must be the current step. Leaving the last data step does not
    /// move the pointer: it reports [`AdvanceOutcome::ReadyToSubmit`] and the
    /// flow reaches `Completed` only through [`Self::mark_submitted`].
    pub fn advance(&mut self, from: FlowStep) -> Result<AdvanceOutcome, FlowError> {
        self.ensure_open()?;
        let current = self.state.current_step;
        if from != current {
            return Err(FlowError::StepMismatch {
                requested: from,
                current,
            });
        }

        let result = validate_step(from, &self.state);
        if !result.is_valid() {
            debug!(step = ?from, fields = ?result.fields(), "step validation failed");
            self.errors = result.clone();
            let message = result
                .first_message()
                .unwrap_or("Please correct the highlighted fields")
                .to_string();
            // No receivers is fine; toasts are fire-and-forget.
            let _ = self.notices.send(FlowNotice::Toast(message));
            self.publish();
            return Err(FlowError::Validation(result));
        }

        self.errors.clear();
        let outcome = match self.state.kind.next(from) {
            Some(FlowStep::Completed) | None => AdvanceOutcome::ReadyToSubmit,
            Some(next) => {
                self.state.current_step = next;
                debug!(from = ?from, to = ?next, "advanced");
                AdvanceOutcome::Moved(next)
            }
        };
        self.publish();
        Ok(outcome)
    }

    /// Move one step back without validating; later data is kept
    ///
    /// On the first step this backs out of the flow and clears the session.
    pub fn retreat(&mut self) -> Result<RetreatOutcome, FlowError> {
        self.ensure_open()?;
        match self.state.kind.previous(self.state.current_step) {
            Some(previous) => {
                debug!(from = ?self.state.current_step, to = ?previous, "retreated");
                self.state.current_step = previous;
                self.errors.clear();
                self.publish();
                Ok(RetreatOutcome::Moved(previous))
            }
            None => {
                self.clear();
                Ok(RetreatOutcome::Exited)
            }
        }
    }

    /// Reset to defaults and release any cached photo
    pub fn clear(&mut self) {
        let kind = self.state.kind;
        self.state = FlowState::new(kind);
        self.errors.clear();
        self.generation += 1;
        if let Err(e) = self.photos.clear_all() {
            warn!(error = %e, "failed to release cached photos");
        }
        debug!(kind = ?kind, "report flow cleared");
        self.publish();
    }

    /// Record a successful submission: terminal step plus the credential
    pub fn mark_submitted(&mut self, management_password: impl Into<String>) {
        self.state.management_password = Some(management_password.into());
        self.state.current_step = FlowStep::Completed;
        self.errors.clear();
        self.publish();
    }

    // ─── Photo ──────────────────────────────────────────────────────────────

    /// Cache a photo and reference it, replacing any earlier one
    pub fn attach_photo(
        &mut self,
        source: PhotoSource,
    ) -> Result<PhotoAttachmentMetadata, FlowError> {
        self.ensure_open()?;
        let metadata = self.photos.save(source)?;

        if let Some(previous) = self.state.photo_attachment.replace(metadata.id) {
            if let Err(e) = self.photos.remove(previous) {
                warn!(photo_id = %previous, error = %e, "failed to release replaced photo");
            }
        }
        self.errors.remove(Field::Photo);
        self.publish();
        Ok(metadata)
    }

    /// Drop the photo reference and release the cached file
    pub fn remove_photo(&mut self) -> Result<Option<PhotoAttachmentMetadata>, FlowError> {
        self.ensure_open()?;
        let Some(id) = self.state.photo_attachment.take() else {
            return Ok(None);
        };
        let removed = self.photos.remove(id);
        self.publish();
        Ok(Some(removed?))
    }

    fn ensure_open(&self) -> Result<(), FlowError> {
        if self.state.is_completed() {
            return Err(FlowError::Completed);
        }
        Ok(())
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

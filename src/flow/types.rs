//! Type definitions for the report flow

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::photos::PhotoAttachmentMetadata;
use crate::validation::ValidationResult;

/// Which report the user is filing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Owner reporting their own missing pet
    #[default]
    Missing,
    /// Finder reporting a pet they found
    Found,
}

impl FlowKind {
    /// Steps of this flow in order, ending with `Completed`
    pub fn steps(&self) -> &'static [FlowStep] {
        match self {
            FlowKind::Missing => &[
                FlowStep::Microchip,
                FlowStep::Photo,
                FlowStep::Description,
                FlowStep::Contact,
                FlowStep::Completed,
            ],
            FlowKind::Found => &[
                FlowStep::Photo,
                FlowStep::Description,
                FlowStep::Contact,
                FlowStep::Completed,
            ],
        }
    }

    pub fn first_step(&self) -> FlowStep {
        self.steps()[0]
    }

    /// Last step that collects data (the one submission is triggered from)
    pub fn last_data_step(&self) -> FlowStep {
        FlowStep::Contact
    }

    /// Step after `step`, or `None` for `Completed` and steps outside this flow
    pub fn next(&self, step: FlowStep) -> Option<FlowStep> {
        let steps = self.steps();
        let idx = steps.iter().position(|s| *s == step)?;
        steps.get(idx + 1).copied()
    }

    /// Step before `step`, or `None` on the first step
    pub fn previous(&self, step: FlowStep) -> Option<FlowStep> {
        let steps = self.steps();
        let idx = steps.iter().position(|s| *s == step)?;
        idx.checked_sub(1).map(|i| steps[i])
    }

    /// Announcement status sent to the backend
    pub fn status(&self) -> &'static str {
        match self {
            FlowKind::Missing => "MISSING",
            FlowKind::Found => "FOUND",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FlowKind::Missing => "Report missing pet",
            FlowKind::Found => "Report found pet",
        }
    }
}

/// One screen of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Microchip,
    Photo,
    Description,
    Contact,
    Completed,
}

impl FlowStep {
    pub fn title(&self) -> &'static str {
        match self {
            FlowStep::Microchip => "Microchip number",
            FlowStep::Photo => "Animal photo",
            FlowStep::Description => "Animal description",
            FlowStep::Contact => "Owner's details",
            FlowStep::Completed => "Summary",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowStep::Completed)
    }
}

/// Animal gender as picked on the description screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimalGender {
    Male,
    Female,
    Unknown,
}

impl AnimalGender {
    /// Wire value, `None` for `Unknown`
    pub fn api_value(&self) -> Option<&'static str> {
        match self {
            AnimalGender::Male => Some("MALE"),
            AnimalGender::Female => Some("FEMALE"),
            AnimalGender::Unknown => None,
        }
    }
}

/// How the reporter can be reached
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub phone: String,
    pub email: String,
    /// Absent rather than empty when the user leaves it blank
    pub reward_description: Option<String>,
}

/// Accumulated form data of one report session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pub kind: FlowKind,
    pub current_step: FlowStep,
    /// Raw microchip input
    pub microchip_number: String,
    /// Reference into the photo cache; the bytes live there
    pub photo_attachment: Option<Uuid>,
    pub animal_species: Option<String>,
    pub animal_breed: Option<String>,
    pub animal_gender: Option<AnimalGender>,
    /// Raw age input, parsed on validation
    pub animal_age: String,
    pub event_date: NaiveDate,
    /// Raw coordinate input, parsed on validation
    pub latitude: String,
    pub longitude: String,
    pub additional_description: String,
    pub contact: ContactDetails,
    /// Set only after a successful submission
    pub management_password: Option<String>,
}

impl FlowState {
    /// Fresh state positioned on the first step of `kind`
    pub fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            current_step: kind.first_step(),
            microchip_number: String::new(),
            photo_attachment: None,
            animal_species: None,
            animal_breed: None,
            animal_gender: None,
            animal_age: String::new(),
            event_date: Local::now().date_naive(),
            latitude: String::new(),
            longitude: String::new(),
            additional_description: String::new(),
            contact: ContactDetails::default(),
            management_password: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.current_step.is_terminal()
    }

    /// Zero-based position of the current step, for progress indicators
    pub fn step_index(&self) -> usize {
        self.kind
            .steps()
            .iter()
            .position(|s| *s == self.current_step)
            .unwrap_or(0)
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new(FlowKind::default())
    }
}

/// Partial field edit dispatched by a screen
///
/// Unset fields are left untouched when merged into the state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowUpdate {
    pub microchip_number: Option<String>,
    pub animal_species: Option<String>,
    pub animal_breed: Option<String>,
    pub animal_gender: Option<AnimalGender>,
    pub animal_age: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub additional_description: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// A blank value clears the reward
    pub reward_description: Option<String>,
}

impl FlowUpdate {
    pub fn microchip(mut self, value: impl Into<String>) -> Self {
        self.microchip_number = Some(value.into());
        self
    }

    pub fn species(mut self, value: impl Into<String>) -> Self {
        self.animal_species = Some(value.into());
        self
    }

    pub fn breed(mut self, value: impl Into<String>) -> Self {
        self.animal_breed = Some(value.into());
        self
    }

    pub fn gender(mut self, value: AnimalGender) -> Self {
        self.animal_gender = Some(value);
        self
    }

    pub fn age(mut self, value: impl Into<String>) -> Self {
        self.animal_age = Some(value.into());
        self
    }

    pub fn date(mut self, value: NaiveDate) -> Self {
        self.event_date = Some(value);
        self
    }

    pub fn coordinates(mut self, latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        self.latitude = Some(latitude.into());
        self.longitude = Some(longitude.into());
        self
    }

    pub fn description(mut self, value: impl Into<String>) -> Self {
        self.additional_description = Some(value.into());
        self
    }

    pub fn phone(mut self, value: impl Into<String>) -> Self {
        self.phone = Some(value.into());
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = Some(value.into());
        self
    }

    pub fn reward(mut self, value: impl Into<String>) -> Self {
        self.reward_description = Some(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == FlowUpdate::default()
    }
}

/// What the UI renders: state, inline errors and the cached photo
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSnapshot {
    pub state: FlowState,
    pub errors: ValidationResult,
    pub photo: Option<PhotoAttachmentMetadata>,
}

/// Transient messages for the UI (the toast/snackbar channel)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowNotice {
    Toast(String),
}

/// Result of a successful `advance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved forward to the given step
    Moved(FlowStep),
    /// The last data step validated; the report can be submitted
    ReadyToSubmit,
}

/// Result of a successful `retreat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetreatOutcome {
    /// Moved back to the given step
    Moved(FlowStep),
    /// Backed out of the first step; the session was cleared
    Exited,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_flow_sequence() {
        let kind = FlowKind::Missing;
        assert_eq!(kind.first_step(), FlowStep::Microchip);
        assert_eq!(kind.next(FlowStep::Microchip), Some(FlowStep::Photo));
        assert_eq!(kind.next(FlowStep::Contact), Some(FlowStep::Completed));
        assert_eq!(kind.next(FlowStep::Completed), None);
        assert_eq!(kind.previous(FlowStep::Microchip), None);
        assert_eq!(kind.previous(FlowStep::Description), Some(FlowStep::Photo));
    }

    #[test]
    fn test_found_flow_has_no_microchip_step() {
        let kind = FlowKind::Found;
        assert_eq!(kind.first_step(), FlowStep::Photo);
        assert_eq!(kind.next(FlowStep::Microchip), None);
        assert_eq!(kind.steps().len(), 4);
        assert_eq!(kind.status(), "FOUND");
    }

    #[test]
    fn test_unknown_gender_has_no_api_value() {
        assert_eq!(AnimalGender::Male.api_value(), Some("MALE"));
        assert_eq!(AnimalGender::Unknown.api_value(), None);
    }

    #[test]
    fn test_flow_update_builder() {
        let update = FlowUpdate::default().species("Dog").age("3");
        assert_eq!(update.animal_species.as_deref(), Some("Dog"));
        assert_eq!(update.animal_age.as_deref(), Some("3"));
        assert!(update.animal_breed.is_none());
        assert!(!update.is_empty());
        assert!(FlowUpdate::default().is_empty());
    }

    #[test]
    fn test_new_state_starts_on_first_step() {
        let state = FlowState::new(FlowKind::Found);
        assert_eq!(state.current_step, FlowStep::Photo);
        assert_eq!(state.step_index(), 0);
        assert!(!state.is_completed());
        assert!(state.management_password.is_none());
    }
}

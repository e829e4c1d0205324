//! One validator per flow step

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    microchip_digits, parse_age, parse_coordinate, phone_digits, Field, ValidationResult,
    DESCRIPTION_MAX_CHARS, MAX_ANIMAL_AGE, MICROCHIP_MAX_DIGITS, PHONE_MAX_DIGITS,
    PHONE_MIN_DIGITS,
};
use crate::flow::{AnimalGender, FlowKind, FlowState, FlowStep};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("email pattern is valid")
});

/// Run the validator that belongs to `step`
///
/// `Completed` has no fields and always passes. In the found flow the
/// microchip number is captured on the description screen, so it is checked
/// there.
pub fn validate_step(step: FlowStep, state: &FlowState) -> ValidationResult {
    match step {
        FlowStep::Microchip => validate_microchip(state),
        FlowStep::Photo => validate_photo(state),
        FlowStep::Description => {
            let mut result = validate_description(state);
            if state.kind == FlowKind::Found {
                result.merge(validate_microchip(state));
            }
            result
        }
        FlowStep::Contact => validate_contact(state),
        FlowStep::Completed => ValidationResult::new(),
    }
}

/// Run every data step validator of the flow kind, in order
pub fn validate_report(state: &FlowState) -> ValidationResult {
    let mut result = ValidationResult::new();
    for step in state.kind.steps() {
        result.merge(validate_step(*step, state));
    }
    result
}

/// Microchip is optional; when given, at most 15 digits once non-digits are stripped
pub fn validate_microchip(state: &FlowState) -> ValidationResult {
    let mut result = ValidationResult::new();
    if microchip_digits(&state.microchip_number).len() > MICROCHIP_MAX_DIGITS {
        result.insert(
            Field::MicrochipNumber,
            format!("Microchip number can have at most {MICROCHIP_MAX_DIGITS} digits"),
        );
    }
    result
}

/// A photo must be attached before leaving the photo step
pub fn validate_photo(state: &FlowState) -> ValidationResult {
    let mut result = ValidationResult::new();
    if state.photo_attachment.is_none() {
        result.insert(Field::Photo, "Please add a photo of the animal");
    }
    result
}

pub fn validate_description(state: &FlowState) -> ValidationResult {
    let mut result = ValidationResult::new();

    let species = state
        .animal_species
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    match species {
        None => result.insert(Field::AnimalSpecies, "Please select a species"),
        Some(_) => {
            let has_breed = state
                .animal_breed
                .as_deref()
                .is_some_and(|b| !b.trim().is_empty());
            if !has_breed {
                result.insert(Field::AnimalBreed, "Please select a breed");
            }
        }
    }

    if !matches!(
        state.animal_gender,
        Some(AnimalGender::Male | AnimalGender::Female)
    ) {
        result.insert(Field::AnimalGender, "Please select the animal's gender");
    }

    if parse_age(&state.animal_age).is_err() {
        result.insert(
            Field::AnimalAge,
            format!("Age must be a whole number between 0 and {MAX_ANIMAL_AGE}"),
        );
    }

    let latitude = parse_coordinate(&state.latitude, 90.0);
    let longitude = parse_coordinate(&state.longitude, 180.0);
    if latitude.is_err() {
        result.insert(Field::Latitude, "Latitude must be between -90 and 90");
    }
    if longitude.is_err() {
        result.insert(Field::Longitude, "Longitude must be between -180 and 180");
    }
    // A location is either complete or absent
    match (latitude, longitude) {
        (Ok(Some(_)), Ok(None)) => result.insert(Field::Longitude, "Enter the longitude too"),
        (Ok(None), Ok(Some(_))) => result.insert(Field::Latitude, "Enter the latitude too"),
        _ => {}
    }

    if state.additional_description.chars().count() > DESCRIPTION_MAX_CHARS {
        result.insert(
            Field::AdditionalDescription,
            format!("Description can have at most {DESCRIPTION_MAX_CHARS} characters"),
        );
    }

    result
}

pub fn validate_contact(state: &FlowState) -> ValidationResult {
    let mut result = ValidationResult::new();

    let phone_ok = phone_digits(&state.contact.phone)
        .is_some_and(|d| (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&d.len()));
    if !phone_ok {
        result.insert(Field::Phone, "Enter a valid phone number");
    }

    if !is_valid_email(&state.contact.email) {
        result.insert(Field::Email, "Enter a valid email address");
    }

    result
}

/// Basic `local@domain.tld` check, case-insensitive, after trimming
pub fn is_valid_email(raw: &str) -> bool {
    EMAIL_PATTERN.is_match(raw.trim())
}

//! Building the create-announcement body from a validated flow

use crate::api::CreateAnnouncementRequest;
use crate::flow::FlowState;
use crate::validation::{
    microchip_digits, normalized_phone, parse_age, parse_coordinate, validate_report, Field,
    ValidationResult,
};

/// Shape the create request, re-validating the whole report first
pub fn build_request(state: &FlowState) -> Result<CreateAnnouncementRequest, ValidationResult> {
    let mut errors = validate_report(state);
    if !errors.is_valid() {
        return Err(errors);
    }

    let species = state
        .animal_species
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let sex = state.animal_gender.and_then(|g| g.api_value());
    let age = parse_age(&state.animal_age);
    let latitude = parse_coordinate(&state.latitude, 90.0);
    let longitude = parse_coordinate(&state.longitude, 180.0);

    let location = match (latitude, longitude) {
        (Ok(Some(latitude)), Ok(Some(longitude))) => Ok(Some((latitude, longitude))),
        (Ok(None), Ok(None)) => Ok(None),
        _ => Err(()),
    };

    match (species, sex, age, location) {
        (Some(species), Some(sex), Ok(age), Ok(location)) => {
            let microchip = microchip_digits(&state.microchip_number);
            let phone_raw = state.contact.phone.trim();
            let description = state.additional_description.trim();

            Ok(CreateAnnouncementRequest {
                species: species.to_string(),
                breed: state
                    .animal_breed
                    .as_deref()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string),
                sex: sex.to_string(),
                age,
                last_seen_date: state.event_date,
                location_latitude: location.map(|(latitude, _)| latitude),
                location_longitude: location.map(|(_, longitude)| longitude),
                email: state.contact.email.trim().to_string(),
                phone: normalized_phone(phone_raw).unwrap_or_else(|| phone_raw.to_string()),
                status: state.kind.status().to_string(),
                microchip_number: (!microchip.is_empty()).then_some(microchip),
                description: (!description.is_empty()).then(|| description.to_string()),
                reward: state.contact.reward_description.clone(),
            })
        }
        _ => {
            // Validators and parsers disagree; report against the description step.
            errors.insert(Field::AnimalSpecies, "Description details are incomplete");
            Err(errors)
        }
    }
}

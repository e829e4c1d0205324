//! Field-level validation for the report flow
//!
//! Each step of the flow has one pure validator (see [`steps`]). Validators
//! never mutate state; they read a [`FlowState`](crate::flow::FlowState) and
//! return a [`ValidationResult`] keyed by [`Field`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub mod steps;

pub use steps::{
    validate_contact, validate_description, validate_microchip, validate_photo, validate_report,
    validate_step,
};

/// Longest microchip number accepted, in digits
pub const MICROCHIP_MAX_DIGITS: usize = 15;
/// Oldest age accepted, in years
pub const MAX_ANIMAL_AGE: i64 = 40;
/// Maximum length of the free-text description, in characters
pub const DESCRIPTION_MAX_CHARS: usize = 500;
/// Accepted phone digit count range (after stripping separators and `+`)
pub const PHONE_MIN_DIGITS: usize = 7;
pub const PHONE_MAX_DIGITS: usize = 11;

/// A user-editable field that can carry a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    MicrochipNumber,
    Photo,
    AnimalSpecies,
    AnimalBreed,
    AnimalGender,
    AnimalAge,
    Latitude,
    Longitude,
    AdditionalDescription,
    Phone,
    Email,
}

impl Field {
    /// Name used when presenting the field to users
    pub fn label(&self) -> &'static str {
        match self {
            Field::MicrochipNumber => "microchip number",
            Field::Photo => "photo",
            Field::AnimalSpecies => "species",
            Field::AnimalBreed => "breed",
            Field::AnimalGender => "gender",
            Field::AnimalAge => "age",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::AdditionalDescription => "description",
            Field::Phone => "phone",
            Field::Email => "email",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-field error messages produced by a validator
///
/// Purely derived; an empty result is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    errors: BTreeMap<Field, String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no field failed
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record an error for a field, replacing any previous message
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }

    /// Drop the error for a field, if any
    pub fn remove(&mut self, field: Field) -> Option<String> {
        self.errors.remove(&field)
    }

    /// Error message for a field
    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// Failing fields in a stable order
    pub fn fields(&self) -> Vec<Field> {
        self.errors.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors.iter().map(|(f, m)| (*f, m.as_str()))
    }

    /// Message shown in the transient toast after a failed Continue
    pub fn first_message(&self) -> Option<&str> {
        self.errors.values().next().map(String::as_str)
    }

    /// Fold another result into this one (later messages win)
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

// ─── Input Normalizers ──────────────────────────────────────────────────────

/// A numeric field that did not parse or fell outside its accepted range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange;

/// Digits of a microchip number with every other character removed
pub fn microchip_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Phone input with separators removed, keeping any `+`
fn compact_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(
        trimmed
            .chars()
            .filter(|c| !(c.is_whitespace() || matches!(c, '-' | '(' | ')' | '.')))
            .collect(),
    )
}

/// Digits of a phone number, or `None` when the input is not a phone number
///
/// Rejects any alphabetic character, strips whitespace, dashes, parentheses
/// and dots, then one leading `+`, and requires only digits to remain.
pub fn phone_digits(raw: &str) -> Option<String> {
    let compact = compact_phone(raw)?;
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    digits
        .chars()
        .all(|c| c.is_ascii_digit())
        .then(|| digits.to_string())
}

/// Phone number as sent to the backend: digits with the leading `+` kept
pub fn normalized_phone(raw: &str) -> Option<String> {
    let digits = phone_digits(raw)?;
    match compact_phone(raw) {
        Some(compact) if compact.starts_with('+') => Some(format!("+{digits}")),
        _ => Some(digits),
    }
}

/// Parse an optional age field; `Ok(None)` when blank
pub fn parse_age(raw: &str) -> Result<Option<u8>, OutOfRange> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<i64>() {
        Ok(age) if (0..=MAX_ANIMAL_AGE).contains(&age) => Ok(Some(age as u8)),
        _ => Err(OutOfRange),
    }
}

/// Parse an optional coordinate component within `[-limit, limit]`
pub fn parse_coordinate(raw: &str, limit: f64) -> Result<Option<f64>, OutOfRange> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && (-limit..=limit).contains(&value) => Ok(Some(value)),
        _ => Err(OutOfRange),
    }
}

//! Report drafts stored as TOML
//!
//! A draft holds the answers of every screen so a report can be checked or
//! submitted from the command line:
//!
//! ```toml
//! kind = "found"
//! photo = "rex.jpg"          # relative to the draft file
//! species = "Dog"
//! breed = "Beagle"
//! gender = "male"
//! date = "2024-05-01"
//! latitude = "52.2297"
//! longitude = "21.0122"
//! phone = "+48 123 456 789"
//! email = "finder@example.com"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::flow::{
    AnimalGender, FlowError, FlowKind, FlowSessionStore, FlowState, FlowStep, FlowUpdate,
};
use crate::photos::PhotoSource;
use crate::validation::{validate_step, ValidationResult};

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("failed to read draft {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid draft: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{} step: {errors}", .step.title())]
    Rejected {
        step: FlowStep,
        errors: ValidationResult,
    },

    #[error(transparent)]
    Flow(#[from] FlowError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportDraft {
    pub kind: FlowKind,
    pub photo: Option<PathBuf>,
    pub microchip: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub gender: Option<AnimalGender>,
    pub age: Option<String>,
    pub date: Option<NaiveDate>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub reward: Option<String>,
}

impl ReportDraft {
    pub fn load(path: &Path) -> Result<Self, DraftError> {
        let content = std::fs::read_to_string(path).map_err(|source| DraftError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, DraftError> {
        Ok(toml::from_str(content)?)
    }

    /// Field values as a single store update
    pub fn update(&self) -> FlowUpdate {
        FlowUpdate {
            microchip_number: self.microchip.clone(),
            animal_species: self.species.clone(),
            animal_breed: self.breed.clone(),
            animal_gender: self.gender,
            animal_age: self.age.clone(),
            event_date: self.date,
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
            additional_description: self.description.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            reward_description: self.reward.clone(),
        }
    }

    /// Photo path resolved against the directory holding the draft
    pub fn photo_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.photo.as_ref().map(|photo| {
            if photo.is_absolute() {
                photo.clone()
            } else {
                base_dir.join(photo)
            }
        })
    }

    /// Copy every answer into `store` and attach the photo
    pub fn fill(&self, store: &mut FlowSessionStore, base_dir: &Path) -> Result<(), DraftError> {
        store.update(self.update())?;
        if let Some(path) = self.photo_path(base_dir) {
            store.attach_photo(PhotoSource::File(path))?;
        }
        Ok(())
    }

    /// Fill `store` and continue through every step before the last one
    ///
    /// The last data step is left for the submission itself.
    pub fn apply(&self, store: &mut FlowSessionStore, base_dir: &Path) -> Result<(), DraftError> {
        self.fill(store, base_dir)?;

        let last = store.kind().last_data_step();
        while store.current_step() != last {
            let step = store.current_step();
            match store.advance(step) {
                Ok(_) => debug!(step = ?step, "draft step accepted"),
                Err(FlowError::Validation(errors)) => {
                    return Err(DraftError::Rejected { step, errors });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Validation errors of every data step, skipping steps that pass
pub fn step_errors(state: &FlowState) -> Vec<(FlowStep, ValidationResult)> {
    state
        .kind
        .steps()
        .iter()
        .filter(|step| !step.is_terminal())
        .map(|step| (*step, validate_step(*step, state)))
        .filter(|(_, result)| !result.is_valid())
        .collect()
}

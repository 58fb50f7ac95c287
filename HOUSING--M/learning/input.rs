//! The eight-field input surface shared by the web form and the CLI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{RawRecord, RAW_FEATURE_COUNT};

/// Declared range and default of one input field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InputField {
    /// Raw column name, also the form key.
    pub key: &'static str,
    /// Label shown next to the slider.
    pub label: &'static str,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
    /// Value used when the field is omitted.
    pub default: f64,
    /// Slider step.
    pub step: f64,
}

/// Fields in raw column order.
pub const INPUT_FIELDS: [InputField; RAW_FEATURE_COUNT] = [
    InputField {
        key: "MedInc",
        label: "Median income (×$10,000)",
        min: 0.0,
        max: 20.0,
        default: 5.0,
        step: 0.1,
    },
    InputField {
        key: "HouseAge",
        label: "Median house age (years)",
        min: 1.0,
        max: 50.0,
        default: 20.0,
        step: 1.0,
    },
    InputField {
        key: "AveRooms",
        label: "Average rooms per household",
        min: 1.0,
        max: 10.0,
        default: 5.0,
        step: 0.1,
    },
    InputField {
        key: "AveBedrms",
        label: "Average bedrooms per household",
        min: 0.5,
        max: 5.0,
        default: 1.0,
        step: 0.1,
    },
    InputField {
        key: "Population",
        label: "Block group population",
        min: 100.0,
        max: 3000.0,
        default: 1000.0,
        step: 10.0,
    },
    InputField {
        key: "AveOccup",
        label: "Average occupants per household",
        min: 0.5,
        max: 5.0,
        default: 3.0,
        step: 0.1,
    },
    InputField {
        key: "Latitude",
        label: "Latitude",
        min: 32.0,
        max: 42.0,
        default: 36.0,
        step: 0.01,
    },
    InputField {
        key: "Longitude",
        label: "Longitude",
        min: -125.0,
        max: -114.0,
        default: -120.0,
        step: 0.01,
    },
];

/// Rejected user input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// Value outside the declared range.
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        /// Field key.
        field: &'static str,
        /// Submitted value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// NaN or infinite value.
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
}

/// One complete set of user inputs. Omitted fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousingInputs {
    /// Median income of the block group.
    #[serde(rename = "MedInc")]
    pub med_inc: f64,
    /// Median house age.
    #[serde(rename = "HouseAge")]
    pub house_age: f64,
    /// Average rooms per household.
    #[serde(rename = "AveRooms")]
    pub ave_rooms: f64,
    /// Average bedrooms per household.
    #[serde(rename = "AveBedrms")]
    pub ave_bedrms: f64,
    /// Block group population.
    #[serde(rename = "Population")]
    pub population: f64,
    /// Average household occupancy.
    #[serde(rename = "AveOccup")]
    pub ave_occup: f64,
    /// Latitude.
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    /// Longitude.
    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

impl Default for HousingInputs {
    fn default() -> Self {
        Self::from_values(INPUT_FIELDS.map(|field| field.default))
    }
}

impl HousingInputs {
    /// Builds inputs from values in raw column order.
    #[must_use]
    pub const fn from_values(values: [f64; RAW_FEATURE_COUNT]) -> Self {
        let [med_inc, house_age, ave_rooms, ave_bedrms, population, ave_occup, latitude, longitude] =
            values;
        Self {
            med_inc,
            house_age,
            ave_rooms,
            ave_bedrms,
            population,
            ave_occup,
            latitude,
            longitude,
        }
    }

    /// Values in raw column order.
    #[must_use]
    pub const fn values(&self) -> [f64; RAW_FEATURE_COUNT] {
        [
            self.med_inc,
            self.house_age,
            self.ave_rooms,
            self.ave_bedrms,
            self.population,
            self.ave_occup,
            self.latitude,
            self.longitude,
        ]
    }

    /// Checks every field against [`INPUT_FIELDS`].
    pub fn validate(&self) -> Result<(), InputError> {
        for (field, value) in INPUT_FIELDS.iter().zip(self.values()) {
            if !value.is_finite() {
                return Err(InputError::NotFinite(field.key));
            }
            if value < field.min || value > field.max {
                return Err(InputError::OutOfRange {
                    field: field.key,
                    value,
                    min: field.min,
                    max: field.max,
                });
            }
        }
        Ok(())
    }

    /// Raw record with every field present.
    #[must_use]
    pub fn to_raw_record(&self) -> RawRecord {
        RawRecord::complete(self.values())
    }
}

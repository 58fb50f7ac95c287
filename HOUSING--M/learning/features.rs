//! Feature derivation shared by training and serving.
//!
//! Both phases build their model input through [`derive`]; nothing else in the
//! workspace computes the per-room ratios.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of raw inputs collected per district.
pub const RAW_FEATURE_COUNT: usize = 8;

/// Number of fields in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 11;

/// Raw column names, in model order.
pub const RAW_FEATURE_NAMES: [&str; RAW_FEATURE_COUNT] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// Every model input, in the order estimators are fit and queried with.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
    "bedrooms_per_room",
    "income_per_room",
    "occupancy_per_room",
];

/// Target column of the housing dataset.
pub const TARGET_NAME: &str = "MedHouseVal";

/// Dollars per target unit (`MedHouseVal` is expressed in $100,000).
pub const TARGET_UNIT: f64 = 100_000.0;

/// Errors raised while deriving features.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FeatureError {
    /// `AveRooms` is zero or not finite, so the per-room ratios are undefined.
    #[error("AveRooms must be a finite non-zero value, got {ave_rooms}")]
    DegenerateRooms {
        /// Offending value.
        ave_rooms: f64,
    },
}

/// The eight raw inputs for one district. Any field may be missing in
/// training data; serving always supplies all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Median income in the block group (tens of thousands of dollars).
    #[serde(rename = "MedInc")]
    pub med_inc: Option<f64>,
    /// Median house age in years.
    #[serde(rename = "HouseAge")]
    pub house_age: Option<f64>,
    /// Average rooms per household.
    #[serde(rename = "AveRooms")]
    pub ave_rooms: Option<f64>,
    /// Average bedrooms per household.
    #[serde(rename = "AveBedrms")]
    pub ave_bedrms: Option<f64>,
    /// Block group population.
    #[serde(rename = "Population")]
    pub population: Option<f64>,
    /// Average household members.
    #[serde(rename = "AveOccup")]
    pub ave_occup: Option<f64>,
    /// Block group latitude.
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    /// Block group longitude.
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
}

impl RawRecord {
    /// Builds a record from values in [`RAW_FEATURE_NAMES`] order.
    #[must_use]
    pub const fn from_values(values: [Option<f64>; RAW_FEATURE_COUNT]) -> Self {
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

    /// Builds a fully observed record.
    #[must_use]
    pub fn complete(values: [f64; RAW_FEATURE_COUNT]) -> Self {
        Self::from_values(values.map(Some))
    }

    /// Values in [`RAW_FEATURE_NAMES`] order.
    #[must_use]
    pub const fn values(&self) -> [Option<f64>; RAW_FEATURE_COUNT] {
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

    /// Number of missing raw fields.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.values().iter().filter(|value| value.is_none()).count()
    }
}

/// Model input in [`FEATURE_NAMES`] order. Missing entries are filled by the
/// imputer before the vector reaches an estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([Option<f64>; FEATURE_COUNT]);

impl FeatureVector {
    /// Wraps values that are already in [`FEATURE_NAMES`] order.
    #[must_use]
    pub const fn from_values(values: [Option<f64>; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Values in [`FEATURE_NAMES`] order.
    #[must_use]
    pub const fn values(&self) -> &[Option<f64>; FEATURE_COUNT] {
        &self.0
    }

    /// Number of fields; always [`FEATURE_COUNT`].
    #[must_use]
    pub const fn len(&self) -> usize {
        FEATURE_COUNT
    }

    /// Always false; present for symmetry with `len`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .and_then(|idx| self.0[idx])
    }

    /// True when no field is missing.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// Pairs every value with its feature name.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, Option<f64>)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

/// Computes the eleven model inputs from the eight raw fields.
///
/// ```text
/// bedrooms_per_room  = AveBedrms / AveRooms
/// income_per_room    = MedInc    / AveRooms
/// occupancy_per_room = AveOccup  / AveRooms
/// ```
///
/// A ratio is missing when either operand is missing. A present `AveRooms`
/// that is zero or non-finite is rejected.
///
/// # Errors
///
/// Returns [`FeatureError::DegenerateRooms`] for a zero or non-finite `AveRooms`.
pub fn derive(raw: &RawRecord) -> Result<FeatureVector, FeatureError> {
    if let Some(ave_rooms) = raw.ave_rooms {
        if ave_rooms == 0.0 || !ave_rooms.is_finite() {
            return Err(FeatureError::DegenerateRooms { ave_rooms });
        }
    }
    let per_room = |numerator: Option<f64>| Some(numerator? / raw.ave_rooms?);

    let [med_inc, house_age, ave_rooms, ave_bedrms, population, ave_occup, latitude, longitude] =
        raw.values();
    Ok(FeatureVector([
        med_inc,
        house_age,
        ave_rooms,
        ave_bedrms,
        population,
        ave_occup,
        latitude,
        longitude,
        per_room(raw.ave_bedrms),
        per_room(raw.med_inc),
        per_room(raw.ave_occup),
    ]))
}

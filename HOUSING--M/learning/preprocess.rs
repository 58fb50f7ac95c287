//! Median imputation followed by standardization.
//!
//! Parameters are fit once on the training partition and travel inside the
//! model artifact; serving never refits them.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

/// Errors raised while fitting preprocessing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreprocessError {
    /// No rows to fit on.
    #[error("cannot fit preprocessing on zero rows")]
    NoRows,
    /// A feature was missing in every training row.
    #[error("feature `{0}` has no observed values in the training set")]
    NoObservations(&'static str),
}

/// Per-feature median used to fill missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: [f64; FEATURE_COUNT],
}

impl MedianImputer {
    /// Computes the median of the observed values of every feature.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, PreprocessError> {
        if rows.is_empty() {
            return Err(PreprocessError::NoRows);
        }
        let mut medians = [0.0; FEATURE_COUNT];
        for (idx, median) in medians.iter_mut().enumerate() {
            let mut observed: Vec<f64> = rows.iter().filter_map(|row| row.values()[idx]).collect();
            *median = median_of(&mut observed)
                .ok_or(PreprocessError::NoObservations(FEATURE_NAMES[idx]))?;
        }
        Ok(Self { medians })
    }

    /// Fills the gaps of one vector.
    #[must_use]
    pub fn transform(&self, row: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut filled = self.medians;
        for (slot, value) in filled.iter_mut().zip(row.values()) {
            if let Some(value) = value {
                *slot = *value;
            }
        }
        filled
    }

    /// Learned medians in feature order.
    #[must_use]
    pub const fn medians(&self) -> &[f64; FEATURE_COUNT] {
        &self.medians
    }
}

/// Zero-mean, unit-variance scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: [f64; FEATURE_COUNT],
    scales: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Learns per-column mean and population standard deviation. Columns with
    /// zero deviation get a scale of 1.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Result<Self, PreprocessError> {
        if rows.is_empty() {
            return Err(PreprocessError::NoRows);
        }
        let count = rows.len() as f64;
        let mut means = [0.0; FEATURE_COUNT];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= count;
        }

        let mut scales = [0.0; FEATURE_COUNT];
        for row in rows {
            for ((scale, value), mean) in scales.iter_mut().zip(row).zip(&means) {
                *scale += (value - mean).powi(2);
            }
        }
        for scale in &mut scales {
            let deviation = (*scale / count).sqrt();
            *scale = if deviation > f64::EPSILON { deviation } else { 1.0 };
        }
        Ok(Self { means, scales })
    }

    /// Standardizes one row in place.
    pub fn transform_in_place(&self, row: &mut [f64; FEATURE_COUNT]) {
        for ((value, mean), scale) in row.iter_mut().zip(&self.means).zip(&self.scales) {
            *value = (*value - mean) / scale;
        }
    }

    /// Learned means in feature order.
    #[must_use]
    pub const fn means(&self) -> &[f64; FEATURE_COUNT] {
        &self.means
    }

    /// Learned deviations in feature order.
    #[must_use]
    pub const fn scales(&self) -> &[f64; FEATURE_COUNT] {
        &self.scales
    }
}

/// Imputer and scaler fit together on the same training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    imputer: MedianImputer,
    scaler: StandardScaler,
}

impl Preprocessor {
    /// Fits the imputer, then the scaler on the imputed rows.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, PreprocessError> {
        let imputer = MedianImputer::fit(rows)?;
        let filled: Vec<_> = rows.iter().map(|row| imputer.transform(row)).collect();
        let scaler = StandardScaler::fit(&filled)?;
        Ok(Self { imputer, scaler })
    }

    /// Imputes and scales one vector.
    #[must_use]
    pub fn transform(&self, row: &FeatureVector) -> Array1<f64> {
        let mut values = self.imputer.transform(row);
        self.scaler.transform_in_place(&mut values);
        Array1::from(values.to_vec())
    }

    /// Imputes and scales a batch into a `rows x FEATURE_COUNT` matrix.
    #[must_use]
    pub fn transform_batch(&self, rows: &[FeatureVector]) -> Array2<f64> {
        let mut matrix = Array2::zeros((rows.len(), FEATURE_COUNT));
        for (mut target, row) in matrix.rows_mut().into_iter().zip(rows) {
            target.assign(&self.transform(row));
        }
        matrix
    }

    /// Fitted imputer.
    #[must_use]
    pub const fn imputer(&self) -> &MedianImputer {
        &self.imputer
    }

    /// Fitted scaler.
    #[must_use]
    pub const fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }
}

fn median_of(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{derive, RawRecord};

    fn vector(first: Option<f64>, rest: f64) -> FeatureVector {
        let mut values = [Some(rest); FEATURE_COUNT];
        values[0] = first;
        FeatureVector::from_values(values)
    }

    #[test]
    fn median_handles_odd_and_even_counts() {
        assert_eq!(median_of(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median_of(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median_of(&mut []), None);
    }

    #[test]
    fn imputer_fills_with_training_median() {
        let rows = [
            vector(Some(1.0), 0.0),
            vector(Some(9.0), 0.0),
            vector(Some(4.0), 0.0),
            vector(None, 0.0),
        ];
        let imputer = MedianImputer::fit(&rows).unwrap();
        assert_eq!(imputer.medians()[0], 4.0);
        assert_eq!(imputer.transform(&rows[3])[0], 4.0);
        assert_eq!(imputer.transform(&rows[1])[0], 9.0);
    }

    #[test]
    fn imputer_rejects_unobserved_feature() {
        let rows = [vector(None, 1.0), vector(None, 2.0)];
        assert_eq!(
            MedianImputer::fit(&rows),
            Err(PreprocessError::NoObservations("MedInc"))
        );
        assert_eq!(MedianImputer::fit(&[]), Err(PreprocessError::NoRows));
    }

    #[test]
    fn scaler_standardizes_columns() {
        let mut rows = vec![[0.0; FEATURE_COUNT]; 4];
        for (idx, row) in rows.iter_mut().enumerate() {
            row[0] = idx as f64 * 2.0;
            row[1] = 7.0;
        }
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert!((scaler.means()[0] - 3.0).abs() < 1e-12);
        assert!((scaler.scales()[0] - 5.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(scaler.scales()[1], 1.0);

        let mut transformed = rows.clone();
        transformed.iter_mut().for_each(|row| scaler.transform_in_place(row));
        let mean: f64 = transformed.iter().map(|row| row[0]).sum::<f64>() / 4.0;
        let var: f64 = transformed.iter().map(|row| row[0].powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
        assert!(transformed.iter().all(|row| row[1] == 0.0));
    }

    #[test]
    fn preprocessor_uses_persisted_parameters_for_single_rows() {
        let rows: Vec<_> = (1_i32..=5)
            .map(|i| {
                let i = f64::from(i);
                derive(&RawRecord::complete([
                    i,
                    10.0 * i,
                    4.0 + i,
                    1.0,
                    500.0 * i,
                    2.0,
                    34.0 + i,
                    -118.0 - i,
                ]))
                .unwrap()
            })
            .collect();
        let preprocessor = Preprocessor::fit(&rows).unwrap();
        let batch = preprocessor.transform_batch(&rows);
        assert_eq!(batch.dim(), (5, FEATURE_COUNT));

        // A lone request lands where the same row landed in the training batch.
        let single = preprocessor.transform(&rows[2]);
        assert_eq!(single, batch.row(2));
        assert!(single[0].abs() < 1e-12);
    }

    #[test]
    fn missing_request_value_maps_to_scaled_median() {
        let rows: Vec<_> = [1.0, 2.0, 3.0, 10.0]
            .iter()
            .map(|value| vector(Some(*value), *value))
            .collect();
        let preprocessor = Preprocessor::fit(&rows).unwrap();
        let out = preprocessor.transform(&vector(None, 2.5));
        let expected = (2.5 - preprocessor.scaler().means()[0]) / preprocessor.scaler().scales()[0];
        assert!((out[0] - expected).abs() < 1e-12);
    }
}

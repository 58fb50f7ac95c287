use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{RawRecord, RAW_FEATURE_COUNT, RAW_FEATURE_NAMES, TARGET_NAME};

/// One district: the raw inputs plus the observed median house value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    /// Raw inputs, possibly with gaps.
    pub raw: RawRecord,
    /// `MedHouseVal` in units of $100,000.
    pub target: f64,
}

/// Housing records loaded from CSV (or generated for tests and demos).
#[derive(Debug, Clone, Default)]
pub struct HousingDataset {
    /// Usable records in file order.
    pub records: Vec<LabeledRecord>,
    /// Rows dropped because the target was missing or unparseable.
    pub dropped_rows: usize,
    /// File the records came from, if any.
    pub source: Option<PathBuf>,
}

impl HousingDataset {
    /// Loads a CSV file whose header names the eight raw columns and `MedHouseVal`.
    ///
    /// Columns may appear in any order and extra columns are ignored. Empty,
    /// unparseable or non-finite cells become missing values.
    ///
    /// The expected file is a CSV export of the 20,640-row California housing
    /// dataset (scikit-learn's `fetch_california_housing(as_frame=True).frame`
    /// written with `to_csv(index=False)`): header
    /// `MedInc,HouseAge,AveRooms,AveBedrms,Population,AveOccup,Latitude,Longitude,MedHouseVal`,
    /// target in units of $100,000.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut dataset = Self::from_reader(file)?;
        dataset.source = Some(path.to_path_buf());
        Ok(dataset)
    }

    /// Parses CSV content from any reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or(DatasetError::MissingColumn(name))
        };
        let mut raw_columns = [0usize; RAW_FEATURE_COUNT];
        for (slot, name) in raw_columns.iter_mut().zip(RAW_FEATURE_NAMES) {
            *slot = column(name)?;
        }
        let target_column = column(TARGET_NAME)?;

        let mut dataset = Self::default();
        for row in reader.records() {
            let row = row?;
            let cell = |idx: usize| row.get(idx).and_then(parse_cell);
            let Some(target) = cell(target_column) else {
                dataset.dropped_rows += 1;
                continue;
            };
            let raw = RawRecord::from_values(raw_columns.map(cell));
            dataset.records.push(LabeledRecord { raw, target });
        }
        if dataset.records.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(dataset)
    }

    /// Generates a reproducible dataset shaped like the California housing data.
    ///
    /// The target mixes a linear income effect with a coastal step on
    /// latitude/longitude, so tree ensembles have something to find.
    #[must_use]
    pub fn synthetic(count: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let med_inc = rng.gen_range(0.5..15.0);
            let house_age = f64::from(rng.gen_range(1u8..=52));
            let ave_rooms = rng.gen_range(2.0..9.0);
            let ave_bedrms = ave_rooms * rng.gen_range(0.15..0.3);
            let population = rng.gen_range(100.0..3000.0);
            let ave_occup = rng.gen_range(1.0..5.0);
            let latitude = rng.gen_range(32.5..42.0);
            let longitude = rng.gen_range(-124.3..-114.3);

            let coastal = if longitude < -121.0 && latitude < 38.5 { 0.9 } else { 0.0 };
            let target = (0.38 * med_inc + 0.006 * house_age - 0.12 * ave_occup
                + coastal
                + rng.gen_range(-0.15..0.15))
            .clamp(0.15, 5.0);

            records.push(LabeledRecord {
                raw: RawRecord::complete([
                    med_inc, house_age, ave_rooms, ave_bedrms, population, ave_occup, latitude,
                    longitude,
                ]),
                target,
            });
        }
        Self {
            records,
            dropped_rows: 0,
            source: None,
        }
    }

    /// Number of usable records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of missing raw cells across all records.
    #[must_use]
    pub fn missing_cells(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.raw.missing_count())
            .sum()
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Errors raised by the dataset loader.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Dataset file could not be opened.
    #[error("opening dataset {path}: {source}")]
    Open {
        /// Requested path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// Header row lacks a required column.
    #[error("dataset is missing required column `{0}`")]
    MissingColumn(&'static str),
    /// No row had a usable target.
    #[error("dataset contains no usable records")]
    Empty,
    /// Malformed CSV.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str =
        "MedInc,HouseAge,AveRooms,AveBedrms,Population,AveOccup,Latitude,Longitude,MedHouseVal";

    #[test]
    fn loads_csv_with_gaps() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("housing.csv");
        let body = format!(
            "{HEADER}\n\
             8.3252,41,6.98,1.02,322,2.55,37.88,-122.23,4.526\n\
             ,21,6.24,0.97,2401,2.1,37.86,-122.22,3.585\n\
             7.25,52,n/a,1.07,496,2.8,37.85,-122.24,3.521\n"
        );
        fs::write(&path, body).unwrap();

        let dataset = HousingDataset::load_csv(&path).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.records[0].raw.med_inc, Some(8.3252));
        assert_eq!(dataset.records[1].raw.med_inc, None);
        assert_eq!(dataset.records[2].raw.ave_rooms, None);
        assert_eq!(dataset.missing_cells(), 2);
        assert_eq!(dataset.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn columns_are_matched_by_name() {
        let csv = "MedHouseVal,Longitude,Latitude,AveOccup,Population,AveBedrms,AveRooms,HouseAge,MedInc,extra\n\
                   2.5,-120,36,3,1000,1,5,20,5,ignored\n";
        let dataset = HousingDataset::from_reader(csv.as_bytes()).unwrap();
        let record = dataset.records[0];
        assert_eq!(record.target, 2.5);
        assert_eq!(
            record.raw,
            RawRecord::complete([5.0, 20.0, 5.0, 1.0, 1000.0, 3.0, 36.0, -120.0])
        );
    }

    #[test]
    fn rows_without_target_are_dropped() {
        let csv = format!("{HEADER}\n1,2,3,1,100,2,34,-118,\n1,2,3,1,100,2,34,-118,1.5\n");
        let dataset = HousingDataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.dropped_rows, 1);
    }

    #[test]
    fn short_rows_are_treated_as_missing() {
        let csv = format!("{HEADER}\n1,2,3,1,100,2,34,-118,1.5\n1,2,3\n");
        let dataset = HousingDataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.dropped_rows, 1);
    }

    #[test]
    fn missing_column_is_reported() {
        let csv = "MedInc,HouseAge\n1,2\n";
        let err = HousingDataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn("AveRooms")));
    }

    #[test]
    fn header_only_is_empty() {
        let err = HousingDataset::from_reader(format!("{HEADER}\n").as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = HousingDataset::load_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DatasetError::Open { .. }));
    }

    #[test]
    fn synthetic_is_reproducible() {
        let first = HousingDataset::synthetic(64, 7);
        let second = HousingDataset::synthetic(64, 7);
        assert_eq!(first.records, second.records);
        assert_eq!(first.missing_cells(), 0);
        assert!(first
            .records
            .iter()
            .all(|record| (0.15..=5.0).contains(&record.target)));
    }
}

use ndarray::Array1;

use crate::{
    dataloader::LabeledRecord,
    features::{derive, FeatureVector},
};

/// Derived feature vectors paired with their targets, in dataset order.
#[derive(Debug, Clone, Default)]
pub struct PreparedRecords {
    /// One vector per usable record; gaps are still present.
    pub features: Vec<FeatureVector>,
    /// Targets aligned with `features`.
    pub targets: Vec<f64>,
    /// Records rejected by feature derivation.
    pub skipped: usize,
}

impl PreparedRecords {
    /// Derives every record, skipping and counting those whose `AveRooms`
    /// is zero or non-finite.
    #[must_use]
    pub fn from_records(records: &[LabeledRecord]) -> Self {
        let mut prepared = Self {
            features: Vec::with_capacity(records.len()),
            targets: Vec::with_capacity(records.len()),
            skipped: 0,
        };
        for record in records {
            match derive(&record.raw) {
                Ok(vector) => {
                    prepared.features.push(vector);
                    prepared.targets.push(record.target);
                }
                Err(_) => prepared.skipped += 1,
            }
        }
        prepared
    }

    /// Number of usable rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when nothing survived derivation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Copies the rows at `indices` into a new partition.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Partition {
        Partition {
            features: indices.iter().map(|&idx| self.features[idx]).collect(),
            targets: indices.iter().map(|&idx| self.targets[idx]).collect(),
        }
    }
}

/// A train or test slice of the prepared rows.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Feature vectors.
    pub features: Vec<FeatureVector>,
    /// Aligned targets.
    pub targets: Array1<f64>,
}

impl Partition {
    /// Row count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True for an empty partition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::RawRecord;

    fn record(ave_rooms: f64, target: f64) -> LabeledRecord {
        LabeledRecord {
            raw: RawRecord::complete([3.0, 20.0, ave_rooms, 1.0, 800.0, 2.5, 34.0, -118.0]),
            target,
        }
    }

    #[test]
    fn degenerate_rooms_are_skipped_and_counted() {
        let records = [record(5.0, 1.0), record(0.0, 2.0), record(4.0, 3.0)];
        let prepared = PreparedRecords::from_records(&records);
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared.skipped, 1);
        assert_eq!(prepared.targets, vec![1.0, 3.0]);
    }

    #[test]
    fn subset_keeps_rows_aligned() {
        let records: Vec<_> = (1_i32..=4).map(|i| record(f64::from(i), f64::from(i) * 10.0)).collect();
        let prepared = PreparedRecords::from_records(&records);
        let part = prepared.subset(&[3, 1]);
        assert_eq!(part.len(), 2);
        assert_eq!(part.targets.to_vec(), vec![40.0, 20.0]);
        assert_eq!(part.features[0].get("AveRooms"), Some(4.0));
    }
}

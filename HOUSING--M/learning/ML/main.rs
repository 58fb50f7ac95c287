//! Classical ML pipeline: derive, split, preprocess, fit every candidate,
//! score on the held-out rows and keep the best.

/// Record preparation and partitioning.
pub mod editor;
/// Estimator contract and the serializable estimator enum.
pub mod estimator;
/// Bagged tree ensemble.
pub mod forest;
/// Split and error metrics.
pub mod func;
/// Linear baseline.
pub mod ml;
/// Evaluation reports and selection.
pub mod reporter;
/// Prediction sanity checks.
pub mod reviewer;
/// CART regression tree.
pub mod tree;

use std::time::Instant;

use editor::PreparedRecords;
use estimator::Estimator;
use reporter::{select_best, CandidateReport, EvaluationMetrics, TrainingReport};
use reviewer::PredictionReviewer;
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    artifact::ModelArtifact, config::TrainingConfig, dataloader::HousingDataset,
    error::LearningError, preprocess::Preprocessor, telemetry::LearningTelemetry,
};

/// End-to-end training pipeline.
#[derive(Debug, Default)]
pub struct ClassicalMlPipeline {
    reviewer: PredictionReviewer,
}

impl ClassicalMlPipeline {
    /// Trains every configured candidate and returns the winning artifact.
    /// Nothing is logged; the artifact still gets a fresh run id.
    pub fn run(
        &self,
        dataset: &HousingDataset,
        config: &TrainingConfig,
    ) -> Result<ModelArtifact, LearningError> {
        let telemetry = LearningTelemetry::disabled("learning");
        self.run_with_telemetry(dataset, config, Some(&telemetry))
    }

    /// Runs the pipeline with optional telemetry instrumentation.
    pub fn run_with_telemetry(
        &self,
        dataset: &HousingDataset,
        config: &TrainingConfig,
        telemetry: Option<&LearningTelemetry>,
    ) -> Result<ModelArtifact, LearningError> {
        if config.candidates.is_empty() {
            return Err(LearningError::NoCandidates);
        }
        let prepared = PreparedRecords::from_records(&dataset.records);
        log(
            telemetry,
            LogLevel::Info,
            "classical_ml_prepared",
            json!({
                "records": dataset.len(),
                "usable": prepared.len(),
                "missing_cells": dataset.missing_cells(),
                "dropped_rows": dataset.dropped_rows,
            }),
        );
        if prepared.skipped > 0 {
            log(
                telemetry,
                LogLevel::Warn,
                "classical_ml_degenerate_rooms",
                json!({ "skipped": prepared.skipped }),
            );
        }
        if prepared.is_empty() {
            return Err(LearningError::NoUsableRecords {
                skipped: prepared.skipped,
                total: dataset.len(),
            });
        }

        let split = func::train_test_split(prepared.len(), config.test_ratio, config.seed);
        if split.train.is_empty() || split.test.is_empty() {
            return Err(LearningError::TooFewRecords(prepared.len()));
        }
        let train = prepared.subset(&split.train);
        let test = prepared.subset(&split.test);
        log(
            telemetry,
            LogLevel::Info,
            "classical_ml_split",
            json!({ "train": train.len(), "test": test.len(), "seed": config.seed }),
        );

        let preprocessor = Preprocessor::fit(&train.features)?;
        let x_train = preprocessor.transform_batch(&train.features);
        let x_test = preprocessor.transform_batch(&test.features);

        let mut reports = Vec::with_capacity(config.candidates.len());
        let mut fitted: Vec<Option<Estimator>> = Vec::with_capacity(config.candidates.len());
        for &kind in &config.candidates {
            log(
                telemetry,
                LogLevel::Debug,
                "classical_ml_candidate_start",
                json!({ "model": kind }),
            );
            let mut estimator = kind.build(&config.tree, &config.forest, config.seed);
            let started = Instant::now();
            let outcome = estimator.regressor_mut().fit(x_train.view(), train.targets.view());
            let fit_millis = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let mut report = CandidateReport {
                model: kind,
                metrics: None,
                rejection: None,
                fit_millis,
            };
            match outcome {
                Ok(()) => {
                    let predictions = estimator.regressor().predict(x_test.view());
                    let metrics = EvaluationMetrics {
                        rmse: func::rmse(predictions.view(), test.targets.view()),
                        mae: func::mae(predictions.view(), test.targets.view()),
                    };
                    // Non-finite metrics are not representable in the JSON artifact.
                    match self.reviewer.review(predictions.view()) {
                        Some(reason) => report.rejection = Some(reason),
                        None if !metrics.is_finite() => {
                            report.rejection = Some("non-finite metrics".into());
                        }
                        None => report.metrics = Some(metrics),
                    }
                }
                Err(err) => report.rejection = Some(err.to_string()),
            }

            log(
                telemetry,
                if report.qualified() {
                    LogLevel::Info
                } else {
                    LogLevel::Warn
                },
                "classical_ml_candidate_scored",
                json!({
                    "model": kind,
                    "rmse": report.metrics.map(|m| m.rmse),
                    "mae": report.metrics.map(|m| m.mae),
                    "rejection": report.rejection,
                    "fit_millis": fit_millis,
                }),
            );
            fitted.push(report.qualified().then_some(estimator));
            reports.push(report);
        }

        let Some(best) = select_best(&reports) else {
            let reasons = reports
                .iter()
                .map(|report| {
                    format!(
                        "{}: {}",
                        report.model,
                        report.rejection.as_deref().unwrap_or("not evaluated")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            log(
                telemetry,
                LogLevel::Error,
                "classical_ml_no_candidate",
                json!({ "reasons": reasons }),
            );
            return Err(LearningError::AllCandidatesRejected(reasons));
        };
        let Some(model) = fitted.swap_remove(best) else {
            return Err(LearningError::AllCandidatesRejected(format!(
                "{} qualified without a fitted estimator",
                reports[best].model
            )));
        };

        let report = TrainingReport {
            selected: reports[best].model,
            candidates: reports,
            train_rows: train.len(),
            test_rows: test.len(),
            skipped_records: prepared.skipped,
            dropped_rows: dataset.dropped_rows,
            seed: config.seed,
        };
        log(
            telemetry,
            LogLevel::Info,
            "classical_ml_selected",
            json!({
                "model": report.selected,
                "rmse": report.selected_metrics().map(|m| m.rmse),
                "mae": report.selected_metrics().map(|m| m.mae),
            }),
        );
        let run_id = telemetry.map_or_else(Uuid::new_v4, LearningTelemetry::run_id);
        Ok(ModelArtifact::new(run_id, preprocessor, model, report))
    }
}

fn log(
    telemetry: Option<&LearningTelemetry>,
    level: LogLevel,
    message: &str,
    metadata: serde_json::Value,
) {
    if let Some(tel) = telemetry {
        let _ = tel.log(level, message, metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classical_ml::estimator::ModelKind,
        dataloader::LabeledRecord,
        features::RawRecord,
    };
    use shared_logging::read_records;
    use tempfile::tempdir;

    #[test]
    fn selects_lowest_rmse_candidate() {
        let dataset = HousingDataset::synthetic(300, 11);
        let artifact = ClassicalMlPipeline::default()
            .run(&dataset, &TrainingConfig::fast())
            .unwrap();
        let report = artifact.report();
        assert_eq!(report.candidates.len(), 3);
        assert_eq!(report.test_rows, 60);
        assert_eq!(report.train_rows, 240);
        let best = select_best(&report.candidates).unwrap();
        assert_eq!(report.selected, report.candidates[best].model);
        assert_eq!(artifact.model().kind(), report.selected);
        assert!(report.candidates.iter().all(CandidateReport::qualified));
    }

    #[test]
    fn same_seed_reproduces_selection_and_metrics() {
        let dataset = HousingDataset::synthetic(200, 5);
        let pipeline = ClassicalMlPipeline::default();
        let first = pipeline.run(&dataset, &TrainingConfig::fast()).unwrap();
        let second = pipeline.run(&dataset, &TrainingConfig::fast()).unwrap();
        assert_eq!(first.report().selected, second.report().selected);
        let metrics = |artifact: &ModelArtifact| {
            artifact
                .report()
                .candidates
                .iter()
                .map(|candidate| candidate.metrics)
                .collect::<Vec<_>>()
        };
        assert_eq!(metrics(&first), metrics(&second));
        assert_eq!(first.preprocessor(), second.preprocessor());
    }

    #[test]
    fn degenerate_rows_are_skipped_and_logged() {
        let tmp = tempdir().unwrap();
        let mut dataset = HousingDataset::synthetic(100, 3);
        dataset.records[4].raw.ave_rooms = Some(0.0);
        dataset.records[9].raw.ave_rooms = Some(0.0);
        let telemetry = LearningTelemetry::builder("learning")
            .log_path(tmp.path().join("train.log"))
            .build()
            .unwrap();
        let config = TrainingConfig {
            candidates: vec![ModelKind::LinearRegression],
            ..TrainingConfig::fast()
        };
        let artifact = ClassicalMlPipeline::default()
            .run_with_telemetry(&dataset, &config, Some(&telemetry))
            .unwrap();
        assert_eq!(artifact.report().skipped_records, 2);
        assert_eq!(artifact.report().train_rows + artifact.report().test_rows, 98);
        assert_eq!(artifact.run_id(), telemetry.run_id());

        let records = read_records(tmp.path().join("train.log")).unwrap();
        let messages: Vec<_> = records.iter().map(|record| record.message.as_str()).collect();
        assert!(messages.contains(&"classical_ml_degenerate_rooms"));
        assert!(messages.contains(&"classical_ml_selected"));
    }

    #[test]
    fn untraced_runs_get_distinct_run_ids() {
        let dataset = HousingDataset::synthetic(60, 2);
        let config = TrainingConfig {
            candidates: vec![ModelKind::LinearRegression],
            ..TrainingConfig::fast()
        };
        let pipeline = ClassicalMlPipeline::default();
        let first = pipeline.run(&dataset, &config).unwrap();
        let second = pipeline.run(&dataset, &config).unwrap();
        assert_ne!(first.run_id(), second.run_id());
        assert_eq!(first.report().selected, second.report().selected);
    }

    #[test]
    fn single_record_cannot_be_split() {
        let dataset = HousingDataset::synthetic(1, 1);
        let err = ClassicalMlPipeline::default()
            .run(&dataset, &TrainingConfig::fast())
            .unwrap_err();
        assert!(matches!(err, LearningError::TooFewRecords(1)));
    }

    #[test]
    fn all_degenerate_records_fail() {
        let record = LabeledRecord {
            raw: RawRecord::complete([1.0, 2.0, 0.0, 1.0, 100.0, 2.0, 34.0, -118.0]),
            target: 1.0,
        };
        let dataset = HousingDataset {
            records: vec![record; 4],
            ..HousingDataset::default()
        };
        let err = ClassicalMlPipeline::default()
            .run(&dataset, &TrainingConfig::fast())
            .unwrap_err();
        assert!(matches!(
            err,
            LearningError::NoUsableRecords { skipped: 4, total: 4 }
        ));
    }

    #[test]
    fn empty_candidate_list_is_rejected() {
        let config = TrainingConfig {
            candidates: Vec::new(),
            ..TrainingConfig::fast()
        };
        let err = ClassicalMlPipeline::default()
            .run(&HousingDataset::synthetic(20, 1), &config)
            .unwrap_err();
        assert!(matches!(err, LearningError::NoCandidates));
    }
}

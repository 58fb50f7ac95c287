use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use shared_logging::LogLevel;
use thiserror::Error;

use crate::classical_ml::{
    estimator::ModelKind,
    forest::ForestParams,
    tree::TreeParams,
};

/// Errors raised while loading or validating a training config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("reading training config {path}: {source}")]
    Read {
        /// Requested path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// Config file is not valid TOML for [`TrainingConfig`].
    #[error("parsing training config {path}: {source}")]
    Parse {
        /// Requested path.
        path: PathBuf,
        /// Decoder failure.
        source: toml::de::Error,
    },
    /// A value is outside its accepted range.
    #[error("invalid training config: {0}")]
    Invalid(String),
}

/// Settings for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// CSV dataset with the raw columns and `MedHouseVal`.
    pub dataset: PathBuf,
    /// Destination of the selected model artifact.
    pub artifact: PathBuf,
    /// Fraction of rows held out for evaluation.
    pub test_ratio: f64,
    /// Seed for the split and every randomized estimator.
    pub seed: u64,
    /// Candidate families, in tie-break order.
    pub candidates: Vec<ModelKind>,
    /// Single-tree limits.
    pub tree: TreeConfig,
    /// Forest limits.
    pub forest: ForestConfig,
    /// Directory for JSON-lines run logs. Logging is off when unset.
    pub log_dir: Option<PathBuf>,
    /// Minimum level written to the run log.
    pub log_level: String,
    /// JSONL manifest of completed runs.
    pub manifest: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/housing.csv"),
            artifact: PathBuf::from("artifacts/best_model.json"),
            test_ratio: 0.2,
            seed: 42,
            candidates: ModelKind::ALL.to_vec(),
            tree: TreeConfig::default(),
            forest: ForestConfig::default(),
            log_dir: None,
            log_level: "info".into(),
            manifest: PathBuf::from("runs/manifest.jsonl"),
        }
    }
}

impl TrainingConfig {
    /// Loads and validates a TOML file. Relative paths are resolved against
    /// the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.resolve_paths(&base);
        config.validate()?;
        Ok(config)
    }

    /// Rebases every relative path onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.dataset, &mut self.artifact, &mut self.manifest] {
            rebase(path, base);
        }
        if let Some(dir) = self.log_dir.as_mut() {
            rebase(dir, base);
        }
    }

    /// Checks ranges; call again after applying command-line overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "test_ratio must lie strictly between 0 and 1 (got {})",
                self.test_ratio
            )));
        }
        if self.candidates.is_empty() {
            return Err(ConfigError::Invalid("candidates must not be empty".into()));
        }
        if let Some(dup) = self
            .candidates
            .iter()
            .enumerate()
            .find_map(|(idx, kind)| self.candidates[..idx].contains(kind).then_some(kind))
        {
            return Err(ConfigError::Invalid(format!("candidate `{dup}` listed twice")));
        }
        if self.forest.n_estimators == 0 {
            return Err(ConfigError::Invalid("forest.n_estimators must be positive".into()));
        }
        self.tree.limits("tree")?;
        self.forest.limits("forest")?;
        self.min_log_level()?;
        Ok(())
    }

    /// Parsed `log_level`.
    pub fn min_log_level(&self) -> Result<LogLevel, ConfigError> {
        LogLevel::parse(&self.log_level).ok_or_else(|| {
            ConfigError::Invalid(format!("unknown log_level `{}`", self.log_level))
        })
    }
}

fn rebase(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn check_limits(
    section: &str,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: Option<usize>,
) -> Result<(), ConfigError> {
    if max_depth == Some(0) {
        return Err(ConfigError::Invalid(format!("{section}.max_depth must be positive")));
    }
    if min_samples_split < 2 {
        return Err(ConfigError::Invalid(format!(
            "{section}.min_samples_split must be at least 2"
        )));
    }
    if min_samples_leaf == 0 {
        return Err(ConfigError::Invalid(format!(
            "{section}.min_samples_leaf must be positive"
        )));
    }
    if max_features == Some(0) {
        return Err(ConfigError::Invalid(format!(
            "{section}.max_features must be positive"
        )));
    }
    Ok(())
}

/// Decision-tree hyper-parameters as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    /// Depth limit; unlimited when absent.
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node.
    pub min_samples_split: usize,
    /// Minimum samples per leaf.
    pub min_samples_leaf: usize,
    /// Features examined per split; all when absent.
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

impl TreeConfig {
    /// Estimator parameters for a run seeded with `seed`.
    #[must_use]
    pub const fn params(&self, seed: u64) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            seed,
        }
    }

    fn limits(&self, section: &str) -> Result<(), ConfigError> {
        check_limits(
            section,
            self.max_depth,
            self.min_samples_split,
            self.min_samples_leaf,
            self.max_features,
        )
    }
}

/// Random-forest hyper-parameters as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForestConfig {
    /// Number of trees.
    pub n_estimators: usize,
    /// Per-tree depth limit.
    pub max_depth: Option<usize>,
    /// Per-tree minimum samples to split.
    pub min_samples_split: usize,
    /// Per-tree minimum samples per leaf.
    pub min_samples_leaf: usize,
    /// Features examined per split.
    pub max_features: Option<usize>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

impl ForestConfig {
    /// Estimator parameters for a run seeded with `seed`.
    #[must_use]
    pub const fn params(&self, seed: u64) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            seed,
        }
    }

    fn limits(&self, section: &str) -> Result<(), ConfigError> {
        check_limits(
            section,
            self.max_depth,
            self.min_samples_split,
            self.min_samples_leaf,
            self.max_features,
        )
    }
}

#[cfg(test)]
impl TrainingConfig {
    /// Small ensembles so pipeline tests stay quick.
    pub(crate) fn fast() -> Self {
        Self {
            tree: TreeConfig {
                max_depth: Some(8),
                ..TreeConfig::default()
            },
            forest: ForestConfig {
                n_estimators: 8,
                max_depth: Some(8),
                ..ForestConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_run() {
        let config = TrainingConfig::default();
        assert_eq!(config.test_ratio, 0.2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.candidates, ModelKind::ALL.to_vec());
        assert_eq!(config.forest.n_estimators, 100);
        config.validate().unwrap();
    }

    #[test]
    fn loads_partial_file_and_resolves_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.toml");
        fs::write(
            &path,
            r#"
dataset = "data/cal.csv"
artifact = "/tmp/model.json"
seed = 7
candidates = ["linear_regression", "random_forest"]
log_dir = "logs"

[forest]
n_estimators = 25
max_depth = 12
"#,
        )
        .unwrap();

        let config = TrainingConfig::load(&path).unwrap();
        assert_eq!(config.dataset, dir.path().join("data/cal.csv"));
        assert_eq!(config.artifact, PathBuf::from("/tmp/model.json"));
        assert_eq!(config.log_dir, Some(dir.path().join("logs")));
        assert_eq!(config.manifest, dir.path().join("runs/manifest.jsonl"));
        assert_eq!(config.seed, 7);
        assert_eq!(config.test_ratio, 0.2);
        assert_eq!(
            config.candidates,
            vec![ModelKind::LinearRegression, ModelKind::RandomForest]
        );
        assert_eq!(config.forest.n_estimators, 25);
        assert_eq!(config.forest.max_depth, Some(12));
        assert_eq!(config.forest.min_samples_leaf, 1);
        assert_eq!(config.forest.params(7).seed, 7);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = TrainingConfig {
            test_ratio: 1.0,
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.test_ratio = 0.25;
        config.candidates = vec![ModelKind::DecisionTree, ModelKind::DecisionTree];
        assert!(config.validate().unwrap_err().to_string().contains("twice"));

        config.candidates = vec![ModelKind::DecisionTree];
        config.tree.min_samples_split = 1;
        assert!(config.validate().unwrap_err().to_string().contains("tree.min_samples_split"));

        config.tree.min_samples_split = 2;
        config.log_level = "verbose".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_keys_and_models_fail_to_parse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "candidates = [\"gradient_boosting\"]\n").unwrap();
        assert!(matches!(TrainingConfig::load(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, "seeds = 3\n").unwrap();
        assert!(matches!(TrainingConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            TrainingConfig::load("/no/such/train.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}

//! Training configuration.

use crate::error::{LearningError, Result};
use crate::registry::ModelKind;
use serde::{Deserialize, Serialize};

/// Hyperparameter search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Exhaustive search over the full grid
    #[default]
    Grid,
    /// A fixed number of seeded draws from the grid
    Random,
    /// Score every candidate on the first fold, keep the top third, then
    /// run full cross-validation on the survivors
    Pruned,
}

/// Metric used to select the winning configuration during search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMetric {
    Accuracy,
    #[serde(alias = "precision_weighted")]
    Precision,
    #[serde(alias = "recall_weighted")]
    Recall,
    #[default]
    #[serde(alias = "f1_weighted")]
    F1,
    #[serde(alias = "roc_auc_weighted")]
    RocAuc,
}

/// Configuration for a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// The subset of the registry to train.
    pub models: Vec<ModelKind>,

    /// Search strategy over each model's grid.
    pub search: SearchStrategy,

    /// Requested cross-validation fold count. Silently reduced to the
    /// smallest class's sample count when that is lower.
    pub cv_folds: usize,

    /// Metric the search optimizes.
    pub scoring: ScoringMetric,

    /// Balance class weights by inverse frequency for models that support it.
    pub class_weight_auto: bool,

    /// Seed for fold assignment, random search and stochastic models.
    pub seed: u64,

    /// Number of draws used by [`SearchStrategy::Random`].
    pub random_iterations: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            models: vec![ModelKind::LogisticRegression, ModelKind::RandomForest],
            search: SearchStrategy::default(),
            cv_folds: 5,
            scoring: ScoringMetric::default(),
            class_weight_auto: true,
            seed: 42,
            random_iterations: 10,
        }
    }
}

impl TrainConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(LearningError::InvalidConfig(
                "At least one model must be selected".to_string(),
            ));
        }
        if self.cv_folds < 2 || self.cv_folds > 20 {
            return Err(LearningError::InvalidConfig(format!(
                "cv_folds must be between 2 and 20, got {}",
                self.cv_folds
            )));
        }
        if self.random_iterations == 0 {
            return Err(LearningError::InvalidConfig(
                "random_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

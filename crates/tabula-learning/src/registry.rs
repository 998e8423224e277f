//! The classifier registry.
//!
//! A fixed enumeration of model kinds assembled at startup, each tagged
//! available or unavailable. Unavailable kinds (boosted-tree variants that
//! would need external bindings) stay in the enumeration so requests for
//! them produce a per-model error record rather than a batch failure.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Hyperparameter assignment for one candidate configuration.
pub type ParamMap = HashMap<String, Value>;

/// Every classifier kind the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "Rule-Based")]
    MajorityBaseline,
    #[serde(rename = "Logistic Regression")]
    LogisticRegression,
    #[serde(rename = "K-Neighbors")]
    KNearestNeighbors,
    #[serde(rename = "Decision Tree")]
    DecisionTree,
    #[serde(rename = "Naive Bayes")]
    GaussianNaiveBayes,
    #[serde(rename = "Random Forest")]
    RandomForest,
    #[serde(rename = "SVM")]
    LinearSvm,
    #[serde(rename = "Gradient Boosting")]
    GradientBoosting,
    #[serde(rename = "Extra Trees")]
    ExtraTrees,
    #[serde(rename = "XGBoost")]
    XgBoost,
    #[serde(rename = "LightGBM")]
    LightGbm,
}

impl ModelKind {
    /// All kinds, in registry order.
    pub fn all() -> &'static [ModelKind] {
        &[
            ModelKind::MajorityBaseline,
            ModelKind::LogisticRegression,
            ModelKind::KNearestNeighbors,
            ModelKind::DecisionTree,
            ModelKind::GaussianNaiveBayes,
            ModelKind::RandomForest,
            ModelKind::LinearSvm,
            ModelKind::GradientBoosting,
            ModelKind::ExtraTrees,
            ModelKind::XgBoost,
            ModelKind::LightGbm,
        ]
    }

    /// Display name, as shown in comparison tables.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MajorityBaseline => "Rule-Based",
            Self::LogisticRegression => "Logistic Regression",
            Self::KNearestNeighbors => "K-Neighbors",
            Self::DecisionTree => "Decision Tree",
            Self::GaussianNaiveBayes => "Naive Bayes",
            Self::RandomForest => "Random Forest",
            Self::LinearSvm => "SVM",
            Self::GradientBoosting => "Gradient Boosting",
            Self::ExtraTrees => "Extra Trees",
            Self::XgBoost => "XGBoost",
            Self::LightGbm => "LightGBM",
        }
    }

    /// Whether a compiled-in implementation backs this kind.
    ///
    /// `XgBoost` and `LightGbm` are enumerated for API compatibility but no
    /// bindings are compiled in; requesting them yields a per-model error
    /// record.
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::XgBoost | Self::LightGbm)
    }

    /// The hyperparameter grid searched for this kind.
    ///
    /// Keys are parameter names, values are the candidate lists. An empty
    /// grid means the model has a single (default) configuration.
    pub fn param_grid(&self) -> HashMap<&'static str, Vec<Value>> {
        match self {
            Self::MajorityBaseline | Self::GaussianNaiveBayes => HashMap::new(),
            Self::LogisticRegression => HashMap::from([(
                "C",
                vec![json!(0.01), json!(0.1), json!(1.0), json!(10.0)],
            )]),
            Self::KNearestNeighbors => HashMap::from([
                ("n_neighbors", vec![json!(3), json!(5), json!(7)]),
                ("weights", vec![json!("uniform"), json!("distance")]),
            ]),
            Self::DecisionTree => HashMap::from([
                ("max_depth", vec![Value::Null, json!(10), json!(20)]),
                ("min_samples_split", vec![json!(2), json!(5), json!(10)]),
            ]),
            Self::RandomForest => HashMap::from([
                ("n_estimators", vec![json!(50), json!(100), json!(200)]),
                ("max_depth", vec![Value::Null, json!(10), json!(20)]),
            ]),
            Self::LinearSvm => {
                HashMap::from([("C", vec![json!(0.1), json!(1.0), json!(10.0)])])
            }
            Self::GradientBoosting => HashMap::from([
                ("n_estimators", vec![json!(50), json!(100)]),
                ("learning_rate", vec![json!(0.01), json!(0.1)]),
                ("max_depth", vec![json!(3), json!(5)]),
            ]),
            Self::ExtraTrees => HashMap::from([
                ("n_estimators", vec![json!(50), json!(100)]),
                ("max_depth", vec![Value::Null, json!(10)]),
            ]),
            Self::XgBoost | Self::LightGbm => HashMap::new(),
        }
    }

    /// Expand the grid into the full list of candidate configurations.
    ///
    /// The cartesian product in a stable order: parameter names sorted, the
    /// first name varying slowest. An empty grid yields one empty candidate.
    pub fn expand_grid(&self) -> Vec<ParamMap> {
        let grid = self.param_grid();
        let mut names: Vec<&str> = grid.keys().copied().collect();
        names.sort_unstable();

        let mut candidates: Vec<ParamMap> = vec![ParamMap::new()];
        for name in names {
            let values = &grid[name];
            let mut next = Vec::with_capacity(candidates.len() * values.len());
            for candidate in &candidates {
                for value in values {
                    let mut expanded = candidate.clone();
                    expanded.insert(name.to_string(), value.clone());
                    next.push(expanded);
                }
            }
            candidates = next;
        }
        candidates
    }
}

/// Parse a display name back into a kind (the inverse of `display_name`).
impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ModelKind::all()
            .iter()
            .copied()
            .find(|kind| kind.display_name() == s)
            .ok_or_else(|| format!("Unknown model: '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_availability_tags() {
        assert!(ModelKind::RandomForest.is_available());
        assert!(ModelKind::MajorityBaseline.is_available());
        assert!(!ModelKind::XgBoost.is_available());
        assert!(!ModelKind::LightGbm.is_available());
    }

    #[test]
    fn test_expand_grid_cartesian_product() {
        let candidates = ModelKind::KNearestNeighbors.expand_grid();
        // 3 neighbor counts x 2 weight modes
        assert_eq!(candidates.len(), 6);
        assert!(candidates
            .iter()
            .any(|c| c["n_neighbors"] == json!(7) && c["weights"] == json!("distance")));
    }

    #[test]
    fn test_empty_grid_yields_single_candidate() {
        let candidates = ModelKind::GaussianNaiveBayes.expand_grid();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].is_empty());
    }

    #[test]
    fn test_display_name_round_trip() {
        for kind in ModelKind::all() {
            let parsed: ModelKind = kind.display_name().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
        assert!("Quantum Forest".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&ModelKind::LogisticRegression).unwrap();
        assert_eq!(json, "\"Logistic Regression\"");
        let kind: ModelKind = serde_json::from_str("\"Random Forest\"").unwrap();
        assert_eq!(kind, ModelKind::RandomForest);
    }
}

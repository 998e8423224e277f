//! Hyperparameter search and evaluation.
//!
//! Trains a requested subset of the registry with grid, random or pruned
//! search under stratified cross-validation, then evaluates each winner on
//! the holdout set. Models run in parallel and fail independently: one
//! model's error becomes its report's `error` field, never a batch failure.

use crate::config::{ScoringMetric, SearchStrategy, TrainConfig};
use crate::error::{LearningError, Result};
use crate::metrics::{
    accuracy, confusion_matrix, default_averaging, precision_recall_f1, roc_auc_binary,
    roc_auc_weighted_ovr,
};
use crate::models::{build_model, ModelOptions};
use crate::registry::{ModelKind, ParamMap};
use crate::types::{ModelReport, SearchOutcome};
use ndarray::{Array2, Axis};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::Instant;
use tabula_processing::utils::string_labels;
use tabula_processing::TransformSpec;
use tracing::{debug, warn};

/// Convert an all-numeric feature table into a dense matrix.
fn feature_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let (n, d) = (df.height(), df.width());
    if d == 0 {
        return Err(LearningError::InvalidData(
            "No feature columns available for training".to_string(),
        ));
    }
    let mut matrix = Array2::zeros((n, d));
    for (j, column) in df.get_columns().iter().enumerate() {
        let name = column.name().to_string();
        let series = column
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|_| {
                LearningError::InvalidData(format!(
                    "Feature column '{name}' is not numeric; run preprocessing first"
                ))
            })?;
        for (i, value) in series
            .f64()
            .map_err(|e| LearningError::InvalidData(e.to_string()))?
            .into_iter()
            .enumerate()
        {
            match value {
                Some(v) => matrix[[i, j]] = v,
                None => {
                    return Err(LearningError::InvalidData(format!(
                        "Feature column '{name}' contains missing values; impute them first"
                    )))
                }
            }
        }
    }
    Ok(matrix)
}

fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    df.take(&IdxCa::from_vec("idx".into(), idx))
        .map_err(|e| LearningError::InvalidData(e.to_string()))
}

fn select_rows(matrix: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    matrix.select(Axis(0), indices)
}

/// Stratified fold assignment: per class, shuffle and deal round-robin.
fn stratified_fold_assignments(
    y: &[usize],
    n_classes: usize,
    n_folds: usize,
    seed: u64,
) -> Vec<usize> {
    let mut assignments = vec![0usize; y.len()];
    let mut rng = StdRng::seed_from_u64(seed);
    for class in 0..n_classes {
        let mut indices: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(&mut rng);
        for (position, &i) in indices.iter().enumerate() {
            assignments[i] = position % n_folds;
        }
    }
    assignments
}

/// Engine-internal view of the training problem.
struct EngineData {
    /// Present when a transform must be refit inside every fold.
    train_frames: Option<(DataFrame, TransformSpec)>,
    train_matrix: Array2<f64>,
    test_matrix: Array2<f64>,
    y_train: Vec<usize>,
    y_test: Vec<usize>,
    n_classes: usize,
    /// Class indices present in the training labels.
    known_classes: HashSet<usize>,
}

impl EngineData {
    /// Train/validation matrices for one fold. With a transform present,
    /// the transform is refit on the fold's training slice so nothing from
    /// the validation slice leaks into imputation/scaling/encoding.
    fn fold_matrices(
        &self,
        train_idx: &[usize],
        valid_idx: &[usize],
    ) -> Result<(Array2<f64>, Array2<f64>)> {
        match &self.train_frames {
            None => Ok((
                select_rows(&self.train_matrix, train_idx),
                select_rows(&self.train_matrix, valid_idx),
            )),
            Some((features, spec)) => {
                let train_df = take_rows(features, train_idx)?;
                let valid_df = take_rows(features, valid_idx)?;
                let fitted = spec.fit(&train_df)?;
                Ok((
                    feature_matrix(&fitted.apply(&train_df)?)?,
                    feature_matrix(&fitted.apply(&valid_df)?)?,
                ))
            }
        }
    }
}

fn score_metric(
    metric: ScoringMetric,
    y_true: &[usize],
    y_pred: &[usize],
    scores: &Array2<f64>,
    n_classes: usize,
    known: &HashSet<usize>,
) -> f64 {
    match metric {
        ScoringMetric::Accuracy => accuracy(y_true, y_pred),
        ScoringMetric::Precision => {
            precision_recall_f1(y_true, y_pred, n_classes, default_averaging(n_classes)).0
        }
        ScoringMetric::Recall => {
            precision_recall_f1(y_true, y_pred, n_classes, default_averaging(n_classes)).1
        }
        ScoringMetric::F1 => {
            precision_recall_f1(y_true, y_pred, n_classes, default_averaging(n_classes)).2
        }
        ScoringMetric::RocAuc => {
            if n_classes == 2 {
                let positive: Vec<bool> = y_true.iter().map(|&t| t == 1).collect();
                let col: Vec<f64> = scores.column(1).iter().copied().collect();
                roc_auc_binary(&positive, &col).unwrap_or(0.0)
            } else {
                roc_auc_weighted_ovr(y_true, &scores.view(), known).unwrap_or(0.0)
            }
        }
    }
}

/// Score one candidate configuration on one fold.
fn fold_score(
    kind: ModelKind,
    params: &ParamMap,
    data: &EngineData,
    folds: &[usize],
    fold: usize,
    config: &TrainConfig,
) -> Result<f64> {
    let train_idx: Vec<usize> = (0..data.y_train.len())
        .filter(|&i| folds[i] != fold)
        .collect();
    let valid_idx: Vec<usize> = (0..data.y_train.len())
        .filter(|&i| folds[i] == fold)
        .collect();
    let (x_train, x_valid) = data.fold_matrices(&train_idx, &valid_idx)?;
    let y_train: Vec<usize> = train_idx.iter().map(|&i| data.y_train[i]).collect();
    let y_valid: Vec<usize> = valid_idx.iter().map(|&i| data.y_train[i]).collect();

    let options = ModelOptions {
        seed: config.seed,
        class_weight_auto: config.class_weight_auto,
    };
    let mut model = build_model(kind, params, &options)?;
    model.fit(x_train.view(), &y_train, data.n_classes)?;
    let scores = model.predict_scores(x_valid.view())?;
    let y_pred = model.predict(x_valid.view())?;
    Ok(score_metric(
        config.scoring,
        &y_valid,
        &y_pred,
        &scores,
        data.n_classes,
        &data.known_classes,
    ))
}

/// Full cross-validation of one candidate: per-fold scores.
fn cross_validate(
    kind: ModelKind,
    params: &ParamMap,
    data: &EngineData,
    folds: &[usize],
    n_folds: usize,
    config: &TrainConfig,
) -> Result<Vec<f64>> {
    (0..n_folds)
        .map(|fold| fold_score(kind, params, data, folds, fold, config))
        .collect()
}

/// Apply the search strategy to the candidate list.
fn select_candidates(
    kind: ModelKind,
    data: &EngineData,
    folds: &[usize],
    config: &TrainConfig,
) -> Vec<ParamMap> {
    let mut candidates = kind.expand_grid();
    match config.search {
        SearchStrategy::Grid => candidates,
        SearchStrategy::Random => {
            if candidates.len() > config.random_iterations {
                let mut rng = StdRng::seed_from_u64(config.seed);
                candidates.shuffle(&mut rng);
                candidates.truncate(config.random_iterations);
            }
            candidates
        }
        SearchStrategy::Pruned => {
            if candidates.len() <= 1 {
                return candidates;
            }
            // Cheap pass on the first fold only, then keep the top third.
            let mut scored: Vec<(f64, ParamMap)> = candidates
                .into_iter()
                .map(|params| {
                    let score = fold_score(kind, &params, data, folds, 0, config)
                        .unwrap_or(f64::NEG_INFINITY);
                    (score, params)
                })
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            let keep = (scored.len() + 2) / 3;
            scored.truncate(keep.max(1));
            scored.into_iter().map(|(_, params)| params).collect()
        }
    }
}

/// Search one model's grid, refit the winner and evaluate on the holdout.
fn search_one_model(
    kind: ModelKind,
    data: &EngineData,
    folds: &[usize],
    n_folds: usize,
    config: &TrainConfig,
) -> ModelReport {
    let name = kind.display_name();
    let start = Instant::now();

    if !kind.is_available() {
        return ModelReport::failed(
            name,
            n_folds,
            start.elapsed().as_secs_f64(),
            "model is not available in this build",
        );
    }

    let candidates = select_candidates(kind, data, folds, config);
    let mut best: Option<(ParamMap, Vec<f64>)> = None;
    let mut best_mean = f64::NEG_INFINITY;
    let mut first_error: Option<String> = None;
    for params in candidates {
        match cross_validate(kind, &params, data, folds, n_folds, config) {
            Ok(scores) => {
                let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                if mean > best_mean {
                    best_mean = mean;
                    best = Some((params, scores));
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                }
            }
        }
    }

    let Some((best_params, fold_scores)) = best else {
        let reason =
            first_error.unwrap_or_else(|| "no viable hyperparameter configuration".to_string());
        warn!(model = name, %reason, "model search failed");
        return ModelReport::failed(name, n_folds, start.elapsed().as_secs_f64(), reason);
    };
    let cv_mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
    let cv_std = (fold_scores
        .iter()
        .map(|s| (s - cv_mean).powi(2))
        .sum::<f64>()
        / fold_scores.len() as f64)
        .sqrt();

    debug!(model = name, cv_mean, "winning configuration selected");

    // Refit the winner on the full training data and score the holdout.
    let options = ModelOptions {
        seed: config.seed,
        class_weight_auto: config.class_weight_auto,
    };
    let evaluated = build_model(kind, &best_params, &options).and_then(|mut model| {
        model.fit(data.train_matrix.view(), &data.y_train, data.n_classes)?;
        let scores = model.predict_scores(data.test_matrix.view())?;
        let y_pred = model.predict(data.test_matrix.view())?;
        Ok((scores, y_pred))
    });

    let mut report = ModelReport {
        model: name.to_string(),
        best_params,
        training_time: 0.0,
        cv_mean: Some(cv_mean),
        cv_std: Some(cv_std),
        cv_folds: n_folds,
        accuracy: None,
        precision: None,
        recall: None,
        f1_score: None,
        roc_auc: None,
        confusion_matrix: None,
        error: None,
    };
    match evaluated {
        Ok((scores, y_pred)) => {
            let averaging = default_averaging(data.n_classes);
            let (precision, recall, f1) =
                precision_recall_f1(&data.y_test, &y_pred, data.n_classes, averaging);
            report.accuracy = Some(accuracy(&data.y_test, &y_pred));
            report.precision = Some(precision);
            report.recall = Some(recall);
            report.f1_score = Some(f1);
            report.roc_auc = if data.n_classes == 2 {
                let positive: Vec<bool> = data.y_test.iter().map(|&t| t == 1).collect();
                let col: Vec<f64> = scores.column(1).iter().copied().collect();
                roc_auc_binary(&positive, &col)
            } else {
                roc_auc_weighted_ovr(&data.y_test, &scores.view(), &data.known_classes)
            };
            report.confusion_matrix = Some(confusion_matrix(
                &data.y_test,
                &y_pred,
                data.n_classes,
            ));
        }
        Err(e) => {
            warn!(model = name, error = %e, "holdout evaluation failed");
            report.error = Some(e.to_string());
        }
    }
    report.training_time = start.elapsed().as_secs_f64();
    report
}

/// Drop rows whose target is null, returning the filtered frame.
fn drop_null_targets(df: &DataFrame, target_column: &str) -> Result<DataFrame> {
    let column = df
        .column(target_column)
        .map_err(|_| LearningError::InvalidData(format!("Target column '{target_column}' not found")))?;
    let series = column.as_materialized_series();
    if series.null_count() == 0 {
        return Ok(df.clone());
    }
    let keep: BooleanChunked = series.is_not_null();
    df.filter(&keep)
        .map_err(|e| LearningError::InvalidData(e.to_string()))
}

/// Train the requested models and evaluate them on the holdout set.
///
/// `train` and `test` both carry the target column. When `transform` is
/// supplied, it is refit inside every cross-validation fold and once on the
/// full training slice for the holdout evaluation; otherwise the feature
/// columns must already be numeric.
pub fn run_search(
    train: &DataFrame,
    test: &DataFrame,
    target_column: &str,
    config: &TrainConfig,
    transform: Option<&TransformSpec>,
) -> Result<SearchOutcome> {
    config.validate()?;

    let train = drop_null_targets(train, target_column)?;
    let test = drop_null_targets(test, target_column)?;
    if train.height() == 0 {
        return Err(LearningError::InvalidData(
            "training set has no labeled rows".to_string(),
        ));
    }

    let target_labels = |df: &DataFrame| -> Result<Vec<String>> {
        let column = df.column(target_column).map_err(|_| {
            LearningError::InvalidData(format!("Target column '{target_column}' not found"))
        })?;
        Ok(string_labels(column.as_materialized_series())
            .map_err(|e| LearningError::InvalidData(e.to_string()))?
            .into_iter()
            .flatten()
            .collect())
    };
    let train_labels = target_labels(&train)?;
    let test_labels = target_labels(&test)?;

    let mut classes: Vec<String> = train_labels
        .iter()
        .chain(test_labels.iter())
        .cloned()
        .collect();
    classes.sort();
    classes.dedup();

    // classes is sorted and contains every label by construction.
    let index_of = |label: &String| classes.binary_search(label).unwrap_or_default();
    let y_train: Vec<usize> = train_labels.iter().map(index_of).collect();
    let y_test: Vec<usize> = test_labels.iter().map(index_of).collect();
    let known_classes: HashSet<usize> = y_train.iter().copied().collect();
    if known_classes.len() < 2 {
        return Err(LearningError::InvalidData(
            "Target must have at least 2 classes for classification training".to_string(),
        ));
    }

    // Fold clamp: never ask for more folds than the smallest class can fill.
    let mut class_counts = vec![0usize; classes.len()];
    for &label in &y_train {
        class_counts[label] += 1;
    }
    let min_class_count = class_counts
        .iter()
        .copied()
        .filter(|&c| c > 0)
        .min()
        .unwrap_or(0);
    let effective_cv = config.cv_folds.min(min_class_count);
    if effective_cv < 2 {
        return Err(LearningError::InsufficientSamples);
    }
    if effective_cv < config.cv_folds {
        debug!(
            requested = config.cv_folds,
            effective = effective_cv,
            "reduced cross-validation folds to the smallest class count"
        );
    }

    let x_train = train
        .drop(target_column)
        .map_err(|e| LearningError::InvalidData(e.to_string()))?;
    let x_test = test
        .drop(target_column)
        .map_err(|e| LearningError::InvalidData(e.to_string()))?;

    let data = match transform {
        None => EngineData {
            train_matrix: feature_matrix(&x_train)?,
            test_matrix: feature_matrix(&x_test)?,
            train_frames: None,
            y_train,
            y_test,
            n_classes: classes.len(),
            known_classes,
        },
        Some(spec) => {
            let fitted = spec.fit(&x_train)?;
            EngineData {
                train_matrix: feature_matrix(&fitted.apply(&x_train)?)?,
                test_matrix: feature_matrix(&fitted.apply(&x_test)?)?,
                train_frames: Some((x_train, spec.clone())),
                y_train,
                y_test,
                n_classes: classes.len(),
                known_classes,
            }
        }
    };

    let folds = stratified_fold_assignments(
        &data.y_train,
        data.n_classes,
        effective_cv,
        config.seed,
    );

    let reports: Vec<ModelReport> = config
        .models
        .par_iter()
        .map(|&kind| search_one_model(kind, &data, &folds, effective_cv, config))
        .collect();

    Ok(SearchOutcome {
        classes,
        effective_cv,
        reports,
    })
}

//! Stacked generalization over heterogeneous base learners.
//!
//! Each base learner contributes out-of-fold probabilities from stratified
//! k-fold cross-validation; a logistic regression fitted on those columns
//! becomes the meta learner. Base learners are then refitted on all rows.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::learn::{
    FitError, ProbabilisticClassifier, TrainingSet, bagging::BaggedLogistic, bayes::GaussianNb,
    derive_seed, linear::LogisticRegression, neighbors::NearestNeighbors, tree::DecisionTree,
};

/// One configured base learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearnerKind
{
    Logistic
    {
        l2: f64,
        epochs: usize,
    },
    BaggedLogistic
    {
        estimators: usize,
        max_samples: f64,
        max_features: f64,
    },
    NearestNeighbors
    {
        k: usize,
    },
    DecisionTree
    {
        max_depth: usize,
        min_samples_leaf: usize,
    },
    GaussianNb,
}

impl LearnerKind
{
    pub fn build(
        &self,
        seed: u64,
    ) -> Box<dyn ProbabilisticClassifier>
    {
        match self
        {
            Self::Logistic { l2, epochs } => Box::new(LogisticRegression::new(*l2, *epochs)),
            Self::BaggedLogistic { estimators, max_samples, max_features } =>
            {
                Box::new(BaggedLogistic::new(*estimators, *max_samples, *max_features, seed))
            }
            Self::NearestNeighbors { k } => Box::new(NearestNeighbors::new(*k)),
            Self::DecisionTree { max_depth, min_samples_leaf } =>
            {
                Box::new(DecisionTree::new(*max_depth, *min_samples_leaf))
            }
            Self::GaussianNb => Box::new(GaussianNb::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig
{
    /// Upper bound on cross-validation folds for the meta features
    pub folds: usize,
    pub learners: Vec<LearnerKind>,
}

impl Default for EnsembleConfig
{
    fn default() -> Self
    {
        Self {
            folds: 5,
            learners: vec![
                LearnerKind::BaggedLogistic { estimators: 10, max_samples: 0.75, max_features: 0.75 },
                LearnerKind::NearestNeighbors { k: 5 },
                LearnerKind::DecisionTree { max_depth: 6, min_samples_leaf: 2 },
                LearnerKind::GaussianNb,
                LearnerKind::Logistic { l2: 1e-2, epochs: 300 },
            ],
        }
    }
}

/// Fitted base learners plus the meta learner on their probabilities.
#[derive(Debug)]
pub struct StackedEnsemble
{
    base: Vec<Box<dyn ProbabilisticClassifier>>,
    meta: LogisticRegression,
}

/// Assign each row a fold so every fold gets a share of both classes.
fn stratified_folds(
    labels: &[bool],
    folds: usize,
    seed: u64,
) -> Vec<usize>
{
    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0; labels.len()];

    for class in [true, false]
    {
        let mut idx: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(&mut rng);
        for (slot, i) in idx
            .into_iter()
            .enumerate()
        {
            assignment[i] = slot % folds;
        }
    }
    assignment
}

/// Out-of-fold probabilities of one learner kind.
fn out_of_fold(
    kind: &LearnerKind,
    data: &TrainingSet<'_>,
    assignment: &[usize],
    folds: usize,
    seed: u64,
    learner: usize,
) -> Result<Vec<f64>, FitError>
{
    let mut column = vec![0.0; data.len()];
    for fold in 0..folds
    {
        let (held, kept): (Vec<usize>, Vec<usize>) = (0..data.len()).partition(|i| assignment[*i] == fold);

        let mut model = kind.build(derive_seed(seed, &[learner as u64, fold as u64]));
        model.fit(&data.subset(&kept))?;
        for i in held
        {
            column[i] = model.predict_proba(data.rows()[i]);
        }
    }
    Ok(column)
}

impl StackedEnsemble
{
    pub fn fit(
        config: &EnsembleConfig,
        data: &TrainingSet<'_>,
        seed: u64,
    ) -> Result<Self, FitError>
    {
        data.require_both_classes()?;
        if config
            .learners
            .is_empty()
        {
            return Err(FitError::Degenerate("ensemble has no base learners".into()));
        }

        let minority = data
            .positives()
            .min(data.len() - data.positives());
        let folds = config
            .folds
            .min(minority);
        if folds < 2
        {
            return Err(FitError::Degenerate(format!(
                "minority class has {minority} rows, need at least 2 for cross-validation"
            )));
        }

        let assignment = stratified_folds(data.labels(), folds, derive_seed(seed, &[u64::MAX]));
        debug!(rows = data.len(), folds, learners = config.learners.len(), "fitting stack");

        let columns: Vec<Vec<f64>> = config
            .learners
            .par_iter()
            .enumerate()
            .map(|(j, kind)| out_of_fold(kind, data, &assignment, folds, seed, j))
            .collect::<Result<_, _>>()?;

        let meta_rows: Vec<Vec<f32>> = (0..data.len())
            .map(|i| {
                columns
                    .iter()
                    .map(|c| c[i] as f32)
                    .collect()
            })
            .collect();
        let meta_set = TrainingSet::new(
            meta_rows
                .iter()
                .map(|r| r.as_slice())
                .collect(),
            data.labels()
                .to_vec(),
        )?;
        let mut meta = LogisticRegression::default();
        meta.fit(&meta_set)?;

        let base = config
            .learners
            .par_iter()
            .enumerate()
            .map(|(j, kind)| {
                let mut model = kind.build(derive_seed(seed, &[j as u64, folds as u64]));
                model.fit(data)?;
                Ok(model)
            })
            .collect::<Result<Vec<_>, FitError>>()?;

        Ok(Self { base, meta })
    }

    /// Base learner names in stacking order.
    pub fn learner_names(&self) -> Vec<&'static str>
    {
        self.base
            .iter()
            .map(|m| m.name())
            .collect()
    }

    pub fn predict_proba(
        &self,
        row: &[f32],
    ) -> f64
    {
        let meta_row: Vec<f32> = self
            .base
            .iter()
            .map(|m| m.predict_proba(row) as f32)
            .collect();
        self.meta
            .predict_proba(&meta_row)
    }

    pub fn predict_proba_batch(
        &self,
        rows: &[&[f32]],
    ) -> Vec<f64>
    {
        rows.par_iter()
            .map(|r| self.predict_proba(r))
            .collect()
    }
}

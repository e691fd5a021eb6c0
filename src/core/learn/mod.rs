//! Semi-supervised topic classification.
//!
//! Base learners share one seam, [`ProbabilisticClassifier`]; the stacking
//! ensemble combines them and the self-training loop drives rounds of
//! fit / score / promote over a [`LabeledCorpus`](self_training::LabeledCorpus).

pub mod bagging;
pub mod bayes;
pub mod ensemble;
pub mod linear;
pub mod metrics;
pub mod neighbors;
pub mod self_training;
pub mod tree;

pub use ensemble::{EnsembleConfig, LearnerKind, StackedEnsemble};
pub use metrics::{ClassMetrics, ClassificationReport};
pub use self_training::{
    LabeledCorpus, LabeledSample, RoundReport, SelfTrainingLoop, ShortfallPolicy, TrainingConfig,
    TrainingOutcome, UnlabeledSample,
};

use thiserror::Error;

use crate::core::post::Label;

/// Why a model could not be fitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError
{
    #[error("training set is empty")]
    Empty,

    #[error("training set only contains label {0}")]
    SingleClass(Label),

    #[error("{rows} rows but {labels} labels")]
    LengthMismatch
    {
        rows: usize,
        labels: usize,
    },

    #[error("row {row} has {actual} features, expected {expected}")]
    Dimension
    {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{0}")]
    Degenerate(String),
}

/// Borrowed feature rows with binary targets.
#[derive(Debug, Clone)]
pub struct TrainingSet<'a>
{
    rows: Vec<&'a [f32]>,
    labels: Vec<bool>,
}

impl<'a> TrainingSet<'a>
{
    /// Validate shape: non-empty, one label per row, one dimension.
    pub fn new(
        rows: Vec<&'a [f32]>,
        labels: Vec<bool>,
    ) -> Result<Self, FitError>
    {
        if rows.len() != labels.len()
        {
            return Err(FitError::LengthMismatch { rows: rows.len(), labels: labels.len() });
        }
        let Some(first) = rows.first()
        else
        {
            return Err(FitError::Empty);
        };

        let expected = first.len();
        if let Some((row, r)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != expected)
        {
            return Err(FitError::Dimension { row, expected, actual: r.len() });
        }

        Ok(Self { rows, labels })
    }

    pub fn len(&self) -> usize
    {
        self.rows
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.rows
            .is_empty()
    }

    pub fn dimension(&self) -> usize
    {
        self.rows
            .first()
            .map_or(0, |r| r.len())
    }

    pub fn rows(&self) -> &[&'a [f32]]
    {
        &self.rows
    }

    pub fn labels(&self) -> &[bool]
    {
        &self.labels
    }

    pub fn positives(&self) -> usize
    {
        self.labels
            .iter()
            .filter(|l| **l)
            .count()
    }

    /// Error unless both classes are present.
    pub fn require_both_classes(&self) -> Result<(), FitError>
    {
        let pos = self.positives();
        if pos == 0
        {
            return Err(FitError::SingleClass(Label::Negative));
        }
        if pos == self.len()
        {
            return Err(FitError::SingleClass(Label::Positive));
        }
        Ok(())
    }

    /// Rows at `idx`, in that order.
    pub fn subset(
        &self,
        idx: &[usize],
    ) -> TrainingSet<'a>
    {
        TrainingSet {
            rows: idx
                .iter()
                .map(|i| self.rows[*i])
                .collect(),
            labels: idx
                .iter()
                .map(|i| self.labels[*i])
                .collect(),
        }
    }
}

/// A binary classifier exposing P(label = 1).
pub trait ProbabilisticClassifier: Send + Sync + std::fmt::Debug
{
    /// Short identifier used in logs and reports
    fn name(&self) -> &'static str;

    fn fit(
        &mut self,
        data: &TrainingSet<'_>,
    ) -> Result<(), FitError>;

    /// Probability of the positive class, in `[0, 1]`.
    fn predict_proba(
        &self,
        row: &[f32],
    ) -> f64;
}

/// Mix a base seed with extra coordinates (splitmix64 finalizer).
pub fn derive_seed(
    seed: u64,
    parts: &[u64],
) -> u64
{
    let mut z = seed;
    for p in parts
    {
        z = z
            .wrapping_add(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(*p);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
    }
    z
}

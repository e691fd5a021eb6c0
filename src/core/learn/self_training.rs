//! Iterative pseudo-labeling over a fixed held-out set.
//!
//! Every round fits a [`StackedEnsemble`] on `train`, evaluates it on `test`,
//! scores `unlabeled` and moves the `k` most confident items of each class
//! into `train`. Promotions are irrevocable.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use indexmap::IndexMap;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::{
    error::PipelineError,
    learn::{
        ClassificationReport, EnsembleConfig, FitError, StackedEnsemble, TrainingSet, derive_seed,
    },
    post::{Embedding, Label, LabelSource, Post, PostId},
};

/// What to do when fewer than `2k` unlabeled items remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy
{
    /// Promote everything left, upper half by rank as positive
    #[default]
    PromoteRemaining,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig
{
    pub rounds: usize,
    /// Items promoted per class per round (`k`)
    pub per_class_quota: usize,
    /// Share of the gold set held out for evaluation
    pub test_fraction: f64,
    pub seed: u64,
    pub shortfall: ShortfallPolicy,
    pub ensemble: EnsembleConfig,
}

impl Default for TrainingConfig
{
    fn default() -> Self
    {
        Self {
            rounds: 10,
            per_class_quota: 100,
            test_fraction: 0.4,
            seed: 42,
            shortfall: ShortfallPolicy::default(),
            ensemble: EnsembleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample
{
    pub id: PostId,
    pub features: Embedding,
    pub label: Label,
    pub source: LabelSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnlabeledSample
{
    pub id: PostId,
    pub features: Embedding,
}

/// `train` / `test` / `unlabeled` partition of a corpus.
///
/// `test` is fixed at construction. Every set keeps relative corpus order.
#[derive(Debug, Clone, Default)]
pub struct LabeledCorpus
{
    train: Vec<LabeledSample>,
    test: Vec<LabeledSample>,
    unlabeled: Vec<UnlabeledSample>,
}

impl LabeledCorpus
{
    /// Labeled posts form the gold set, the rest are unlabeled.
    ///
    /// Every post needs an embedding.
    pub fn from_posts(
        posts: &[Post],
        test_fraction: f64,
        seed: u64,
    ) -> Result<Self, PipelineError>
    {
        let missing = posts
            .iter()
            .filter(|p| {
                p.embedding
                    .is_none()
            })
            .count();
        let mut gold = Vec::new();
        let mut unlabeled = Vec::new();

        for p in posts
        {
            let Some(features) = p
                .embedding
                .clone()
            else
            {
                return Err(PipelineError::MissingEmbedding { id: p.id, missing });
            };
            match p.label
            {
                Some(label) => gold.push(LabeledSample { id: p.id, features, label, source: LabelSource::Gold }),
                None => unlabeled.push(UnlabeledSample { id: p.id, features }),
            }
        }

        Self::split(gold, unlabeled, test_fraction, seed)
    }

    /// Hold out `test_fraction` of each gold class, chosen by a seeded shuffle.
    ///
    /// Every vector must share the dimension of the first one.
    pub fn split(
        gold: Vec<LabeledSample>,
        unlabeled: Vec<UnlabeledSample>,
        test_fraction: f64,
        seed: u64,
    ) -> Result<Self, PipelineError>
    {
        check_dimensions(
            gold.iter()
                .map(|s| (s.id, s.features.len()))
                .chain(
                    unlabeled
                        .iter()
                        .map(|s| (s.id, s.features.len())),
                ),
        )?;

        let fraction = test_fraction.clamp(0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut held = vec![false; gold.len()];

        for class in [Label::Positive, Label::Negative]
        {
            let mut idx: Vec<usize> = gold
                .iter()
                .enumerate()
                .filter(|(_, s)| s.label == class)
                .map(|(i, _)| i)
                .collect();
            idx.shuffle(&mut rng);
            let take = (idx.len() as f64 * fraction).round() as usize;
            for i in &idx[..take]
            {
                held[*i] = true;
            }
        }

        let (test, train): (Vec<_>, Vec<_>) = gold
            .into_iter()
            .zip(held)
            .partition(|(_, h)| *h);

        Ok(Self {
            train: train
                .into_iter()
                .map(|(s, _)| s)
                .collect(),
            test: test
                .into_iter()
                .map(|(s, _)| s)
                .collect(),
            unlabeled,
        })
    }

    pub fn train(&self) -> &[LabeledSample]
    {
        &self.train
    }

    pub fn test(&self) -> &[LabeledSample]
    {
        &self.test
    }

    pub fn unlabeled(&self) -> &[UnlabeledSample]
    {
        &self.unlabeled
    }

    /// Every known label (train then test), keyed by post ID.
    pub fn labels(&self) -> IndexMap<PostId, (Label, LabelSource)>
    {
        self.train
            .iter()
            .chain(&self.test)
            .map(|s| (s.id, (s.label, s.source)))
            .collect()
    }

    fn training_set(&self) -> Result<TrainingSet<'_>, FitError>
    {
        TrainingSet::new(
            self.train
                .iter()
                .map(|s| &*s.features)
                .collect(),
            self.train
                .iter()
                .map(|s| {
                    s.label
                        .is_positive()
                })
                .collect(),
        )
    }
}

/// First `(id, len)` whose length differs from the first entry's.
fn check_dimensions(mut lengths: impl Iterator<Item = (PostId, usize)>) -> Result<(), PipelineError>
{
    let Some((_, expected)) = lengths.next()
    else
    {
        return Ok(());
    };
    match lengths.find(|(_, len)| *len != expected)
    {
        Some((id, actual)) => Err(PipelineError::EmbeddingDimension { id, expected, actual }),
        None => Ok(()),
    }
}

/// Indices into the scored slice chosen for each pseudo-label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Promotion
{
    pub positive: Vec<usize>,
    pub negative: Vec<usize>,
}

/// Choose up to `k` items per class from P(label = 1) scores.
///
/// With at least `2k` scores: the `k` highest become positive, then the `k`
/// lowest of the rest become negative. With fewer, every item is promoted and
/// the upper half by rank (rounded up) is positive. Equal scores keep index
/// order.
pub fn plan_promotion(
    scores: &[f64],
    k: usize,
) -> Promotion
{
    let mut by_desc: Vec<usize> = (0..scores.len()).collect();
    by_desc.sort_by(|a, b| {
        scores[*b]
            .total_cmp(&scores[*a])
            .then(a.cmp(b))
    });

    if scores.len() < 2 * k
    {
        let upper = scores
            .len()
            .div_ceil(2);
        let negative = by_desc.split_off(upper);
        return Promotion { positive: by_desc, negative };
    }

    let mut rest = by_desc.split_off(k);
    rest.sort_by(|a, b| {
        scores[*a]
            .total_cmp(&scores[*b])
            .then(a.cmp(b))
    });
    rest.truncate(k);
    Promotion { positive: by_desc, negative: rest }
}

/// Diagnostics for one completed round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundReport
{
    pub round: usize,
    /// Sizes after promotion
    pub train_size: usize,
    pub unlabeled_size: usize,
    pub test_size: usize,
    pub promoted_positive: usize,
    pub promoted_negative: usize,
    /// Lowest probability among promoted positives
    pub positive_cutoff: Option<f64>,
    /// Highest probability among promoted negatives
    pub negative_cutoff: Option<f64>,
    pub evaluation: Option<ClassificationReport>,
}

#[derive(Debug)]
pub struct TrainingOutcome
{
    pub corpus: LabeledCorpus,
    pub model: StackedEnsemble,
    pub reports: Vec<RoundReport>,
}

#[derive(Debug)]
pub struct SelfTrainingLoop
{
    config: TrainingConfig,
    corpus: LabeledCorpus,
    reports: Vec<RoundReport>,
}

impl SelfTrainingLoop
{
    pub fn new(
        config: TrainingConfig,
        corpus: LabeledCorpus,
    ) -> Self
    {
        Self { config, corpus, reports: Vec::new() }
    }

    pub fn config(&self) -> &TrainingConfig
    {
        &self.config
    }

    pub fn corpus(&self) -> &LabeledCorpus
    {
        &self.corpus
    }

    pub fn reports(&self) -> &[RoundReport]
    {
        &self.reports
    }

    pub fn rounds_completed(&self) -> usize
    {
        self.reports
            .len()
    }

    pub fn is_done(&self) -> bool
    {
        self.rounds_completed() >= self.config.rounds
    }

    fn fit_model(
        &self,
        round: usize,
    ) -> Result<StackedEnsemble, PipelineError>
    {
        let failure = |e: FitError| PipelineError::FitFailure { round, reason: e.to_string() };
        let data = self
            .corpus
            .training_set()
            .map_err(failure)?;
        StackedEnsemble::fit(&self.config.ensemble, &data, derive_seed(self.config.seed, &[round as u64]))
            .map_err(failure)
    }

    /// Score the held-out set; diagnostic only.
    fn evaluate(
        &self,
        model: &StackedEnsemble,
    ) -> ClassificationReport
    {
        let rows: Vec<&[f32]> = self
            .corpus
            .test
            .iter()
            .map(|s| &*s.features)
            .collect();
        let predicted: Vec<bool> = model
            .predict_proba_batch(&rows)
            .into_iter()
            .map(|p| p >= 0.5)
            .collect();
        let truth: Vec<bool> = self
            .corpus
            .test
            .iter()
            .map(|s| {
                s.label
                    .is_positive()
            })
            .collect();
        ClassificationReport::from_predictions(&truth, &predicted)
    }

    /// Run one fit / evaluate / score / promote round.
    #[instrument(skip(self), fields(round = self.rounds_completed() + 1))]
    pub fn step(&mut self) -> Result<RoundReport, PipelineError>
    {
        let round = self.rounds_completed() + 1;
        let k = self.config.per_class_quota;
        let required = 2 * k;
        let available = self
            .corpus
            .unlabeled
            .len();

        if available == 0
            || (available < required && self.config.shortfall == ShortfallPolicy::Fail)
        {
            return Err(PipelineError::InsufficientData { round, available, required });
        }

        let model = self.fit_model(round)?;

        let evaluation = if self
            .corpus
            .test
            .is_empty()
        {
            None
        }
        else
        {
            Some(self.evaluate(&model))
        };

        let rows: Vec<&[f32]> = self
            .corpus
            .unlabeled
            .iter()
            .map(|s| &*s.features)
            .collect();
        let scores = model.predict_proba_batch(&rows);

        if available < required
        {
            warn!(available, required, "promoting every remaining item");
        }
        let plan = plan_promotion(&scores, k);
        let positive_cutoff = plan
            .positive
            .iter()
            .map(|i| scores[*i])
            .min_by(f64::total_cmp);
        let negative_cutoff = plan
            .negative
            .iter()
            .map(|i| scores[*i])
            .max_by(f64::total_cmp);

        let mut chosen: HashMap<usize, Label> = HashMap::new();
        chosen.extend(
            plan.positive
                .iter()
                .map(|i| (*i, Label::Positive)),
        );
        chosen.extend(
            plan.negative
                .iter()
                .map(|i| (*i, Label::Negative)),
        );

        let unlabeled = std::mem::take(&mut self.corpus.unlabeled);
        for (i, sample) in unlabeled
            .into_iter()
            .enumerate()
        {
            match chosen.get(&i)
            {
                Some(label) => self
                    .corpus
                    .train
                    .push(LabeledSample {
                        id: sample.id,
                        features: sample.features,
                        label: *label,
                        source: LabelSource::Pseudo { round },
                    }),
                None => self
                    .corpus
                    .unlabeled
                    .push(sample),
            }
        }

        let report = RoundReport {
            round,
            train_size: self.corpus.train.len(),
            unlabeled_size: self.corpus.unlabeled.len(),
            test_size: self.corpus.test.len(),
            promoted_positive: plan.positive.len(),
            promoted_negative: plan.negative.len(),
            positive_cutoff,
            negative_cutoff,
            evaluation,
        };

        info!(
            train = report.train_size,
            unlabeled = report.unlabeled_size,
            promoted_positive = report.promoted_positive,
            promoted_negative = report.promoted_negative,
            positive_cutoff = report.positive_cutoff,
            negative_cutoff = report.negative_cutoff,
            accuracy = report
                .evaluation
                .as_ref()
                .map(|e| e.accuracy),
            "round complete"
        );
        if let Some(eval) = &report.evaluation
        {
            for (label, m) in [(Label::Negative, &eval.negative), (Label::Positive, &eval.positive)]
            {
                info!(
                    label = %label,
                    precision = m.precision,
                    recall = m.recall,
                    f1 = m.f1,
                    support = m.support,
                    "held-out evaluation"
                );
            }
        }

        self.reports
            .push(report.clone());
        Ok(report)
    }

    /// Run remaining rounds, checking `stop` before each one.
    pub fn run_until(
        &mut self,
        stop: &AtomicBool,
    ) -> Result<(), PipelineError>
    {
        while !self.is_done()
        {
            if stop.load(Ordering::Relaxed)
            {
                info!(completed = self.rounds_completed(), "interrupted between rounds");
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    /// Fit the final model on the accumulated `train`.
    pub fn finish(self) -> Result<TrainingOutcome, PipelineError>
    {
        let model = self.fit_model(self.rounds_completed() + 1)?;
        Ok(TrainingOutcome { corpus: self.corpus, model, reports: self.reports })
    }

    pub fn run(mut self) -> Result<TrainingOutcome, PipelineError>
    {
        self.run_until(&AtomicBool::new(false))?;
        self.finish()
    }
}

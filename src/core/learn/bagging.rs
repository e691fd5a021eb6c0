//! Bootstrap aggregation of logistic regressions over row and feature samples.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::core::learn::{
    FitError, ProbabilisticClassifier, TrainingSet, derive_seed, linear::LogisticRegression,
};

/// Draws per estimator before settling for a constant prior.
const MAX_DRAWS: u64 = 8;

#[derive(Debug, Clone)]
enum Member
{
    Model
    {
        features: Vec<usize>,
        model: LogisticRegression,
    },
    Prior(f64),
}

#[derive(Debug, Clone)]
pub struct BaggedLogistic
{
    estimators: usize,
    max_samples: f64,
    max_features: f64,
    seed: u64,
    members: Vec<Member>,
}

impl BaggedLogistic
{
    pub fn new(
        estimators: usize,
        max_samples: f64,
        max_features: f64,
        seed: u64,
    ) -> Self
    {
        Self {
            estimators: estimators.max(1),
            max_samples: max_samples.clamp(f64::EPSILON, 1.0),
            max_features: max_features.clamp(f64::EPSILON, 1.0),
            seed,
            members: Vec::new(),
        }
    }

    pub fn len(&self) -> usize
    {
        self.members
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.members
            .is_empty()
    }

    fn fit_member(
        &self,
        data: &TrainingSet<'_>,
        index: usize,
    ) -> Member
    {
        let n = data.len();
        let d = data.dimension();
        let n_rows = ((n as f64 * self.max_samples).round() as usize).max(1);
        let n_feats = ((d as f64 * self.max_features).round() as usize).max(1);

        for draw in 0..MAX_DRAWS
        {
            let mut rng = StdRng::seed_from_u64(derive_seed(self.seed, &[index as u64, draw]));
            let rows: Vec<usize> = (0..n_rows)
                .map(|_| rng.random_range(0..n))
                .collect();
            let mut features: Vec<usize> = (0..n_feats)
                .map(|_| rng.random_range(0..d))
                .collect();
            features.sort_unstable();

            let projected: Vec<Vec<f32>> = rows
                .iter()
                .map(|i| {
                    features
                        .iter()
                        .map(|f| data.rows()[*i][*f])
                        .collect()
                })
                .collect();
            let labels: Vec<bool> = rows
                .iter()
                .map(|i| data.labels()[*i])
                .collect();

            let Ok(sample) = TrainingSet::new(
                projected
                    .iter()
                    .map(|r| r.as_slice())
                    .collect(),
                labels,
            )
            else
            {
                continue;
            };

            let mut model = LogisticRegression::default();
            if model
                .fit(&sample)
                .is_ok()
            {
                return Member::Model { features, model };
            }
        }

        Member::Prior(data.positives() as f64 / n as f64)
    }
}

impl ProbabilisticClassifier for BaggedLogistic
{
    fn name(&self) -> &'static str
    {
        "bagged_logistic"
    }

    fn fit(
        &mut self,
        data: &TrainingSet<'_>,
    ) -> Result<(), FitError>
    {
        data.require_both_classes()?;
        self.members = (0..self.estimators)
            .map(|i| self.fit_member(data, i))
            .collect();
        Ok(())
    }

    /// Mean of member probabilities.
    fn predict_proba(
        &self,
        row: &[f32],
    ) -> f64
    {
        if self
            .members
            .is_empty()
        {
            return 0.5;
        }

        let mut buf = Vec::new();
        let total: f64 = self
            .members
            .iter()
            .map(|m| match m
            {
                Member::Prior(p) => *p,
                Member::Model { features, model } =>
                {
                    buf.clear();
                    buf.extend(
                        features
                            .iter()
                            .map(|f| row[*f]),
                    );
                    model.predict_proba(&buf)
                }
            })
            .sum();
        total / self.members.len() as f64
    }
}

//! Gaussian naive Bayes.

use crate::core::learn::{FitError, ProbabilisticClassifier, TrainingSet};

/// Variance floor, as a fraction of the largest feature variance.
const VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
struct ClassStats
{
    log_prior: f64,
    mean: Vec<f64>,
    var: Vec<f64>,
}

impl ClassStats
{
    fn log_likelihood(
        &self,
        row: &[f32],
    ) -> f64
    {
        let mut ll = self.log_prior;
        for ((x, m), v) in row
            .iter()
            .zip(&self.mean)
            .zip(&self.var)
        {
            let d = f64::from(*x) - m;
            ll -= 0.5 * ((2.0 * std::f64::consts::PI * v).ln() + d * d / v);
        }
        ll
    }
}

#[derive(Debug, Clone, Default)]
pub struct GaussianNb
{
    negative: ClassStats,
    positive: ClassStats,
}

impl GaussianNb
{
    pub fn new() -> Self
    {
        Self::default()
    }
}

fn class_stats(
    rows: &[&[f32]],
    total: usize,
    d: usize,
) -> ClassStats
{
    let n = rows.len() as f64;
    let mut mean = vec![0.0; d];
    for r in rows
    {
        for (m, x) in mean
            .iter_mut()
            .zip(r.iter())
        {
            *m += f64::from(*x);
        }
    }
    mean.iter_mut()
        .for_each(|m| *m /= n);

    let mut var = vec![0.0; d];
    for r in rows
    {
        for ((v, m), x) in var
            .iter_mut()
            .zip(&mean)
            .zip(r.iter())
        {
            let dx = f64::from(*x) - m;
            *v += dx * dx;
        }
    }
    var.iter_mut()
        .for_each(|v| *v /= n);

    ClassStats { log_prior: (n / total as f64).ln(), mean, var }
}

impl ProbabilisticClassifier for GaussianNb
{
    fn name(&self) -> &'static str
    {
        "gaussian_nb"
    }

    fn fit(
        &mut self,
        data: &TrainingSet<'_>,
    ) -> Result<(), FitError>
    {
        data.require_both_classes()?;
        let d = data.dimension();

        let (pos, neg): (Vec<(&[f32], bool)>, Vec<(&[f32], bool)>) = data
            .rows()
            .iter()
            .copied()
            .zip(
                data.labels()
                    .iter()
                    .copied(),
            )
            .partition(|(_, l)| *l);
        let pos: Vec<&[f32]> = pos
            .into_iter()
            .map(|(r, _)| r)
            .collect();
        let neg: Vec<&[f32]> = neg
            .into_iter()
            .map(|(r, _)| r)
            .collect();

        let mut positive = class_stats(&pos, data.len(), d);
        let mut negative = class_stats(&neg, data.len(), d);

        let max_var = positive
            .var
            .iter()
            .chain(&negative.var)
            .fold(0.0f64, |a, b| a.max(*b));
        let eps = (VAR_SMOOTHING * max_var).max(1e-12);
        positive
            .var
            .iter_mut()
            .chain(
                negative
                    .var
                    .iter_mut(),
            )
            .for_each(|v| *v += eps);

        self.positive = positive;
        self.negative = negative;
        Ok(())
    }

    fn predict_proba(
        &self,
        row: &[f32],
    ) -> f64
    {
        let lp = self
            .positive
            .log_likelihood(row);
        let ln = self
            .negative
            .log_likelihood(row);

        // log-sum-exp over the two classes
        let m = lp.max(ln);
        let p = (lp - m).exp();
        let q = (ln - m).exp();
        p / (p + q)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::learn::testing::two_clusters;

    #[test]
    fn posterior_follows_cluster_membership()
    {
        let (rows, labels) = two_clusters(25, 2.0, 9);
        let refs: Vec<&[f32]> = rows
            .iter()
            .map(|r| r.as_slice())
            .collect();
        let set = TrainingSet::new(refs, labels).unwrap();

        let mut nb = GaussianNb::new();
        nb.fit(&set).unwrap();

        assert!(nb.predict_proba(&[2.0, 2.0]) > 0.95);
        assert!(nb.predict_proba(&[-2.0, -2.0]) < 0.05);
        let mid = nb.predict_proba(&[0.0, 0.0]);
        assert!((0.0..=1.0).contains(&mid));
    }
}

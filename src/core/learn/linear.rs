//! L2-regularized logistic regression on standardized features.

use crate::core::learn::{FitError, ProbabilisticClassifier, TrainingSet};

/// Per-feature mean/scale; constant features keep scale 1.
#[derive(Debug, Clone, Default)]
pub struct Standardizer
{
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer
{
    pub fn fit(rows: &[&[f32]]) -> Self
    {
        let d = rows
            .first()
            .map_or(0, |r| r.len());
        let n = rows.len().max(1) as f64;

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

        let scale = var
            .into_iter()
            .map(|v| {
                let s = (v / n).sqrt();
                if s > 1e-12 { s } else { 1.0 }
            })
            .collect();

        Self { mean, scale }
    }

    pub fn transform(
        &self,
        row: &[f32],
    ) -> Vec<f64>
    {
        row.iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((x, m), s)| (f64::from(*x) - m) / s)
            .collect()
    }
}

pub fn sigmoid(z: f64) -> f64
{
    if z >= 0.0
    {
        1.0 / (1.0 + (-z).exp())
    }
    else
    {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression
{
    l2: f64,
    learning_rate: f64,
    epochs: usize,
    scaler: Standardizer,
    weights: Vec<f64>,
    bias: f64,
}

impl Default for LogisticRegression
{
    fn default() -> Self
    {
        Self::new(1e-2, 300)
    }
}

impl LogisticRegression
{
    pub fn new(
        l2: f64,
        epochs: usize,
    ) -> Self
    {
        Self {
            l2,
            learning_rate: 0.5,
            epochs,
            scaler: Standardizer::default(),
            weights: Vec::new(),
            bias: 0.0,
        }
    }

    pub fn weights(&self) -> &[f64]
    {
        &self.weights
    }

    fn decision(
        &self,
        x: &[f64],
    ) -> f64
    {
        self.weights
            .iter()
            .zip(x)
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias
    }
}

impl ProbabilisticClassifier for LogisticRegression
{
    fn name(&self) -> &'static str
    {
        "logistic"
    }

    fn fit(
        &mut self,
        data: &TrainingSet<'_>,
    ) -> Result<(), FitError>
    {
        data.require_both_classes()?;

        self.scaler = Standardizer::fit(data.rows());
        let xs: Vec<Vec<f64>> = data
            .rows()
            .iter()
            .map(|r| {
                self.scaler
                    .transform(r)
            })
            .collect();
        let ys: Vec<f64> = data
            .labels()
            .iter()
            .map(|l| if *l { 1.0 } else { 0.0 })
            .collect();

        let d = data.dimension();
        let n = xs.len() as f64;
        self.weights = vec![0.0; d];
        self.bias = 0.0;

        let mut grad = vec![0.0; d];
        for _ in 0..self.epochs
        {
            grad.iter_mut()
                .for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (x, y) in xs
                .iter()
                .zip(&ys)
            {
                let err = sigmoid(self.decision(x)) - y;
                for (g, v) in grad
                    .iter_mut()
                    .zip(x)
                {
                    *g += err * v;
                }
                grad_b += err;
            }

            for (w, g) in self
                .weights
                .iter_mut()
                .zip(&grad)
            {
                *w -= self.learning_rate * (g / n + self.l2 * *w);
            }
            self.bias -= self.learning_rate * grad_b / n;
        }

        if self
            .weights
            .iter()
            .any(|w| !w.is_finite())
            || !self
                .bias
                .is_finite()
        {
            return Err(FitError::Degenerate("logistic regression diverged".into()));
        }
        Ok(())
    }

    fn predict_proba(
        &self,
        row: &[f32],
    ) -> f64
    {
        sigmoid(self.decision(&self.scaler.transform(row)))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::learn::testing::two_clusters;

    #[test]
    fn separates_two_clusters()
    {
        let (rows, labels) = two_clusters(30, 3.0, 1);
        let refs: Vec<&[f32]> = rows
            .iter()
            .map(|r| r.as_slice())
            .collect();
        let set = TrainingSet::new(refs, labels).unwrap();

        let mut lr = LogisticRegression::default();
        lr.fit(&set).unwrap();

        assert!(lr.predict_proba(&[3.0, 3.0]) > 0.9);
        assert!(lr.predict_proba(&[-3.0, -3.0]) < 0.1);
    }

    #[test]
    fn sigmoid_is_stable_at_extremes()
    {
        assert_eq!(sigmoid(-1000.0), 0.0);
        assert_eq!(sigmoid(1000.0), 1.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn standardizer_handles_constant_columns()
    {
        let a = [1.0f32, 5.0];
        let b = [3.0f32, 5.0];
        let s = Standardizer::fit(&[&a[..], &b[..]]);
        let t = s.transform(&[2.0, 5.0]);
        assert!(t[0].abs() < 1e-12);
        assert!(t[1].abs() < 1e-12);
    }
}

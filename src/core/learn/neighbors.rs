//! k-nearest neighbours under Manhattan distance.

use crate::core::learn::{FitError, ProbabilisticClassifier, TrainingSet};

#[derive(Debug, Clone)]
pub struct NearestNeighbors
{
    k: usize,
    rows: Vec<Vec<f32>>,
    labels: Vec<bool>,
}

impl NearestNeighbors
{
    pub fn new(k: usize) -> Self
    {
        Self { k: k.max(1), rows: Vec::new(), labels: Vec::new() }
    }
}

fn manhattan(
    a: &[f32],
    b: &[f32],
) -> f64
{
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from((x - y).abs()))
        .sum()
}

impl ProbabilisticClassifier for NearestNeighbors
{
    fn name(&self) -> &'static str
    {
        "knn"
    }

    fn fit(
        &mut self,
        data: &TrainingSet<'_>,
    ) -> Result<(), FitError>
    {
        data.require_both_classes()?;
        self.rows = data
            .rows()
            .iter()
            .map(|r| r.to_vec())
            .collect();
        self.labels = data
            .labels()
            .to_vec();
        Ok(())
    }

    /// Fraction of positives among the k closest rows; equal distances keep
    /// training order.
    fn predict_proba(
        &self,
        row: &[f32],
    ) -> f64
    {
        if self
            .rows
            .is_empty()
        {
            return 0.5;
        }

        let mut dist: Vec<(f64, usize)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (manhattan(r, row), i))
            .collect();
        dist.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.cmp(&b.1))
        });

        let k = self
            .k
            .min(dist.len());
        let pos = dist[..k]
            .iter()
            .filter(|(_, i)| self.labels[*i])
            .count();
        pos as f64 / k as f64
    }
}

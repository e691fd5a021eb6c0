//! Per-class precision / recall / F1 on a held-out set.

use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics
{
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationReport
{
    pub negative: ClassMetrics,
    pub positive: ClassMetrics,
    pub accuracy: f64,
}

/// One rendered table row.
#[derive(Debug, Tabled)]
pub struct MetricsRow
{
    pub label: &'static str,
    pub precision: String,
    pub recall: String,
    pub f1: String,
    pub support: usize,
}

fn ratio(
    num: usize,
    den: usize,
) -> f64
{
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn class_metrics(
    tp: usize,
    fp: usize,
    fn_: usize,
) -> ClassMetrics
{
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0
    {
        0.0
    }
    else
    {
        2.0 * precision * recall / (precision + recall)
    };
    ClassMetrics { precision, recall, f1, support: tp + fn_ }
}

impl ClassificationReport
{
    /// Compare predictions to targets; both slices must align.
    pub fn from_predictions(
        truth: &[bool],
        predicted: &[bool],
    ) -> Self
    {
        let (mut tp, mut tn, mut fp, mut fn_) = (0, 0, 0, 0);
        for (t, p) in truth
            .iter()
            .zip(predicted)
        {
            match (*t, *p)
            {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
            }
        }

        Self {
            positive: class_metrics(tp, fp, fn_),
            negative: class_metrics(tn, fn_, fp),
            accuracy: ratio(tp + tn, truth.len()),
        }
    }

    pub fn rows(&self) -> Vec<MetricsRow>
    {
        [("0", &self.negative), ("1", &self.positive)]
            .into_iter()
            .map(|(label, m)| MetricsRow {
                label,
                precision: format!("{:.3}", m.precision),
                recall: format!("{:.3}", m.recall),
                f1: format!("{:.3}", m.f1),
                support: m.support,
            })
            .collect()
    }
}

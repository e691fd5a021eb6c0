//! Depth-limited CART decision tree (Gini impurity).

use crate::core::learn::{FitError, ProbabilisticClassifier, TrainingSet};

#[derive(Debug, Clone)]
enum Node
{
    Leaf
    {
        p: f64,
    },
    Split
    {
        feature: usize,
        threshold: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree
{
    max_depth: usize,
    min_samples_leaf: usize,
    root: Option<Node>,
}

impl DecisionTree
{
    pub fn new(
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self
    {
        Self { max_depth, min_samples_leaf: min_samples_leaf.max(1), root: None }
    }

    pub fn depth(&self) -> usize
    {
        fn walk(n: &Node) -> usize
        {
            match n
            {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root
            .as_ref()
            .map_or(0, walk)
    }
}

fn gini(
    pos: usize,
    n: usize,
) -> f64
{
    if n == 0
    {
        return 0.0;
    }
    let p = pos as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

struct Best
{
    feature: usize,
    threshold: f32,
    impurity: f64,
}

struct Builder<'d, 'a>
{
    data: &'d TrainingSet<'a>,
    max_depth: usize,
    min_leaf: usize,
}

impl Builder<'_, '_>
{
    fn build(
        &self,
        idx: Vec<usize>,
        depth: usize,
    ) -> Node
    {
        let labels = self
            .data
            .labels();
        let n = idx.len();
        let pos = idx
            .iter()
            .filter(|i| labels[**i])
            .count();
        let leaf = Node::Leaf { p: pos as f64 / n.max(1) as f64 };

        if depth >= self.max_depth || n < 2 * self.min_leaf || pos == 0 || pos == n
        {
            return leaf;
        }

        let parent = gini(pos, n);
        let Some(best) = self.best_split(&idx, pos)
        else
        {
            return leaf;
        };
        if best.impurity >= parent - 1e-12
        {
            return leaf;
        }

        let rows = self
            .data
            .rows();
        let (l, r): (Vec<usize>, Vec<usize>) = idx
            .into_iter()
            .partition(|i| rows[*i][best.feature] <= best.threshold);
        if l.is_empty() || r.is_empty()
        {
            return leaf;
        }

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(l, depth + 1)),
            right: Box::new(self.build(r, depth + 1)),
        }
    }

    fn best_split(
        &self,
        idx: &[usize],
        pos_total: usize,
    ) -> Option<Best>
    {
        let rows = self
            .data
            .rows();
        let labels = self
            .data
            .labels();
        let n = idx.len();
        let mut best: Option<Best> = None;
        let mut order: Vec<usize> = idx.to_vec();

        for f in 0..self
            .data
            .dimension()
        {
            order.sort_by(|a, b| {
                rows[*a][f]
                    .total_cmp(&rows[*b][f])
                    .then(a.cmp(b))
            });

            let mut left_pos = 0;
            for i in 1..n
            {
                if labels[order[i - 1]]
                {
                    left_pos += 1;
                }
                if i < self.min_leaf || n - i < self.min_leaf
                {
                    continue;
                }

                let lo = rows[order[i - 1]][f];
                let hi = rows[order[i]][f];
                if lo == hi
                {
                    continue;
                }

                let w = (i as f64 * gini(left_pos, i)
                    + (n - i) as f64 * gini(pos_total - left_pos, n - i))
                    / n as f64;

                if best
                    .as_ref()
                    .is_none_or(|b| w < b.impurity)
                {
                    // Midpoint can round onto `hi` for adjacent floats
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some(Best { feature: f, threshold, impurity: w });
                }
            }
        }

        best
    }
}

impl ProbabilisticClassifier for DecisionTree
{
    fn name(&self) -> &'static str
    {
        "decision_tree"
    }

    fn fit(
        &mut self,
        data: &TrainingSet<'_>,
    ) -> Result<(), FitError>
    {
        data.require_both_classes()?;
        let builder = Builder { data, max_depth: self.max_depth, min_leaf: self.min_samples_leaf };
        self.root = Some(builder.build((0..data.len()).collect(), 0));
        Ok(())
    }

    fn predict_proba(
        &self,
        row: &[f32],
    ) -> f64
    {
        let mut node = match &self.root
        {
            Some(n) => n,
            None => return 0.5,
        };
        loop
        {
            match node
            {
                Node::Leaf { p } => return *p,
                Node::Split { feature, threshold, left, right } =>
                {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn set_from<'a>(
        rows: &'a [[f32; 2]],
        labels: &[bool],
    ) -> TrainingSet<'a>
    {
        TrainingSet::new(
            rows.iter()
                .map(|r| &r[..])
                .collect(),
            labels.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn learns_axis_aligned_split()
    {
        let rows = [[0.0, 5.0], [1.0, 3.0], [2.0, 9.0], [10.0, 4.0], [11.0, 8.0], [12.0, 1.0]];
        let set = set_from(&rows, &[false, false, false, true, true, true]);

        let mut tree = DecisionTree::new(4, 1);
        tree.fit(&set).unwrap();

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_proba(&[0.5, 100.0]), 0.0);
        assert_eq!(tree.predict_proba(&[11.5, -100.0]), 1.0);
    }

    #[test]
    fn respects_max_depth()
    {
        // XOR needs two levels
        let rows = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let set = set_from(&rows, &[false, true, true, false]);

        let mut stump = DecisionTree::new(1, 1);
        stump.fit(&set).unwrap();
        assert!(stump.depth() <= 1);

        let mut deep = DecisionTree::new(3, 1);
        deep.fit(&set).unwrap();
        assert!(deep.depth() <= 3);
    }

    #[test]
    fn identical_rows_become_a_leaf()
    {
        let rows = [[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let set = set_from(&rows, &[true, false, true, false]);

        let mut tree = DecisionTree::new(5, 1);
        tree.fit(&set).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict_proba(&[1.0, 1.0]), 0.5);
    }
}

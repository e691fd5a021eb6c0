//! Corpus assembly: snapshot merging, embedding attachment, label write-back.

use std::{collections::HashMap, sync::Arc};

use indexmap::{IndexMap, map::Entry};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::{
    error::PipelineError,
    normalize::TextPipeline,
    post::{Embedding, Label, LabelSource, Post, PostId, RawPost},
};

/// Which copy of a duplicated post ID survives a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy
{
    /// Keep the first-seen copy (older snapshots win when passed first)
    #[default]
    KeepFirst,
    /// Keep the most recently supplied copy, at the first-seen position
    KeepLatest,
}

/// Outcome counters of a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats
{
    pub rows_in: usize,
    pub unique: usize,
    pub duplicates: usize,
    pub threads: usize,
}

/// Merge scraper snapshots in the order given, de-duplicating by post ID.
#[instrument(skip_all, fields(snapshots = snapshots.len(), policy = ?policy))]
pub fn merge_snapshots(
    snapshots: Vec<Vec<RawPost>>,
    policy: MergePolicy,
) -> (Vec<RawPost>, MergeStats)
{
    let mut merged: IndexMap<PostId, RawPost> = IndexMap::new();
    let mut stats = MergeStats::default();

    for snapshot in snapshots
    {
        for post in snapshot
        {
            stats.rows_in += 1;
            match merged.entry(post.id)
            {
                Entry::Vacant(v) =>
                {
                    v.insert(post);
                }
                Entry::Occupied(mut o) =>
                {
                    stats.duplicates += 1;
                    if policy == MergePolicy::KeepLatest
                    {
                        o.insert(post);
                    }
                }
            }
        }
    }

    stats.unique = merged.len();
    stats.threads = merged
        .values()
        .map(|p| p.subject.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();

    info!(
        rows_in = stats.rows_in,
        unique = stats.unique,
        duplicates = stats.duplicates,
        threads = stats.threads,
        "merged snapshots"
    );

    (merged.into_values().collect(), stats)
}

/// Normalize raw rows into posts with one shared pipeline.
pub fn normalize_posts(
    raw: Vec<RawPost>,
    pipeline: &TextPipeline,
) -> Vec<Post>
{
    raw.into_iter()
        .map(|r| Post::from_raw(r, pipeline))
        .collect()
}

/// Post ID to document vector, all of one dimension.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable
{
    dimension: usize,
    vectors: HashMap<PostId, Embedding>,
}

impl EmbeddingTable
{
    pub fn new(dimension: usize) -> Self
    {
        Self { dimension, vectors: HashMap::new() }
    }

    pub fn dimension(&self) -> usize
    {
        self.dimension
    }

    pub fn len(&self) -> usize
    {
        self.vectors
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.vectors
            .is_empty()
    }

    pub fn get(
        &self,
        id: PostId,
    ) -> Option<&Embedding>
    {
        self.vectors
            .get(&id)
    }

    /// Insert a vector, rejecting a wrong dimension.
    pub fn insert(
        &mut self,
        id: PostId,
        vector: Vec<f32>,
    ) -> Result<(), PipelineError>
    {
        if vector.len() != self.dimension
        {
            return Err(PipelineError::EmbeddingDimension {
                id,
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors
            .insert(id, Arc::from(vector));
        Ok(())
    }

    /// Give every post its vector; any post without one is a hard error.
    #[instrument(skip_all, fields(posts = posts.len(), vectors = self.vectors.len()))]
    pub fn attach(
        &self,
        posts: &mut [Post],
    ) -> Result<(), PipelineError>
    {
        let missing: Vec<PostId> = posts
            .iter()
            .filter(|p| {
                !self
                    .vectors
                    .contains_key(&p.id)
            })
            .map(|p| p.id)
            .collect();

        if let Some(first) = missing.first()
        {
            warn!(missing = missing.len(), first = first.0, "posts without embeddings");
            return Err(PipelineError::MissingEmbedding { id: *first, missing: missing.len() });
        }

        for p in posts.iter_mut()
        {
            p.embedding = self
                .vectors
                .get(&p.id)
                .cloned();
        }
        Ok(())
    }
}

/// Write loop labels back into posts.
///
/// Only unlabeled posts are touched; returns how many were labeled.
pub fn apply_labels(
    posts: &mut [Post],
    labels: &IndexMap<PostId, (Label, LabelSource)>,
) -> usize
{
    let mut applied = 0;
    for p in posts.iter_mut()
    {
        if p.label
            .is_some()
        {
            continue;
        }
        if let Some((label, _)) = labels.get(&p.id)
        {
            p.label = Some(*label);
            applied += 1;
        }
    }
    applied
}

//! Typed post records.
//!
//! `RawPost` is what the scraper hands over; `Post` is the normalized record
//! every downstream stage works on. Internal code never sees untyped cells.

use std::{fmt, sync::Arc};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::normalize::TextPipeline;

/// Imageboard-assigned post number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PostId
{
    fn from(v: u64) -> Self
    {
        PostId(v)
    }
}

/// Binary topic label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label
{
    Negative = 0,
    Positive = 1,
}

impl Label
{
    pub fn is_positive(self) -> bool
    {
        matches!(self, Label::Positive)
    }

    pub fn from_bool(positive: bool) -> Self
    {
        if positive { Label::Positive } else { Label::Negative }
    }
}

impl From<Label> for u8
{
    fn from(l: Label) -> u8
    {
        l as u8
    }
}

impl TryFrom<u8> for Label
{
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error>
    {
        match v
        {
            0 => Ok(Label::Negative),
            1 => Ok(Label::Positive),
            other => Err(format!("label must be 0 or 1, got {other}")),
        }
    }
}

impl fmt::Display for Label
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "{}", *self as u8)
    }
}

/// Where a training label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelSource
{
    /// Human-assigned seed label
    Gold,
    /// Assigned by the classifier in the given round (1-based)
    Pseudo
    {
        round: usize,
    },
}

/// Fixed-length document vector, shared read-only for the loop's lifetime.
pub type Embedding = Arc<[f32]>;

/// One row as delivered by the scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPost
{
    pub subject: String,
    pub id: PostId,
    pub author: String,
    pub timestamp: NaiveDateTime,
    pub content: String,
}

/// Normalized post record.
#[derive(Debug, Clone, PartialEq)]
pub struct Post
{
    pub id: PostId,
    pub subject: String,
    pub author: String,
    pub timestamp: NaiveDateTime,
    pub raw_content: String,
    pub clean_content: String,
    /// Reply targets in order of appearance (duplicates kept)
    pub references: Vec<PostId>,
    pub urls: Vec<String>,
    pub tokens: Vec<String>,
    pub embedding: Option<Embedding>,
    pub label: Option<Label>,
}

impl Post
{
    /// Derive the text fields once from a scraper row.
    pub fn from_raw(
        raw: RawPost,
        pipeline: &TextPipeline,
    ) -> Self
    {
        let normalizer = pipeline.normalizer();
        let references = normalizer.extract_references(&raw.content);
        let urls = normalizer.extract_urls(&raw.content);
        let clean_content = normalizer.clean(&raw.content);
        let tokens = pipeline
            .tokenizer()
            .tokenize(&clean_content);

        Self {
            id: raw.id,
            subject: raw.subject,
            author: raw.author,
            timestamp: raw.timestamp,
            raw_content: raw.content,
            clean_content,
            references,
            urls,
            tokens,
            embedding: None,
            label: None,
        }
    }

    /// Thread identifier; posts of one thread share their subject.
    pub fn thread_key(&self) -> &str
    {
        &self.subject
    }
}

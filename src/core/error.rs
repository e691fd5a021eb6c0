//! Error taxonomy shared by the ingestion, graph and training stages.
//!
//! Fatal conditions are `thiserror` enums; the one non-fatal anomaly
//! (`UnresolvedReference`) is a plain value that gets logged and skipped.

use miette::Diagnostic;
use thiserror::Error;

use crate::core::post::PostId;

/// A malformed row or cell at the tabular boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{file}:{line}: column `{column}`: {reason}")]
#[diagnostic(
    code(threadloom::parse),
    help("list cells are JSON arrays, e.g. [1, 2] or [\"a\", \"b\"]; whitespace between tokens is fine")
)]
pub struct ParseError
{
    /// File the row came from (or `<memory>` for in-process tables)
    pub file: String,
    /// 1-based physical line of the row
    pub line: usize,
    /// Column header
    pub column: String,
    /// What went wrong
    pub reason: String,
}

impl ParseError
{
    pub fn new(
        file: impl Into<String>,
        line: usize,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self
    {
        Self {
            file: file.into(),
            line,
            column: column.into(),
            reason: reason.into(),
        }
    }
}

/// Corpus-level invariants that cannot be repaired locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorpusIntegrityError
{
    #[error("post id {id} appears {count} times in the corpus")]
    DuplicateId
    {
        id: PostId,
        count: usize,
    },

    #[error("thread `{thread}` has no identifiable head post")]
    MissingHead
    {
        thread: String,
    },
}

/// Top-level failure of an ingestion, merge or training operation.
#[derive(Debug, Error)]
pub enum PipelineError
{
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    CorpusIntegrity(#[from] CorpusIntegrityError),

    #[error("post {id} has no embedding ({missing} posts missing in total)")]
    MissingEmbedding
    {
        id: PostId,
        missing: usize,
    },

    #[error("embedding for post {id} has dimension {actual}, expected {expected}")]
    EmbeddingDimension
    {
        id: PostId,
        expected: usize,
        actual: usize,
    },

    #[error("round {round}: {available} unlabeled items left, {required} needed for promotion")]
    InsufficientData
    {
        round: usize,
        available: usize,
        required: usize,
    },

    #[error("round {round}: model fit failed: {reason}")]
    FitFailure
    {
        round: usize,
        reason: String,
    },
}

/// A reference whose target is not in the working set.
///
/// Never an error: the token stays in place and this gets logged at `warn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedReference
{
    /// Post that carries the reference, when known
    pub source: Option<PostId>,
    /// Referenced ID with no matching post
    pub target: PostId,
}

impl std::fmt::Display for UnresolvedReference
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result
    {
        match self.source
        {
            Some(src) => write!(f, "post {} references {} which is not in the corpus", src, self.target),
            None => write!(f, "reference {} is not in the corpus", self.target),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn parse_error_names_location()
    {
        let err = ParseError::new("corpus.tsv", 12, "references", "expected `]`");
        assert_eq!(err.to_string(), "corpus.tsv:12: column `references`: expected `]`");
    }

    #[test]
    fn integrity_error_converts_into_pipeline_error()
    {
        let err: PipelineError = CorpusIntegrityError::MissingHead { thread: "gen".into() }.into();
        assert!(matches!(err, PipelineError::CorpusIntegrity(_)));
        assert!(err.to_string().contains("gen"));
    }

    #[test]
    fn unresolved_reference_display_includes_both_ids()
    {
        let w = UnresolvedReference { source: Some(PostId(11111111)), target: PostId(22222222) };
        let s = w.to_string();
        assert!(s.contains("11111111"));
        assert!(s.contains("22222222"));
    }
}

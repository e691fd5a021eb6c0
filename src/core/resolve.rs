//! Backreference expansion.
//!
//! Replaces each reply token in a post with the quoted content of the post it
//! points to. Expansion is bounded by an explicit depth so mutually
//! referencing posts (and outright cycles) cannot blow up the output.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, instrument, warn};

use crate::core::{
    error::{CorpusIntegrityError, UnresolvedReference},
    normalize::ContentNormalizer,
    post::{Post, PostId},
};

/// Expansion depth used unless configured otherwise: referenced content is
/// inserted verbatim and never expanded itself.
pub const DEFAULT_EXPANSION_DEPTH: usize = 1;

/// Opening delimiter of quoted (back-referenced) material.
pub const QUOTE_OPEN: &str = "<ref>";
/// Closing delimiter of quoted material.
pub const QUOTE_CLOSE: &str = "</ref>";
/// Separator emitted after each quoted block.
pub const QUOTE_SEPARATOR: &str = "\n";

/// ID lookup over a post table that keeps every position per ID, so duplicate
/// IDs are detected instead of silently shadowed.
pub struct PostIndex<'a>
{
    posts: &'a [Post],
    by_id: HashMap<PostId, SmallVec<[usize; 1]>>,
}

impl<'a> PostIndex<'a>
{
    pub fn new(posts: &'a [Post]) -> Self
    {
        let mut by_id: HashMap<PostId, SmallVec<[usize; 1]>> = HashMap::with_capacity(posts.len());
        for (i, p) in posts
            .iter()
            .enumerate()
        {
            by_id
                .entry(p.id)
                .or_default()
                .push(i);
        }
        Self { posts, by_id }
    }

    /// The unique post with this ID, `None` if absent.
    pub fn lookup(
        &self,
        id: PostId,
    ) -> Result<Option<&'a Post>, CorpusIntegrityError>
    {
        match self
            .by_id
            .get(&id)
            .map(|v| v.as_slice())
        {
            None | Some([]) => Ok(None),
            Some([only]) => Ok(Some(&self.posts[*only])),
            Some(many) => Err(CorpusIntegrityError::DuplicateId { id, count: many.len() }),
        }
    }

    /// Thread subject of the first post with this ID.
    pub fn thread_of(
        &self,
        id: PostId,
    ) -> Option<&'a str>
    {
        self.by_id
            .get(&id)
            .and_then(|v| v.first())
            .map(|i| self.posts[*i].thread_key())
    }

    pub fn len(&self) -> usize
    {
        self.posts
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.posts
            .is_empty()
    }
}

/// Expanded text plus the references that were left in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved
{
    pub text: String,
    /// One entry per unresolved token (and per logged warning)
    pub unresolved: Vec<PostId>,
}

/// Per-post expansion of a whole table; failures are isolated per post.
#[derive(Debug, Default)]
pub struct ResolveReport
{
    pub expanded: Vec<(PostId, String)>,
    pub failures: Vec<(PostId, CorpusIntegrityError)>,
    pub unresolved: usize,
}

#[derive(Debug, Clone)]
pub struct ReferenceResolver<'p>
{
    normalizer: &'p ContentNormalizer,
    max_depth: usize,
}

impl<'p> ReferenceResolver<'p>
{
    pub fn new(normalizer: &'p ContentNormalizer) -> Self
    {
        Self { normalizer, max_depth: DEFAULT_EXPANSION_DEPTH }
    }

    pub fn with_max_depth(
        mut self,
        max_depth: usize,
    ) -> Self
    {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize
    {
        self.max_depth
    }

    /// Expand the reference tokens of `content` against `index`.
    pub fn resolve(
        &self,
        content: &str,
        index: &PostIndex<'_>,
    ) -> Result<Resolved, CorpusIntegrityError>
    {
        self.resolve_for(None, content, index)
    }

    /// Same as [`resolve`](Self::resolve), attributing warnings to `source`.
    pub fn resolve_for(
        &self,
        source: Option<PostId>,
        content: &str,
        index: &PostIndex<'_>,
    ) -> Result<Resolved, CorpusIntegrityError>
    {
        let mut unresolved = Vec::new();
        let text = self.expand(source, content, index, self.max_depth, &mut unresolved)?;
        Ok(Resolved { text, unresolved })
    }

    fn expand(
        &self,
        source: Option<PostId>,
        content: &str,
        index: &PostIndex<'_>,
        depth: usize,
        unresolved: &mut Vec<PostId>,
    ) -> Result<String, CorpusIntegrityError>
    {
        if depth == 0
        {
            return Ok(content.to_string());
        }

        let spans = self
            .normalizer
            .reference_spans(content);
        if spans.is_empty()
        {
            return Ok(content.to_string());
        }

        let mut out = String::with_capacity(content.len() * 2);
        let mut last = 0;

        for r in spans
        {
            out.push_str(&content[last..r.span.start]);
            last = r.span.end;

            match index.lookup(r.target)?
            {
                Some(target) =>
                {
                    let inner = self.expand(
                        Some(target.id),
                        &target.raw_content,
                        index,
                        depth - 1,
                        unresolved,
                    )?;
                    out.push_str(QUOTE_OPEN);
                    out.push_str(&inner);
                    out.push_str(QUOTE_CLOSE);
                    out.push_str(QUOTE_SEPARATOR);
                }
                None =>
                {
                    let w = UnresolvedReference { source, target: r.target };
                    warn!(
                        post = source.map(|p| p.0),
                        thread = source.and_then(|p| index.thread_of(p)),
                        target = r.target.0,
                        "{w}"
                    );
                    unresolved.push(r.target);
                    out.push_str(&content[r.span.clone()]);
                }
            }
        }

        out.push_str(&content[last..]);
        Ok(out)
    }

    /// Expand every post of `posts` against the table itself.
    ///
    /// A duplicate-ID failure on one post is recorded and the rest continue.
    #[instrument(skip_all, fields(posts = posts.len(), depth = self.max_depth))]
    pub fn resolve_all(
        &self,
        posts: &[Post],
    ) -> ResolveReport
    {
        let index = PostIndex::new(posts);
        let mut report = ResolveReport::default();

        for p in posts
        {
            match self.resolve_for(Some(p.id), &p.raw_content, &index)
            {
                Ok(r) =>
                {
                    report.unresolved += r
                        .unresolved
                        .len();
                    report
                        .expanded
                        .push((p.id, r.text));
                }
                Err(e) =>
                {
                    warn!(post = p.id.0, error = %e, "backreference expansion failed");
                    report
                        .failures
                        .push((p.id, e));
                }
            }
        }

        debug!(
            expanded = report
                .expanded
                .len(),
            failed = report
                .failures
                .len(),
            unresolved = report.unresolved,
            "backreference expansion finished"
        );
        report
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::log_capture::capture;
    use chrono::NaiveDate;
    use tracing::Level;

    fn post(
        id: u64,
        content: &str,
    ) -> Post
    {
        Post {
            id: PostId(id),
            subject: "t".into(),
            author: "Anonymous".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            raw_content: content.into(),
            clean_content: String::new(),
            references: Vec::new(),
            urls: Vec::new(),
            tokens: Vec::new(),
            embedding: None,
            label: None,
        }
    }

    #[test]
    fn substitutes_single_match_verbatim()
    {
        let n = ContentNormalizer::new();
        let posts = vec![post(10000001, "original take"), post(10000002, ">>10000001\nagreed")];
        let idx = PostIndex::new(&posts);

        let r = ReferenceResolver::new(&n)
            .resolve(&posts[1].raw_content, &idx)
            .unwrap();

        assert_eq!(r.text, "<ref>original take</ref>\n\nagreed");
        assert!(
            r.unresolved
                .is_empty()
        );
    }

    #[test]
    fn missing_target_keeps_token_and_reports_once()
    {
        let n = ContentNormalizer::new();
        let posts = vec![post(10000001, "x")];
        let idx = PostIndex::new(&posts);

        let r = ReferenceResolver::new(&n)
            .resolve(">>99999999 who?", &idx)
            .unwrap();

        assert_eq!(r.text, ">>99999999 who?");
        assert_eq!(r.unresolved, vec![PostId(99999999)]);
    }

    #[test]
    fn each_unresolved_reference_logs_one_warning()
    {
        let n = ContentNormalizer::new();
        let posts = vec![post(10000001, "x"), post(10000002, ">>99999999 who?\n>>10000001 yes")];

        let (report, lines) = capture(Level::WARN, || ReferenceResolver::new(&n).resolve_all(&posts));

        assert_eq!(report.unresolved, 1);
        let warnings: Vec<&String> = lines
            .iter()
            .filter(|l| l.contains("WARN"))
            .collect();
        assert_eq!(warnings.len(), 1, "{lines:#?}");
        let w = warnings[0];
        assert!(w.contains("post=10000002"), "{w}");
        assert!(w.contains("target=99999999"), "{w}");
        assert!(w.contains("thread="), "{w}");
    }

    #[test]
    fn duplicate_ids_fail_instead_of_guessing()
    {
        let n = ContentNormalizer::new();
        let posts = vec![post(10000001, "a"), post(10000001, "b")];
        let idx = PostIndex::new(&posts);

        let err = ReferenceResolver::new(&n)
            .resolve(">>10000001", &idx)
            .unwrap_err();
        assert_eq!(err, CorpusIntegrityError::DuplicateId { id: PostId(10000001), count: 2 });
    }

    #[test]
    fn expansion_stops_at_one_level_on_cycles()
    {
        let n = ContentNormalizer::new();
        let posts = vec![post(10000001, ">>10000002 no u"), post(10000002, ">>10000001 no u")];
        let idx = PostIndex::new(&posts);

        let r = ReferenceResolver::new(&n)
            .resolve(&posts[0].raw_content, &idx)
            .unwrap();
        assert_eq!(r.text, "<ref>>>10000001 no u</ref>\n no u");
    }

    #[test]
    fn deeper_expansion_is_bounded_by_depth()
    {
        let n = ContentNormalizer::new();
        let posts = vec![post(10000001, ">>10000002 a"), post(10000002, ">>10000001 b")];
        let idx = PostIndex::new(&posts);

        let r = ReferenceResolver::new(&n)
            .with_max_depth(2)
            .resolve(&posts[0].raw_content, &idx)
            .unwrap();
        assert_eq!(r.text, "<ref><ref>>>10000002 a</ref>\n b</ref>\n a");
    }

    #[test]
    fn resolve_all_isolates_failures()
    {
        let n = ContentNormalizer::new();
        let posts = vec![
            post(10000001, "a"),
            post(10000001, "b"),
            post(10000003, ">>10000001"),
            post(10000004, "plain"),
        ];

        let report = ReferenceResolver::new(&n).resolve_all(&posts);
        assert_eq!(
            report
                .failures
                .len(),
            1
        );
        assert_eq!(report.failures[0].0, PostId(10000003));
        assert_eq!(
            report
                .expanded
                .len(),
            3
        );
    }

    #[test]
    fn resolution_is_deterministic()
    {
        let n = ContentNormalizer::new();
        let posts = vec![post(10000001, "x"), post(10000002, ">>10000001 >>10000001 >>10000009")];
        let idx = PostIndex::new(&posts);
        let resolver = ReferenceResolver::new(&n);

        let a = resolver
            .resolve(&posts[1].raw_content, &idx)
            .unwrap();
        let b = resolver
            .resolve(&posts[1].raw_content, &idx)
            .unwrap();
        assert_eq!(a, b);
    }
}

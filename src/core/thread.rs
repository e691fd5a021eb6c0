//! Per-thread reply graphs.
//!
//! Posts are grouped by subject, ordered chronologically, and each reply is
//! wired to the earlier posts it references. A reply without any usable
//! reference points at the thread head instead, so every reply has at least
//! one outgoing edge.

use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use petgraph::{
    Direction,
    dot::{Config as DotConfig, Dot},
    graphmap::DiGraphMap,
    unionfind::UnionFind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::{
    error::CorpusIntegrityError,
    post::{Post, PostId},
};

/// How the head of a thread is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadRule
{
    /// The chronologically first post
    #[default]
    Earliest,
    /// The post whose ID equals the thread subject (subject-less threads are
    /// keyed by their lead post number)
    SubjectId,
}

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplyEdge
{
    /// The reply quotes the target explicitly
    Reference,
    /// No usable reference; attached to the head
    HeadDefault,
}

impl fmt::Display for ReplyEdge
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            ReplyEdge::Reference => write!(f, "ref"),
            ReplyEdge::HeadDefault => write!(f, "head"),
        }
    }
}

/// Directed reply graph of one thread; `a -> b` means "a replies to b".
#[derive(Debug, Clone)]
pub struct ThreadGraph
{
    subject: String,
    head: PostId,
    graph: DiGraphMap<PostId, ReplyEdge>,
}

impl ThreadGraph
{
    pub fn subject(&self) -> &str
    {
        &self.subject
    }

    pub fn head(&self) -> PostId
    {
        self.head
    }

    pub fn graph(&self) -> &DiGraphMap<PostId, ReplyEdge>
    {
        &self.graph
    }

    pub fn node_count(&self) -> usize
    {
        self.graph
            .node_count()
    }

    pub fn edge_count(&self) -> usize
    {
        self.graph
            .edge_count()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> Vec<(PostId, PostId, ReplyEdge)>
    {
        self.graph
            .all_edges()
            .map(|(a, b, w)| (a, b, *w))
            .collect()
    }

    pub fn out_degree(
        &self,
        id: PostId,
    ) -> usize
    {
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .count()
    }

    /// Posts that `id` replies to.
    pub fn replies_to(
        &self,
        id: PostId,
    ) -> Vec<PostId>
    {
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect()
    }

    /// Number of weakly connected components; 1 for every well-formed thread.
    pub fn component_count(&self) -> usize
    {
        let nodes: Vec<PostId> = self
            .graph
            .nodes()
            .collect();
        if nodes.is_empty()
        {
            return 0;
        }

        let pos: BTreeMap<PostId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (*n, i))
            .collect();
        let mut uf = UnionFind::<usize>::new(nodes.len());
        for (a, b, _) in self
            .graph
            .all_edges()
        {
            uf.union(pos[&a], pos[&b]);
        }

        uf.into_labeling()
            .into_iter()
            .unique()
            .count()
    }

    /// Graphviz rendering, nodes labelled by post ID.
    pub fn to_dot(&self) -> String
    {
        format!("{}", Dot::with_config(&self.graph, &[DotConfig::EdgeNoLabel]))
    }
}

/// All thread graphs of a corpus, keyed by subject.
pub type ThreadGraphs = BTreeMap<String, ThreadGraph>;

#[derive(Debug, Clone, Default)]
pub struct ThreadGraphBuilder
{
    head_rule: HeadRule,
}

impl ThreadGraphBuilder
{
    pub fn new(head_rule: HeadRule) -> Self
    {
        Self { head_rule }
    }

    /// Build one graph per thread.
    ///
    /// Fails only when a thread has no identifiable head.
    #[instrument(skip_all, fields(posts = posts.len(), rule = ?self.head_rule))]
    pub fn build(
        &self,
        posts: &[Post],
    ) -> Result<ThreadGraphs, CorpusIntegrityError>
    {
        let threads = group_threads(posts);
        info!(threads = threads.len(), posts = posts.len(), "discovered threads");

        let mut out = ThreadGraphs::new();
        for (subject, members) in threads
        {
            let g = self.build_thread(&subject, &members)?;
            out.insert(subject, g);
        }
        Ok(out)
    }

    /// Build the graph of a single thread; `members` must share one subject.
    pub fn build_thread(
        &self,
        subject: &str,
        members: &[&Post],
    ) -> Result<ThreadGraph, CorpusIntegrityError>
    {
        let mut ordered: Vec<&Post> = members.to_vec();
        ordered.sort_by_key(|p| (p.timestamp, p.id));

        let head = self
            .find_head(subject, &ordered)
            .ok_or_else(|| CorpusIntegrityError::MissingHead { thread: subject.to_string() })?;

        let mut graph = DiGraphMap::<PostId, ReplyEdge>::with_capacity(ordered.len(), ordered.len());
        graph.add_node(head);

        for p in ordered
        {
            if p.id == head
            {
                continue;
            }
            graph.add_node(p.id);

            // Only earlier posts of this thread are nodes at this point, which
            // rules out forward and cross-thread references; self-loops are
            // excluded explicitly.
            let targets: Vec<PostId> = p
                .references
                .iter()
                .copied()
                .filter(|t| *t != p.id && graph.contains_node(*t))
                .unique()
                .collect();

            if targets.is_empty()
            {
                graph.add_edge(p.id, head, ReplyEdge::HeadDefault);
                continue;
            }
            for t in targets
            {
                graph.add_edge(p.id, t, ReplyEdge::Reference);
            }
        }

        debug!(
            thread = subject,
            head = head.0,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built thread graph"
        );

        Ok(ThreadGraph { subject: subject.to_string(), head, graph })
    }

    fn find_head(
        &self,
        subject: &str,
        ordered: &[&Post],
    ) -> Option<PostId>
    {
        match self.head_rule
        {
            HeadRule::Earliest => ordered
                .first()
                .map(|p| p.id),
            HeadRule::SubjectId =>
            {
                let id: u64 = subject
                    .trim()
                    .parse()
                    .ok()?;
                ordered
                    .iter()
                    .find(|p| p.id == PostId(id))
                    .map(|p| p.id)
            }
        }
    }
}

/// Group posts by thread subject, keeping corpus order inside each group.
pub fn group_threads(posts: &[Post]) -> BTreeMap<String, Vec<&Post>>
{
    let mut threads: BTreeMap<String, Vec<&Post>> = BTreeMap::new();
    for p in posts
    {
        threads
            .entry(
                p.thread_key()
                    .to_string(),
            )
            .or_default()
            .push(p);
    }
    threads
}

/// Head flag per post under the earliest-post rule, in corpus order.
pub fn label_heads(posts: &[Post]) -> Vec<bool>
{
    let mut heads: BTreeMap<&str, (usize, (chrono::NaiveDateTime, PostId))> = BTreeMap::new();
    for (i, p) in posts
        .iter()
        .enumerate()
    {
        let key = (p.timestamp, p.id);
        heads
            .entry(p.thread_key())
            .and_modify(|cur| {
                if key < cur.1
                {
                    *cur = (i, key);
                }
            })
            .or_insert((i, key));
    }

    let mut flags = vec![false; posts.len()];
    for (i, _) in heads.into_values()
    {
        flags[i] = true;
    }
    flags
}

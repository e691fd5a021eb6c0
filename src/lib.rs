//! **threadloom** - imageboard thread ingestion, reply graphs and self-trained
//! topic classification
//!
//! Scraper snapshots are merged and normalized into posts, reply references are
//! expanded or turned into per-thread graphs, and a stacked ensemble is grown
//! from a small gold set by iterative pseudo-labeling.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - text normalization, references, threads and learning
pub mod core {
    /// Error taxonomy (parse, integrity, pipeline)
    pub mod error;

    /// Post records, identifiers and labels
    pub mod post;

    /// URL and reply-reference extraction, cleaning, tokenization
    pub mod normalize;

    /// Backreference expansion with a bounded depth
    pub mod resolve;

    /// Per-thread reply graphs over petgraph
    pub mod thread;

    /// Snapshot merging, embedding attachment, label write-back
    pub mod corpus;

    /// Base learners, stacking ensemble and the self-training loop
    pub mod learn;

    #[cfg(test)]
    pub(crate) mod log_capture;
}

/// Infrastructure - configuration, tabular I/O and persistence
pub mod infra {
    /// Layered configuration with TOML defaults
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Atomic writes and text reads
    pub mod io;

    /// Quote-tolerant CSV/TSV rows
    pub mod tabular;

    /// Typed list and label cells
    pub mod cells;

    /// Snapshot, corpus, label and embedding files
    pub mod store;
}

/// Subcommand handlers
pub mod cli_ext {
    pub mod graph_cmd;
    pub mod ingest_cmd;
    pub mod resolve_cmd;
    pub mod train_cmd;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::{
    error::{CorpusIntegrityError, ParseError, PipelineError},
    normalize::{ContentNormalizer, TextPipeline},
    post::{Label, Post, PostId, RawPost},
    resolve::ReferenceResolver,
    thread::{ThreadGraph, ThreadGraphBuilder},
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::{corpus::MergePolicy, learn::ShortfallPolicy, thread::HeadRule};

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "tloom")]
#[command(
    about = "Ingest imageboard threads, map their reply graphs and self-train a topic classifier"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing files
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Config file (default: first of threadloom.toml/.yaml/.json found)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge scraper snapshots into a normalized corpus
    Ingest(IngestArgs),

    /// Expand reply references into quoted context
    Resolve(ResolveArgs),

    /// Build per-thread reply graphs
    Graph(GraphArgs),

    /// Run the self-training loop and write the labeled corpus
    Train(TrainArgs),

    /// Initialize a threadloom.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MergePolicyArg {
    /// Keep the first-seen copy of a duplicated id
    KeepFirst,
    /// Keep the last-supplied copy of a duplicated id
    KeepLatest,
}

impl From<MergePolicyArg> for MergePolicy {
    fn from(p: MergePolicyArg) -> Self {
        match p {
            MergePolicyArg::KeepFirst => MergePolicy::KeepFirst,
            MergePolicyArg::KeepLatest => MergePolicy::KeepLatest,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HeadRuleArg {
    /// Earliest post of the thread
    Earliest,
    /// Post whose id equals the thread subject
    SubjectId,
}

impl From<HeadRuleArg> for HeadRule {
    fn from(r: HeadRuleArg) -> Self {
        match r {
            HeadRuleArg::Earliest => HeadRule::Earliest,
            HeadRuleArg::SubjectId => HeadRule::SubjectId,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShortfallArg {
    /// Promote whatever is left, split by rank
    PromoteRemaining,
    /// Stop with an error
    Fail,
}

impl From<ShortfallArg> for ShortfallPolicy {
    fn from(s: ShortfallArg) -> Self {
        match s {
            ShortfallArg::PromoteRemaining => ShortfallPolicy::PromoteRemaining,
            ShortfallArg::Fail => ShortfallPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Scraper snapshots, oldest first (.csv comma, otherwise tab separated)
    #[arg(required = true)]
    pub snapshots: Vec<PathBuf>,

    /// Corpus output path
    #[arg(short, long, default_value = "corpus.tsv")]
    pub output: PathBuf,

    /// `id, embedding` table to attach
    #[arg(long)]
    pub embeddings: Option<PathBuf>,

    /// `id, label` table of gold labels
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Override the configured duplicate policy
    #[arg(long, value_enum)]
    pub merge_policy: Option<MergePolicyArg>,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Persisted corpus
    pub corpus: PathBuf,

    /// Only resolve these post ids
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<u64>,

    /// Nested expansion depth (0 leaves text unchanged)
    #[arg(long)]
    pub depth: Option<usize>,

    /// Write `id, resolved` rows here instead of printing
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct GraphArgs {
    /// Persisted corpus
    pub corpus: PathBuf,

    /// Override the configured head rule
    #[arg(long, value_enum)]
    pub head_rule: Option<HeadRuleArg>,

    /// Write one Graphviz file per thread into this directory
    #[arg(long, value_name = "DIR")]
    pub dot_dir: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Persisted corpus with gold labels
    pub corpus: PathBuf,

    /// `id, embedding` table, when the corpus has no embedding column
    #[arg(long)]
    pub embeddings: Option<PathBuf>,

    /// Labeled corpus output path
    #[arg(short, long, default_value = "labeled.tsv")]
    pub output: PathBuf,

    /// Write per-round reports as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Override the configured number of rounds
    #[arg(long)]
    pub rounds: Option<usize>,

    /// Override the per-class promotion quota
    #[arg(short = 'k', long)]
    pub quota: Option<usize>,

    /// Override the random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the shortfall policy
    #[arg(long, value_enum)]
    pub shortfall: Option<ShortfallArg>,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

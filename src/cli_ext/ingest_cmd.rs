//! `tloom ingest`: merge snapshots, normalize, attach labels and vectors.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::instrument;

use crate::{
    cli::{AppContext, IngestArgs},
    core::{
        corpus::{MergePolicy, apply_labels, merge_snapshots, normalize_posts},
        normalize::TextPipeline,
    },
    infra::{
        config::Config,
        store::{load_embeddings, load_labels, load_raw_posts, save_corpus},
    },
};

#[instrument(skip_all, fields(snapshots = args.snapshots.len()))]
pub fn run(
    args: IngestArgs,
    cfg: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let progress = if ctx.quiet
    {
        ProgressBar::hidden()
    }
    else
    {
        let pb = ProgressBar::new(args.snapshots.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    };

    let mut snapshots = Vec::with_capacity(args.snapshots.len());
    for path in &args.snapshots
    {
        progress.set_message(format!("{}", path.display()));
        let rows = load_raw_posts(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        snapshots.push(rows);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let policy: MergePolicy = args
        .merge_policy
        .map_or(cfg.merge.policy, Into::into);
    let (raw, stats) = merge_snapshots(snapshots, policy);

    let pipeline = TextPipeline::new();
    let mut posts = normalize_posts(raw, &pipeline);

    let mut labeled = 0;
    if let Some(path) = &args.labels
    {
        let labels =
            load_labels(path).with_context(|| format!("Failed to load labels {}", path.display()))?;
        labeled = apply_labels(&mut posts, &labels);
    }

    if let Some(path) = &args.embeddings
    {
        let table = load_embeddings(path, cfg.embedding.dimension)
            .with_context(|| format!("Failed to load embeddings {}", path.display()))?;
        table
            .attach(&mut posts)
            .context("Embedding table does not cover the corpus")?;
    }

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!(
                "{}",
                format!(
                    "DRY RUN: would write {} posts ({} threads, {} duplicates dropped) to {}",
                    stats.unique,
                    stats.threads,
                    stats.duplicates,
                    args.output.display()
                )
                .yellow()
            );
        }
        return Ok(());
    }

    save_corpus(&args.output, &posts)?;

    if !ctx.quiet
    {
        println!(
            "{} Wrote {} posts from {} rows ({} threads, {} duplicates, {} labeled) to {}",
            "✓".green(),
            stats.unique,
            stats.rows_in,
            stats.threads,
            stats.duplicates,
            labeled,
            args.output.display()
        );
    }
    Ok(())
}

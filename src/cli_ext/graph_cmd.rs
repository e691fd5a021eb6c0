//! `tloom graph`: per-thread reply graphs, summarized or exported as DOT.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::{
    cli::{AppContext, GraphArgs, OutputFormat},
    core::thread::{HeadRule, ThreadGraph, ThreadGraphBuilder, ThreadGraphs},
    infra::{config::Config, io::write_atomic, store::load_corpus},
};

#[derive(Debug, Serialize, Tabled)]
struct ThreadRow
{
    thread: String,
    head: u64,
    posts: usize,
    edges: usize,
    components: usize,
}

impl From<&ThreadGraph> for ThreadRow
{
    fn from(g: &ThreadGraph) -> Self
    {
        Self {
            thread: g
                .subject()
                .to_string(),
            head: g.head().0,
            posts: g.node_count(),
            edges: g.edge_count(),
            components: g.component_count(),
        }
    }
}

/// File-system safe stem for a thread subject.
fn dot_file_name(
    index: usize,
    subject: &str,
) -> String
{
    let stem: String = subject
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(48)
        .collect();
    format!("{index:04}_{stem}.dot")
}

fn write_dot_files(
    dir: &Path,
    graphs: &ThreadGraphs,
) -> Result<usize>
{
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    for (i, g) in graphs
        .values()
        .enumerate()
    {
        write_atomic(&dir.join(dot_file_name(i, g.subject())), g.to_dot().as_bytes())?;
    }
    Ok(graphs.len())
}

#[instrument(skip_all, fields(corpus = %args.corpus.display()))]
pub fn run(
    args: GraphArgs,
    cfg: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let posts = load_corpus(&args.corpus)?;
    let rule: HeadRule = args
        .head_rule
        .map_or(cfg.graph.head_rule, Into::into);

    let graphs = ThreadGraphBuilder::new(rule)
        .build(&posts)
        .context("Failed to build thread graphs")?;

    let rows: Vec<ThreadRow> = graphs
        .values()
        .map(ThreadRow::from)
        .collect();

    let disconnected = rows
        .iter()
        .filter(|r| r.components > 1)
        .count();

    match args.format
    {
        OutputFormat::Json =>
        {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table =>
        {
            println!("{}", Table::new(&rows));
        }
    }

    if disconnected > 0
    {
        eprintln!("{} {} threads have more than one component", "⚠".yellow(), disconnected);
    }

    if let Some(dir) = &args.dot_dir
    {
        if ctx.dry_run
        {
            if !ctx.quiet
            {
                println!(
                    "{}",
                    format!("DRY RUN: would write {} DOT files to {}", graphs.len(), dir.display()).yellow()
                );
            }
        }
        else
        {
            let n = write_dot_files(dir, &graphs)?;
            if !ctx.quiet
            {
                println!("{} Wrote {} DOT files to {}", "✓".green(), n, dir.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn dot_names_are_sanitized_and_ordered()
    {
        assert_eq!(dot_file_name(3, "rust / general"), "0003_rust___general.dot");
        assert_eq!(dot_file_name(12, "12345678"), "0012_12345678.dot");
    }
}

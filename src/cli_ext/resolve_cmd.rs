//! `tloom resolve`: expand reply references into quoted context.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::instrument;

use crate::{
    cli::{AppContext, ResolveArgs},
    core::{
        normalize::TextPipeline,
        post::PostId,
        resolve::{PostIndex, ReferenceResolver},
    },
    infra::{config::Config, io::write_atomic, store::load_corpus, tabular::write_row},
};

#[instrument(skip_all, fields(corpus = %args.corpus.display()))]
pub fn run(args: ResolveArgs, cfg: &Config, ctx: &AppContext) -> Result<()> {
    let posts = load_corpus(&args.corpus)?;
    let pipeline = TextPipeline::new();
    let resolver = ReferenceResolver::new(pipeline.normalizer())
        .with_max_depth(args.depth.unwrap_or(cfg.resolver.max_depth));

    let mut rows: Vec<(PostId, String)> = Vec::new();
    let mut unresolved = 0;
    let mut failed = 0;

    if args.ids.is_empty() {
        let report = resolver.resolve_all(&posts);
        unresolved = report.unresolved;
        failed = report.failures.len();
        for (id, err) in &report.failures {
            eprintln!("{} post {}: {}", "⚠".yellow(), id, err);
        }
        rows = report.expanded;
    } else {
        let index = PostIndex::new(&posts);
        for id in args.ids.iter().copied().map(PostId) {
            let post = index
                .lookup(id)?
                .with_context(|| format!("Post {id} is not in {}", args.corpus.display()))?;
            let r = resolver.resolve_for(Some(id), &post.raw_content, &index)?;
            unresolved += r.unresolved.len();
            rows.push((id, r.text));
        }
    }

    match &args.output {
        Some(path) if !ctx.dry_run => {
            let mut buf = Vec::new();
            write_row(&mut buf, &["id".to_string(), "resolved".to_string()], '\t')?;
            for (id, text) in &rows {
                write_row(&mut buf, &[id.to_string(), text.clone()], '\t')?;
            }
            write_atomic(path, &buf)?;
            if !ctx.quiet {
                println!(
                    "{} Resolved {} posts to {} ({} unresolved references, {} failures)",
                    "✓".green(),
                    rows.len(),
                    path.display(),
                    unresolved,
                    failed
                );
            }
        }
        Some(path) => {
            if !ctx.quiet {
                println!(
                    "{}",
                    format!("DRY RUN: would write {} resolved posts to {}", rows.len(), path.display())
                        .yellow()
                );
            }
        }
        None => {
            for (id, text) in &rows {
                println!("{} {}", ">>".dimmed(), id.bold());
                println!("{text}");
                println!();
            }
            if !ctx.quiet {
                eprintln!("{} unresolved references, {} failures", unresolved, failed);
            }
        }
    }

    Ok(())
}

//! `tloom train`: self-training over a labeled seed set.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::Table;
use tracing::{info, instrument};

use crate::{
    cli::{AppContext, TrainArgs},
    core::{
        corpus::apply_labels,
        learn::{LabeledCorpus, SelfTrainingLoop, TrainingConfig},
    },
    infra::{
        config::Config,
        io::write_atomic,
        store::{load_corpus, load_embeddings, save_corpus},
    },
};

fn training_config(
    args: &TrainArgs,
    cfg: &Config,
) -> TrainingConfig
{
    let mut t = cfg
        .training
        .clone();
    if let Some(r) = args.rounds
    {
        t.rounds = r;
    }
    if let Some(k) = args.quota
    {
        t.per_class_quota = k;
    }
    if let Some(s) = args.seed
    {
        t.seed = s;
    }
    if let Some(p) = args.shortfall
    {
        t.shortfall = p.into();
    }
    t
}

#[instrument(skip_all, fields(corpus = %args.corpus.display()))]
pub fn run(
    args: TrainArgs,
    cfg: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let mut posts = load_corpus(&args.corpus)?;
    if let Some(path) = &args.embeddings
    {
        load_embeddings(path, cfg.embedding.dimension)?
            .attach(&mut posts)
            .context("Embedding table does not cover the corpus")?;
    }

    let training = training_config(&args, cfg);
    anyhow::ensure!(training.per_class_quota > 0, "--quota must be positive");

    let corpus = LabeledCorpus::from_posts(&posts, training.test_fraction, training.seed)
        .context("Failed to assemble the training corpus")?;
    if !ctx.quiet
    {
        println!(
            "{} train / {} test / {} unlabeled",
            corpus
                .train()
                .len(),
            corpus
                .test()
                .len(),
            corpus
                .unlabeled()
                .len()
        );
    }

    let progress = if ctx.quiet
    {
        ProgressBar::hidden()
    }
    else
    {
        let pb = ProgressBar::new(training.rounds as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] round {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    };

    let mut lp = SelfTrainingLoop::new(training, corpus);
    while !lp.is_done()
    {
        let report = lp
            .step()
            .with_context(|| format!("Self-training stopped after {} rounds", lp.rounds_completed()))?;
        progress.inc(1);
        progress.set_message(format!(
            "+{}/+{} promoted, {} unlabeled left",
            report.promoted_positive, report.promoted_negative, report.unlabeled_size
        ));
    }
    progress.finish_and_clear();

    let outcome = lp
        .finish()
        .context("Failed to fit the final model")?;
    info!(learners = ?outcome.model.learner_names(), "final model fitted");

    if !ctx.quiet
    {
        if let Some(eval) = outcome
            .reports
            .last()
            .and_then(|r| r.evaluation.as_ref())
        {
            println!("{}", Table::new(eval.rows()));
            println!("accuracy {:.3}", eval.accuracy);
        }
    }

    let labeled = apply_labels(&mut posts, &outcome.corpus.labels());

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!(
                "{}",
                format!(
                    "DRY RUN: would write {} posts ({} newly labeled) to {}",
                    posts.len(),
                    labeled,
                    args.output.display()
                )
                .yellow()
            );
        }
        return Ok(());
    }

    save_corpus(&args.output, &posts)?;
    if let Some(path) = &args.report
    {
        let json = serde_json::to_string_pretty(&outcome.reports)?;
        write_atomic(path, json.as_bytes())?;
    }

    if !ctx.quiet
    {
        println!(
            "{} {} rounds, {} newly labeled posts written to {}",
            "✓".green(),
            outcome
                .reports
                .len(),
            labeled,
            args.output.display()
        );
    }
    Ok(())
}

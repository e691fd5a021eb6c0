use anyhow::Result;
use clap::Parser;
use threadloom::{
    ParseError,
    cli::{AppContext, Cli, Commands},
    cli_ext::{graph_cmd, ingest_cmd, resolve_cmd, train_cmd},
    infra::config::{init, load_config_from},
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // THREADLOOM_LOG wins over RUST_LOG
    let default_level = if cli.quiet { "threadloom=warn" } else { "threadloom=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("THREADLOOM_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    let config = || load_config_from(cli.config.as_deref());
    let result = match cli.command {
        Commands::Ingest(args) => config().and_then(|cfg| ingest_cmd::run(args, &cfg, &ctx)),
        Commands::Resolve(args) => config().and_then(|cfg| resolve_cmd::run(args, &cfg, &ctx)),
        Commands::Graph(args) => config().and_then(|cfg| graph_cmd::run(args, &cfg, &ctx)),
        Commands::Train(args) => config().and_then(|cfg| train_cmd::run(args, &cfg, &ctx)),
        Commands::Init(args) => init(args, &ctx),
        Commands::Completions(args) => threadloom::completion::run(args, &ctx),
    };

    // Malformed input gets a labeled diagnostic instead of a bare chain
    if let Err(err) = &result {
        if let Some(parse) = err.downcast_ref::<ParseError>() {
            eprintln!("{:?}", miette::Report::new(parse.clone()));
            std::process::exit(2);
        }
    }
    result
}

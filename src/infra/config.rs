use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{AppContext, InitArgs},
    core::{
        corpus::MergePolicy, learn::TrainingConfig, resolve::DEFAULT_EXPANSION_DEPTH,
        thread::HeadRule,
    },
};

/// Files probed in the working directory, first match wins
pub const CONFIG_FILES: [&str; 4] =
    ["threadloom.toml", "threadloom.yaml", "threadloom.json", ".threadloom.toml"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Snapshot merging
    pub merge: MergeConfig,

    /// Reference expansion
    pub resolver: ResolverConfig,

    /// Thread graph construction
    pub graph: GraphConfig,

    /// Document vectors
    pub embedding: EmbeddingConfig,

    /// Self-training loop and ensemble
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig
{
    pub policy: MergePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig
{
    pub max_depth: usize,
}

impl Default for ResolverConfig
{
    fn default() -> Self
    {
        Self { max_depth: DEFAULT_EXPANSION_DEPTH }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig
{
    pub head_rule: HeadRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig
{
    pub dimension: usize,
}

impl Default for EmbeddingConfig
{
    fn default() -> Self
    {
        Self { dimension: 100 }
    }
}

impl Config
{
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()>
    {
        let t = &self.training;
        ensure!(self.embedding.dimension > 0, "embedding.dimension must be positive");
        ensure!(t.per_class_quota > 0, "training.per_class_quota must be positive");
        ensure!(
            (0.0..1.0).contains(&t.test_fraction),
            "training.test_fraction must be in [0, 1), got {}",
            t.test_fraction
        );
        ensure!(t.ensemble.folds >= 2, "training.ensemble.folds must be at least 2");
        ensure!(!t.ensemble.learners.is_empty(), "training.ensemble.learners must not be empty");
        Ok(())
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_from(None)
}

/// Layer an explicit file (or the first of [`CONFIG_FILES`] found) and
/// `THREADLOOM_*` environment variables over the defaults.
///
/// Nested keys use a double underscore: `THREADLOOM_TRAINING__ROUNDS=3`.
pub fn load_config_from(explicit: Option<&Path>) -> Result<Config>
{
    let mut builder = config::Config::builder();

    match explicit
    {
        Some(path) =>
        {
            ensure!(path.exists(), "Config file {} does not exist", path.display());
            builder = builder.add_source(config::File::from(path));
        }
        None =>
        {
            if let Some(path) = CONFIG_FILES
                .iter()
                .find(|p| Path::new(p).exists())
            {
                builder = builder.add_source(config::File::with_name(path));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("THREADLOOM")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    parsed.validate()?;
    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let toml_string =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn default_round_trips_through_toml()
    {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults()
    {
        let cfg: Config = toml::from_str(
            r#"
            [graph]
            head_rule = "subject_id"

            [training]
            rounds = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.graph.head_rule, HeadRule::SubjectId);
        assert_eq!(cfg.training.rounds, 3);
        assert_eq!(cfg.training.per_class_quota, 100);
        assert_eq!(cfg.resolver.max_depth, DEFAULT_EXPANSION_DEPTH);
        cfg.validate()
            .unwrap();
    }

    #[test]
    fn validation_rejects_bad_fraction()
    {
        let mut cfg = Config::default();
        cfg.training
            .test_fraction = 1.0;
        assert!(
            cfg.validate()
                .is_err()
        );
    }

    #[test]
    fn explicit_file_is_loaded()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("custom.toml");
        std::fs::write(&path, "[embedding]\ndimension = 8\n").unwrap();

        let cfg = load_config_from(Some(&path)).unwrap();
        assert_eq!(cfg.embedding.dimension, 8);
    }
}

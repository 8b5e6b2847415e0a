use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{FeatureConfig, RuntimeConfig};

#[derive(Parser, Debug)]
#[command(
    name = "melwave",
    version,
    about = "Log-mel feature extraction and Griffin-Lim resynthesis"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract normalized log-mel features from a WAV file into JSON.
    Extract(ExtractArgs),
    /// Reconstruct audio from a JSON feature dump.
    Resynth(ResynthArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a JSON feature configuration.
    #[arg(long, value_name = "PATH", conflicts_with = "config_json")]
    pub config: Option<PathBuf>,
    /// Inline JSON feature configuration.
    #[arg(long = "config-json", value_name = "JSON", conflicts_with = "config")]
    pub config_json: Option<String>,
}

impl ConfigArgs {
    /// Load the runtime options (defaults when no source is given).
    pub fn runtime_config(&self) -> Result<RuntimeConfig> {
        match (&self.config, &self.config_json) {
            (Some(path), _) => RuntimeConfig::load(path),
            (None, Some(raw)) => RuntimeConfig::from_json(raw),
            (None, None) => Ok(RuntimeConfig::default()),
        }
    }

    pub fn feature_config(&self) -> Result<FeatureConfig> {
        let runtime = self.runtime_config()?;
        runtime
            .resolve()
            .context("Feature configuration validation failed")
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Input mono WAV file at the configured sample rate.
    #[arg(long, short, value_name = "WAV")]
    pub input: PathBuf,
    /// Output JSON path for the feature dump.
    #[arg(long, short, value_name = "JSON")]
    pub output: PathBuf,
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ResynthArgs {
    /// JSON feature dump produced by `extract`.
    #[arg(long, short, value_name = "JSON")]
    pub input: PathBuf,
    /// Output WAV path.
    #[arg(long, short, value_name = "WAV")]
    pub output: PathBuf,
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Griffin-Lim iteration budget (overrides the configuration).
    #[arg(long)]
    pub iterations: Option<usize>,
    /// Seed for the initial random phase.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl ExtractArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_readable_file(&self.input)?;
        if self.output.is_dir() {
            bail!("Output path is a directory: {:?}", self.output);
        }
        Ok(())
    }
}

impl ResynthArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_readable_file(&self.input)?;
        if let Some(iterations) = self.iterations {
            ensure!(iterations > 0, "--iterations must be greater than zero");
        }
        if self.output.is_dir() {
            bail!("Output path is a directory: {:?}", self.output);
        }
        Ok(())
    }
}

fn ensure_readable_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("Input file does not exist: {:?}", path);
    }
    if !path.is_file() {
        bail!("Input path is not a file: {:?}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_extract_with_inline_config() {
        let cli = Cli::try_parse_from([
            "melwave",
            "extract",
            "--input",
            "in.wav",
            "--output",
            "out.json",
            "--config-json",
            r#"{"feat_dim": 40}"#,
        ])
        .unwrap();
        let Command::Extract(args) = cli.command else {
            panic!("expected extract command");
        };
        let config = args.config.feature_config().unwrap();
        assert_eq!(config.mel_bands, 40);
    }

    #[test]
    fn resynth_defaults_seed_and_iterations() {
        let cli = Cli::try_parse_from(["melwave", "resynth", "-i", "f.json", "-o", "out.wav"])
            .unwrap();
        let Command::Resynth(args) = cli.command else {
            panic!("expected resynth command");
        };
        assert_eq!(args.seed, 0);
        assert_eq!(args.iterations, None);
        assert_eq!(args.config.feature_config().unwrap().griffin_lim_iters, 30);
    }

    #[test]
    fn rejects_both_config_sources() {
        let result = Cli::try_parse_from([
            "melwave",
            "extract",
            "-i",
            "in.wav",
            "-o",
            "out.json",
            "--config",
            "cfg.json",
            "--config-json",
            "{}",
        ]);
        assert!(result.is_err());
    }
}

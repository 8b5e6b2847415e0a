use std::fs::{self, File};
use std::io::BufWriter;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use ndarray::s;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use melwave::audio::{decoder, encoder};
use melwave::cli::{Cli, Command, ExtractArgs, ResynthArgs};
use melwave::features::{FeatureExtractor, GriffinLim, Pipeline};
use melwave::types::FeatureDump;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract(args) => run_extract(&args),
        Command::Resynth(args) => run_resynth(&args),
    }
}

fn run_extract(args: &ExtractArgs) -> Result<()> {
    args.validate()
        .context("Failed to validate command-line arguments")?;
    let config = args.config.feature_config()?;

    let waveform = decoder::decode_wav(&args.input).context("Failed to decode input audio")?;
    info!(
        samples = waveform.len(),
        sample_rate = waveform.sample_rate,
        "loaded input audio"
    );
    ensure!(
        waveform.sample_rate == config.sample_rate,
        "Input is {} Hz but the configuration expects {} Hz; resample it first",
        waveform.sample_rate,
        config.sample_rate
    );

    let pipeline = Pipeline::new(&config).context("Failed to build feature pipeline")?;
    let features = pipeline
        .process(&waveform)
        .context("Feature extraction failed")?;
    info!(
        frames = features.nrows(),
        feature_dim = features.ncols(),
        "extracted features"
    );

    let dump = FeatureDump {
        sample_rate: config.sample_rate,
        mel_bands: config.mel_bands,
        delta_order: config.delta_order,
        cmvn: config.apply_cmvn,
        features,
    };
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create output file {:?}", args.output))?;
    serde_json::to_writer(BufWriter::new(file), &dump)
        .with_context(|| format!("Failed to write features to {:?}", args.output))?;
    println!(
        "Wrote {} frames × {} features to {:?}",
        dump.frame_count(),
        dump.feature_dim(),
        args.output
    );
    Ok(())
}

fn run_resynth(args: &ResynthArgs) -> Result<()> {
    args.validate()
        .context("Failed to validate command-line arguments")?;
    let config = args.config.feature_config()?;

    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read feature dump {:?}", args.input))?;
    let dump: FeatureDump = serde_json::from_str(&raw).context("Failed to parse feature dump")?;
    ensure!(
        !dump.cmvn,
        "Feature dump was CMVN-normalized and cannot be resynthesized"
    );
    ensure!(
        dump.sample_rate == config.sample_rate && dump.mel_bands == config.mel_bands,
        "Feature dump ({} Hz, {} bands) does not match the configuration ({} Hz, {} bands)",
        dump.sample_rate,
        dump.mel_bands,
        config.sample_rate,
        config.mel_bands
    );
    ensure!(
        dump.feature_dim() >= dump.mel_bands,
        "Feature dump has {} columns, fewer than its {} mel bands",
        dump.feature_dim(),
        dump.mel_bands
    );

    let mut extractor =
        FeatureExtractor::new(&config).context("Failed to build feature extractor")?;
    if let Some(iterations) = args.iterations {
        extractor = extractor.with_griffin_lim(GriffinLim::new(iterations));
    }
    // Only the static block is invertible; delta channels are dropped.
    let mel = dump.features.slice(s![.., ..dump.mel_bands]).to_owned();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let waveform = extractor
        .features_to_waveform(&mel, &mut rng)
        .context("Resynthesis failed")?;
    info!(
        samples = waveform.len(),
        iterations = extractor.griffin_lim().iterations(),
        "reconstructed waveform"
    );

    encoder::encode_wav(&waveform, &args.output)
        .with_context(|| format!("Failed to encode output audio at {:?}", args.output))?;
    println!(
        "Wrote {:.3}s of audio to {:?}",
        waveform.duration_secs(),
        args.output
    );
    Ok(())
}

//! Ordered composition of the analysis stages.

use std::fmt;

use ndarray::Array2;
use tracing::debug;

use crate::config::FeatureConfig;
use crate::types::Waveform;

use super::cmvn::Cmvn;
use super::delta::DeltaFilterBank;
use super::extractor::FeatureExtractor;
use super::{FeatureError, Result};

/// A feature-domain transform with a fixed shape contract:
/// `(frames × input_dim)` in, `(frames × output_dim(input_dim))` out.
pub trait FeatureStage: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn output_dim(&self, input_dim: usize) -> usize;

    fn apply(&self, features: &Array2<f32>) -> Result<Array2<f32>>;
}

impl FeatureStage for DeltaFilterBank {
    fn name(&self) -> &'static str {
        "delta"
    }

    fn output_dim(&self, input_dim: usize) -> usize {
        input_dim * self.channels()
    }

    fn apply(&self, features: &Array2<f32>) -> Result<Array2<f32>> {
        Ok(DeltaFilterBank::apply(self, features))
    }
}

impl FeatureStage for Cmvn {
    fn name(&self) -> &'static str {
        "cmvn"
    }

    fn output_dim(&self, input_dim: usize) -> usize {
        input_dim
    }

    fn apply(&self, features: &Array2<f32>) -> Result<Array2<f32>> {
        Ok(Cmvn::apply(self, features))
    }
}

/// Waveform → extractor → delta (optional) → CMVN (optional).
#[derive(Debug)]
pub struct Pipeline {
    extractor: FeatureExtractor,
    stages: Vec<Box<dyn FeatureStage>>,
}

impl Pipeline {
    /// Build every stage up front; invalid options (including an unknown
    /// CMVN mode) fail here rather than on the first utterance.
    pub fn new(config: &FeatureConfig) -> Result<Self> {
        let extractor = FeatureExtractor::new(config)?;
        let mut stages: Vec<Box<dyn FeatureStage>> = Vec::new();
        if config.delta_order >= 1 {
            stages.push(Box::new(DeltaFilterBank::new(
                config.delta_order,
                config.delta_window,
            )?));
        }
        if config.apply_cmvn {
            stages.push(Box::new(Cmvn::from_mode(&config.cmvn_mode)?));
        }
        debug!(
            stages = ?stages.iter().map(|stage| stage.name()).collect::<Vec<_>>(),
            feature_dim = config.feature_dim(),
            "pipeline assembled"
        );
        Ok(Self { extractor, stages })
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn stages(&self) -> impl Iterator<Item = &dyn FeatureStage> {
        self.stages.iter().map(|stage| stage.as_ref())
    }

    pub fn feature_dim(&self) -> usize {
        self.stages
            .iter()
            .fold(self.extractor.config().mel_bands, |dim, stage| {
                stage.output_dim(dim)
            })
    }

    /// `(frames × feature_dim)` features for one utterance.
    pub fn process(&self, waveform: &Waveform) -> Result<Array2<f32>> {
        let mut features = self.extractor.extract(waveform)?;
        for stage in &self.stages {
            let expected = stage.output_dim(features.ncols());
            features = stage.apply(&features)?;
            if features.ncols() != expected {
                return Err(FeatureError::shape(stage.name(), expected, features.ncols()));
            }
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(delta_order: usize, apply_cmvn: bool) -> FeatureConfig {
        FeatureConfig {
            fft_size: 512,
            mel_bands: 24,
            delta_order,
            apply_cmvn,
            ..FeatureConfig::default()
        }
    }

    fn chirp() -> Waveform {
        let samples = (0..8_000)
            .map(|i| {
                let t = i as f32 / 16_000.0;
                (2.0 * std::f32::consts::PI * (200.0 + 800.0 * t) * t).sin() * 0.3
            })
            .collect();
        Waveform::new(samples, 16_000)
    }

    #[test]
    fn stages_follow_configuration_order() {
        let pipeline = Pipeline::new(&config(2, true)).unwrap();
        let names: Vec<_> = pipeline.stages().map(|stage| stage.name()).collect();
        assert_eq!(names, vec!["delta", "cmvn"]);
        assert_eq!(pipeline.feature_dim(), 72);
    }

    #[test]
    fn output_width_matches_feature_dim() {
        let pipeline = Pipeline::new(&config(1, false)).unwrap();
        let features = pipeline.process(&chirp()).unwrap();
        assert_eq!(features.ncols(), pipeline.feature_dim());
        assert_eq!(
            features.nrows(),
            pipeline.extractor().transform().frame_count(8_000)
        );
    }

    #[test]
    fn unknown_cmvn_mode_fails_at_build() {
        let mut cfg = config(0, true);
        cfg.cmvn_mode = "utterance".into();
        assert!(matches!(
            Pipeline::new(&cfg),
            Err(FeatureError::NotSupported(_))
        ));
    }
}

//! Feature pipeline configuration.
//!
//! [`RuntimeConfig`] is the flat option set persisted as JSON (frame sizes in
//! milliseconds, option names as used by training configs). [`RuntimeConfig::resolve`]
//! turns it into a validated [`FeatureConfig`] expressed in samples.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::features::cmvn::Cmvn;
use crate::features::delta::DEFAULT_DELTA_WINDOW;
use crate::features::griffin_lim::DEFAULT_ITERATIONS;
use crate::features::{FeatureError, FilterNorm, MelScale, Result, WindowKind};

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FFT_SIZE: usize = 1025;
pub const DEFAULT_FRAME_LENGTH_MS: f64 = 25.0;
pub const DEFAULT_FRAME_SHIFT_MS: f64 = 10.0;
pub const DEFAULT_MEL_BANDS: usize = 80;

/// Resolved, immutable pipeline parameters. Two pipelines built from equal
/// configs produce identical features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub win_length: usize,
    pub hop_length: usize,
    pub window: WindowKind,
    pub mel_bands: usize,
    pub fmin: f64,
    pub fmax: Option<f64>,
    pub mel_scale: MelScale,
    pub filter_norm: FilterNorm,
    pub ref_level_db: f32,
    pub min_level_db: f32,
    pub preemphasis: f32,
    pub griffin_lim_iters: usize,
    pub delta_order: usize,
    pub delta_window: usize,
    pub apply_cmvn: bool,
    pub cmvn_mode: String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            fft_size: DEFAULT_FFT_SIZE,
            win_length: ms_to_samples(DEFAULT_FRAME_LENGTH_MS, DEFAULT_SAMPLE_RATE),
            hop_length: ms_to_samples(DEFAULT_FRAME_SHIFT_MS, DEFAULT_SAMPLE_RATE),
            window: WindowKind::Hann,
            mel_bands: DEFAULT_MEL_BANDS,
            fmin: 0.0,
            fmax: None,
            mel_scale: MelScale::Slaney,
            filter_norm: FilterNorm::Area,
            ref_level_db: 20.0,
            min_level_db: -100.0,
            preemphasis: 0.97,
            griffin_lim_iters: DEFAULT_ITERATIONS,
            delta_order: 0,
            delta_window: DEFAULT_DELTA_WINDOW,
            apply_cmvn: false,
            cmvn_mode: "global".to_string(),
        }
    }
}

impl FeatureConfig {
    /// Width of the pipeline output: `mel_bands · (delta_order + 1)`.
    pub fn feature_dim(&self) -> usize {
        self.mel_bands * (self.delta_order + 1)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(FeatureError::InvalidConfig(message));
        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive".into());
        }
        if self.fft_size == 0 {
            return invalid("fft_size must be positive".into());
        }
        if self.win_length == 0 || self.win_length > self.fft_size {
            return invalid(format!(
                "win_length must be in 1..={} (got {})",
                self.fft_size, self.win_length
            ));
        }
        if self.hop_length == 0 {
            return invalid("hop_length must be positive".into());
        }
        if self.mel_bands == 0 {
            return invalid("mel_bands must be positive".into());
        }
        let fmax = self.fmax.unwrap_or(self.sample_rate as f64 / 2.0);
        if !(0.0..fmax).contains(&self.fmin) {
            return invalid(format!(
                "frequency range requires 0 <= fmin < fmax (got fmin={}, fmax={})",
                self.fmin, fmax
            ));
        }
        if self.min_level_db >= 0.0 {
            return invalid(format!(
                "min_level_db must be negative (got {})",
                self.min_level_db
            ));
        }
        if !(0.0..1.0).contains(&self.preemphasis) {
            return invalid(format!(
                "preemphasis must be in [0, 1) (got {})",
                self.preemphasis
            ));
        }
        if self.delta_order > 0 && self.delta_window == 0 {
            return invalid("delta_window must be positive when delta_order >= 1".into());
        }
        if self.apply_cmvn {
            Cmvn::from_mode(&self.cmvn_mode)?;
        }
        Ok(())
    }
}

/// Runtime-configurable options parsed from JSON. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub sample_rate: u32,
    #[serde(alias = "num_mel_bins", alias = "feat_dim")]
    pub mel_bands: usize,
    #[serde(alias = "frame_length")]
    pub frame_length_ms: f64,
    #[serde(alias = "frame_shift")]
    pub frame_shift_ms: f64,
    #[serde(alias = "n_fft")]
    pub fft_size: usize,
    pub window: WindowKind,
    pub fmin: f64,
    pub fmax: Option<f64>,
    pub mel_scale: MelScale,
    pub filter_norm: FilterNorm,
    pub ref_level_db: f32,
    pub min_level_db: f32,
    #[serde(alias = "preemphasis_coeff")]
    pub preemphasis: f32,
    #[serde(alias = "griffin_lim_iter")]
    pub griffin_lim_iters: usize,
    pub delta_order: usize,
    #[serde(alias = "delta_window_size")]
    pub delta_window: usize,
    pub apply_cmvn: bool,
    pub cmvn_mode: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let base = FeatureConfig::default();
        Self {
            sample_rate: base.sample_rate,
            mel_bands: base.mel_bands,
            frame_length_ms: DEFAULT_FRAME_LENGTH_MS,
            frame_shift_ms: DEFAULT_FRAME_SHIFT_MS,
            fft_size: base.fft_size,
            window: base.window,
            fmin: base.fmin,
            fmax: base.fmax,
            mel_scale: base.mel_scale,
            filter_norm: base.filter_norm,
            ref_level_db: base.ref_level_db,
            min_level_db: base.min_level_db,
            preemphasis: base.preemphasis,
            griffin_lim_iters: base.griffin_lim_iters,
            delta_order: base.delta_order,
            delta_window: base.delta_window,
            apply_cmvn: base.apply_cmvn,
            cmvn_mode: base.cmvn_mode,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(raw: &str) -> AnyResult<Self> {
        serde_json::from_str(raw).context("Failed to parse feature config JSON")
    }

    pub fn load(path: &Path) -> AnyResult<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature config {:?}", path))?;
        Self::from_json(&data).with_context(|| format!("Invalid feature config {:?}", path))
    }

    /// Convert millisecond frame sizes to samples and validate the result.
    pub fn resolve(&self) -> Result<FeatureConfig> {
        if !(self.frame_length_ms > 0.0 && self.frame_shift_ms > 0.0) {
            return Err(FeatureError::invalid_config(format!(
                "frame length and shift must be positive (got {} ms / {} ms)",
                self.frame_length_ms, self.frame_shift_ms
            )));
        }
        let config = FeatureConfig {
            sample_rate: self.sample_rate,
            fft_size: self.fft_size,
            win_length: ms_to_samples(self.frame_length_ms, self.sample_rate),
            hop_length: ms_to_samples(self.frame_shift_ms, self.sample_rate),
            window: self.window,
            mel_bands: self.mel_bands,
            fmin: self.fmin,
            fmax: self.fmax,
            mel_scale: self.mel_scale,
            filter_norm: self.filter_norm,
            ref_level_db: self.ref_level_db,
            min_level_db: self.min_level_db,
            preemphasis: self.preemphasis,
            griffin_lim_iters: self.griffin_lim_iters,
            delta_order: self.delta_order,
            delta_window: self.delta_window,
            apply_cmvn: self.apply_cmvn,
            cmvn_mode: self.cmvn_mode.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// `floor(ms / 1000 · sample_rate)`.
pub fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    (ms / 1000.0 * sample_rate as f64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_speech_frames() {
        let config = RuntimeConfig::default().resolve().unwrap();
        assert_eq!(config.win_length, 400);
        assert_eq!(config.hop_length, 160);
        assert_eq!(config.fft_size, 1025);
        assert_eq!(config.feature_dim(), 80);
        assert_eq!(config, FeatureConfig::default());
    }

    #[test]
    fn accepts_training_option_names() {
        let json = r#"{
            "feat_dim": 40,
            "frame_length": 50,
            "frame_shift": 12.5,
            "preemphasis_coeff": 0.9,
            "delta_order": 2,
            "delta_window_size": 3,
            "apply_cmvn": true
        }"#;
        let config = RuntimeConfig::from_json(json).unwrap().resolve().unwrap();
        assert_eq!(config.mel_bands, 40);
        assert_eq!(config.win_length, 800);
        assert_eq!(config.hop_length, 200);
        assert_eq!(config.delta_window, 3);
        assert!(config.apply_cmvn);
        assert_eq!(config.feature_dim(), 120);
    }

    #[test]
    fn unsupported_cmvn_mode_fails_at_resolve() {
        let json = r#"{"apply_cmvn": true, "cmvn_mode": "speaker"}"#;
        let err = RuntimeConfig::from_json(json).unwrap().resolve().unwrap_err();
        assert!(matches!(err, FeatureError::NotSupported(_)));
    }

    #[test]
    fn rejects_degenerate_frequency_range() {
        let config = FeatureConfig {
            fmin: 9_000.0,
            ..FeatureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FeatureError::InvalidConfig(_))
        ));
        let config = FeatureConfig {
            mel_bands: 0,
            ..FeatureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_window_longer_than_fft() {
        let json = r#"{"frame_length": 100, "n_fft": 1025}"#;
        assert!(RuntimeConfig::from_json(json).unwrap().resolve().is_err());
    }
}

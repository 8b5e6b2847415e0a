use std::sync::Arc;

use ndarray::Array2;
use rand::Rng;
use tracing::debug;

use crate::config::FeatureConfig;
use crate::types::Waveform;

use super::filterbank::MelFilterbank;
use super::griffin_lim::GriffinLim;
use super::stft::SpectralTransform;
use super::{FeatureError, Result};

/// Amplitude floor applied before taking the logarithm.
const AMP_FLOOR: f32 = 1e-5;

/// Both normalized branches of the analysis path, time-major.
#[derive(Debug, Clone)]
pub struct ExtractedFeatures {
    /// `(frames × mel_bands)` in `[0, 1]`.
    pub mel: Array2<f32>,
    /// `(frames × fft_size/2+1)` in `[0, 1]`.
    pub linear: Array2<f32>,
}

/// Waveform → normalized log-mel features, and the approximate inverse.
///
/// The filterbank and its pseudo-inverse are built once and shared read-only;
/// cloning an extractor is cheap.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    transform: SpectralTransform,
    filterbank: Arc<MelFilterbank>,
    mel_inverse: Arc<Array2<f32>>,
    griffin_lim: GriffinLim,
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig) -> Result<Self> {
        config.validate()?;
        let transform = SpectralTransform::new(
            config.fft_size,
            config.win_length,
            config.hop_length,
            config.window,
        )?;
        let filterbank = MelFilterbank::new(
            config.sample_rate,
            config.fft_size,
            config.mel_bands,
            config.fmin,
            config.fmax,
            config.mel_scale,
            config.filter_norm,
        )?;
        let mel_inverse = filterbank.pseudo_inverse()?;
        debug!(
            sample_rate = config.sample_rate,
            fft_size = config.fft_size,
            win_length = config.win_length,
            hop_length = config.hop_length,
            mel_bands = config.mel_bands,
            "feature extractor ready"
        );
        Ok(Self {
            config: config.clone(),
            transform,
            filterbank: Arc::new(filterbank),
            mel_inverse: Arc::new(mel_inverse),
            griffin_lim: GriffinLim::new(config.griffin_lim_iters),
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn transform(&self) -> &SpectralTransform {
        &self.transform
    }

    pub fn filterbank(&self) -> &MelFilterbank {
        &self.filterbank
    }

    /// Cached `(bins × mel_bands)` pseudo-inverse of the filterbank.
    pub fn mel_inverse(&self) -> &Array2<f32> {
        &self.mel_inverse
    }

    pub fn griffin_lim(&self) -> GriffinLim {
        self.griffin_lim
    }

    /// Override the Griffin-Lim iteration budget.
    pub fn with_griffin_lim(mut self, griffin_lim: GriffinLim) -> Self {
        self.griffin_lim = griffin_lim;
        self
    }

    /// Normalized log-mel features, `(frames × mel_bands)`.
    pub fn extract(&self, waveform: &Waveform) -> Result<Array2<f32>> {
        let magnitude = self.magnitude(waveform)?;
        let mel = self.filterbank.project(&magnitude)?;
        Ok(self.normalize(&self.amp_to_db(&mel)).reversed_axes())
    }

    /// Both the mel and the linear-frequency branches.
    pub fn analyze(&self, waveform: &Waveform) -> Result<ExtractedFeatures> {
        let magnitude = self.magnitude(waveform)?;
        let mel = self.filterbank.project(&magnitude)?;
        Ok(ExtractedFeatures {
            mel: self.normalize(&self.amp_to_db(&mel)).reversed_axes(),
            linear: self.normalize(&self.amp_to_db(&magnitude)).reversed_axes(),
        })
    }

    /// STFT magnitude of the pre-emphasized waveform, `(bins × frames)`.
    pub fn magnitude(&self, waveform: &Waveform) -> Result<Array2<f32>> {
        if waveform.sample_rate != self.config.sample_rate {
            return Err(FeatureError::SampleRateMismatch {
                expected: self.config.sample_rate,
                actual: waveform.sample_rate,
            });
        }
        let emphasized = preemphasis(&waveform.samples, self.config.preemphasis);
        Ok(self.transform.forward(&emphasized)?.magnitude())
    }

    /// Undo normalization and the dB mapping of time-major mel features, then
    /// project back to linear frequency. Returns `(bins × frames)`.
    pub fn mel_to_linear(&self, features: &Array2<f32>) -> Result<Array2<f32>> {
        let bands = self.filterbank.mel_bands();
        if features.ncols() != bands {
            return Err(FeatureError::shape(
                "mel features (bands)",
                bands,
                features.ncols(),
            ));
        }
        let mel_amp = self.db_to_amp(&self.denormalize(&features.t().to_owned()));
        Ok(self.mel_inverse.dot(&mel_amp))
    }

    /// Griffin-Lim on a linear magnitude `(bins × frames)`, then de-emphasis and clipping.
    pub fn linear_to_waveform<R: Rng + ?Sized>(
        &self,
        magnitude: &Array2<f32>,
        rng: &mut R,
    ) -> Result<Waveform> {
        let signal = self
            .griffin_lim
            .reconstruct(&self.transform, magnitude, rng)?;
        let mut samples = deemphasis(&signal, self.config.preemphasis);
        for sample in samples.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        Ok(Waveform::new(samples, self.config.sample_rate))
    }

    /// Full inverse path for time-major normalized mel features.
    pub fn features_to_waveform<R: Rng + ?Sized>(
        &self,
        features: &Array2<f32>,
        rng: &mut R,
    ) -> Result<Waveform> {
        let linear = self.mel_to_linear(features)?;
        self.linear_to_waveform(&linear, rng)
    }

    /// Inverse path for the time-major normalized linear branch of [`Self::analyze`].
    pub fn linear_features_to_waveform<R: Rng + ?Sized>(
        &self,
        features: &Array2<f32>,
        rng: &mut R,
    ) -> Result<Waveform> {
        let bins = self.transform.freq_bins();
        if features.ncols() != bins {
            return Err(FeatureError::shape(
                "linear features (bins)",
                bins,
                features.ncols(),
            ));
        }
        let magnitude = self.db_to_amp(&self.denormalize(&features.t().to_owned()));
        self.linear_to_waveform(&magnitude, rng)
    }

    /// `20·log10(max(x, 1e-5)) − ref_level_db`.
    fn amp_to_db(&self, amplitude: &Array2<f32>) -> Array2<f32> {
        let reference = self.config.ref_level_db;
        amplitude.mapv(|x| 20.0 * x.max(AMP_FLOOR).log10() - reference)
    }

    /// `10^(0.05·(x + ref_level_db))`.
    fn db_to_amp(&self, db: &Array2<f32>) -> Array2<f32> {
        let reference = self.config.ref_level_db;
        db.mapv(|x| 10.0_f32.powf(0.05 * (x + reference)))
    }

    fn normalize(&self, db: &Array2<f32>) -> Array2<f32> {
        let min_level = self.config.min_level_db;
        db.mapv(|x| ((x - min_level) / -min_level).clamp(0.0, 1.0))
    }

    fn denormalize(&self, features: &Array2<f32>) -> Array2<f32> {
        let min_level = self.config.min_level_db;
        features.mapv(|x| x.clamp(0.0, 1.0) * -min_level + min_level)
    }
}

/// First-order high-pass `y[t] = x[t] − c·x[t−1]`, `y[0] = x[0]`.
pub fn preemphasis(samples: &[f32], coeff: f32) -> Vec<f32> {
    let mut output = Vec::with_capacity(samples.len());
    let mut previous = None;
    for &sample in samples {
        output.push(match previous {
            Some(prev) => sample - coeff * prev,
            None => sample,
        });
        previous = Some(sample);
    }
    output
}

/// All-pole inverse of [`preemphasis`]: `x[t] = y[t] + c·x[t−1]`.
pub fn deemphasis(samples: &[f32], coeff: f32) -> Vec<f32> {
    let mut output = Vec::with_capacity(samples.len());
    let mut previous = 0.0_f32;
    for &sample in samples {
        previous = sample + coeff * previous;
        output.push(previous);
    }
    output
}

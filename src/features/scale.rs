//! Hz ↔ mel conversions.
//!
//! Two schemes are supported. `Slaney` (the Auditory Toolbox curve) is linear
//! below 1 kHz and logarithmic above it; `Htk` uses `2595·log10(1 + f/700)`.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

/// Step size of the logarithmic region, `ln(6.4) / 27`.
fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MelScale {
    #[default]
    Slaney,
    Htk,
}

impl MelScale {
    pub fn hz_to_mel(self, hz: f64) -> f64 {
        match self {
            Self::Htk => 2595.0 * (1.0 + hz / 700.0).log10(),
            Self::Slaney => {
                if hz >= MIN_LOG_HZ {
                    MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
                } else {
                    hz / F_SP
                }
            }
        }
    }

    pub fn mel_to_hz(self, mel: f64) -> f64 {
        match self {
            Self::Htk => 700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0),
            Self::Slaney => {
                if mel >= MIN_LOG_MEL {
                    MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
                } else {
                    F_SP * mel
                }
            }
        }
    }
}

pub fn hz_to_mel(hz: f64, scale: MelScale) -> f64 {
    scale.hz_to_mel(hz)
}

pub fn mel_to_hz(mel: f64, scale: MelScale) -> f64 {
    scale.mel_to_hz(mel)
}

/// Elementwise [`hz_to_mel`].
pub fn hz_to_mel_array(frequencies: &Array1<f64>, scale: MelScale) -> Array1<f64> {
    frequencies.mapv(|hz| scale.hz_to_mel(hz))
}

/// Elementwise [`mel_to_hz`].
pub fn mel_to_hz_array(mels: &Array1<f64>, scale: MelScale) -> Array1<f64> {
    mels.mapv(|mel| scale.mel_to_hz(mel))
}

/// Center frequencies of the one-sided FFT bins: `1 + n_fft/2` points in `[0, sr/2]`.
pub fn fft_frequencies(sample_rate: u32, fft_size: usize) -> Array1<f64> {
    Array1::linspace(0.0, sample_rate as f64 / 2.0, 1 + fft_size / 2)
}

/// `count` frequencies (in Hz) uniformly spaced on the mel axis between `fmin` and `fmax`.
pub fn mel_frequencies(count: usize, fmin: f64, fmax: f64, scale: MelScale) -> Array1<f64> {
    let mels = Array1::linspace(scale.hz_to_mel(fmin), scale.hz_to_mel(fmax), count);
    mel_to_hz_array(&mels, scale)
}

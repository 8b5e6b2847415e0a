//! Core data types shared by the feature pipeline and the CLI.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Single-channel audio at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 16000)
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Feature matrix plus the metadata needed to interpret or invert it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDump {
    pub sample_rate: u32,
    pub mel_bands: usize,
    pub delta_order: usize,
    /// Whether per-utterance CMVN was applied (such dumps cannot be resynthesized).
    pub cmvn: bool,
    /// `(frames × mel_bands·(delta_order+1))`, time-major.
    pub features: Array2<f32>,
}

impl FeatureDump {
    pub fn frame_count(&self) -> usize {
        self.features.nrows()
    }

    pub fn feature_dim(&self) -> usize {
        self.features.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_sample_count() {
        let waveform = Waveform::new(vec![0.0; 8_000], 16_000);
        assert_eq!(waveform.len(), 8_000);
        assert!((waveform.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn dump_round_trips_through_json() {
        let dump = FeatureDump {
            sample_rate: 16_000,
            mel_bands: 2,
            delta_order: 0,
            cmvn: false,
            features: Array2::from_shape_vec((2, 2), vec![0.0, 0.25, 0.5, 1.0]).unwrap(),
        };
        let json = serde_json::to_string(&dump).unwrap();
        let parsed: FeatureDump = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.features, dump.features);
        assert_eq!(parsed.frame_count(), 2);
    }
}

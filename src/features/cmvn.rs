use ndarray::{Array2, Axis};

use super::{FeatureError, Result};

pub const CMVN_EPSILON: f32 = 1e-10;

/// Per-utterance mean/variance normalization.
///
/// "global" here means statistics over the whole utterance being normalized,
/// not corpus-level statistics. Each feature dimension is shifted to zero mean
/// and scaled by its (unbiased) standard deviation over time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cmvn {
    eps: f32,
}

impl Default for Cmvn {
    fn default() -> Self {
        Self::global()
    }
}

impl Cmvn {
    pub fn global() -> Self {
        Self { eps: CMVN_EPSILON }
    }

    /// Resolve a mode by name. Only `"global"` is implemented.
    pub fn from_mode(mode: &str) -> Result<Self> {
        match mode {
            "global" => Ok(Self::global()),
            other => Err(FeatureError::NotSupported(format!(
                "cmvn mode '{other}' (only 'global' mean/variance normalization is available)"
            ))),
        }
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }

    /// Normalize a `(frames × dims)` matrix along the time axis.
    pub fn apply(&self, features: &Array2<f32>) -> Array2<f32> {
        let frames = features.len_of(Axis(0));
        if frames == 0 {
            return features.clone();
        }
        let mean = features.sum_axis(Axis(0)) / frames as f32;
        let centered = features - &mean;
        let std = if frames > 1 {
            (centered.mapv(|v| v * v).sum_axis(Axis(0)) / (frames - 1) as f32).mapv(f32::sqrt)
        } else {
            mean.mapv(|_| 0.0)
        };
        centered / &(std + self.eps)
    }
}

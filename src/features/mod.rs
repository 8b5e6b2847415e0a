pub mod cmvn;
pub mod delta;
pub mod extractor;
pub mod filterbank;
pub mod griffin_lim;
pub mod pipeline;
pub mod scale;
pub mod stft;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use cmvn::Cmvn;
pub use delta::{DeltaFilterBank, EdgeMode};
pub use extractor::{ExtractedFeatures, FeatureExtractor};
pub use filterbank::{FilterNorm, MelFilterbank};
pub use griffin_lim::GriffinLim;
pub use pipeline::{FeatureStage, Pipeline};
pub use scale::MelScale;
pub use stft::{PadMode, SpectralTransform, Spectrogram, WindowKind};

/// Convenient alias for results returned by the feature modules.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors raised while building or running the spectral feature pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// A configuration value cannot produce a usable pipeline.
    InvalidConfig(String),
    /// The requested mode exists in the option set but is not implemented.
    NotSupported(String),
    /// Two matrices (or a matrix and a configuration) disagree on a dimension.
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    SampleRateMismatch { expected: u32, actual: u32 },
    EmptyInput(&'static str),
    /// Numerical linear algebra failed (pseudo-inverse).
    Linalg(String),
}

impl FeatureError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}

impl Display for FeatureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(message) => write!(f, "invalid configuration: {message}"),
            Self::NotSupported(message) => write!(f, "not supported: {message}"),
            Self::ShapeMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "shape mismatch in {context}: expected {expected}, got {actual}"
            ),
            Self::SampleRateMismatch { expected, actual } => write!(
                f,
                "sample rate mismatch: pipeline expects {expected} Hz, waveform is {actual} Hz"
            ),
            Self::EmptyInput(what) => write!(f, "empty input: {what}"),
            Self::Linalg(message) => write!(f, "linear algebra failure: {message}"),
        }
    }
}

impl Error for FeatureError {}

#[cfg(test)]
mod tests {
    use super::FeatureError;

    #[test]
    fn shape_mismatch_message_names_context() {
        let err = FeatureError::shape("mel projection", 513, 257);
        let message = err.to_string();
        assert!(message.contains("mel projection"));
        assert!(message.contains("513"));
        assert!(message.contains("257"));
    }
}

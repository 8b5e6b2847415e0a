//! Log-mel feature extraction and Griffin-Lim resynthesis.
//!
//! The forward path turns a [`Waveform`] into normalized log-mel features
//! (optionally extended with delta channels and per-utterance CMVN). The
//! inverse path maps mel features back to audio through the filterbank
//! pseudo-inverse and iterative phase reconstruction.

pub mod audio;
pub mod cli;
pub mod config;
pub mod features;
pub mod types;

pub use config::{FeatureConfig, RuntimeConfig};
pub use features::{FeatureError, FeatureExtractor, Pipeline};
pub use types::{FeatureDump, Waveform};

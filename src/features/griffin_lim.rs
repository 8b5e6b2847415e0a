use std::f32::consts::PI;

use ndarray::Array2;
use rand::Rng;
use tracing::{debug, trace};

use super::stft::{SpectralTransform, Spectrogram};
use super::{FeatureError, Result};

pub const DEFAULT_ITERATIONS: usize = 30;

/// Magnitude-only phase reconstruction.
///
/// Starting from uniformly random phase, each iteration resynthesizes the
/// waveform with the target magnitude and re-estimates phase from its STFT.
/// The iteration count is a fixed budget; there is no early exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GriffinLim {
    iterations: usize,
}

impl Default for GriffinLim {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl GriffinLim {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Estimate a waveform whose STFT magnitude approaches `magnitude`
    /// (`freq_bins × frames`). The random source only seeds the initial phase.
    pub fn reconstruct<R: Rng + ?Sized>(
        &self,
        transform: &SpectralTransform,
        magnitude: &Array2<f32>,
        rng: &mut R,
    ) -> Result<Vec<f32>> {
        if magnitude.nrows() != transform.freq_bins() {
            return Err(FeatureError::shape(
                "griffin-lim (frequency bins)",
                transform.freq_bins(),
                magnitude.nrows(),
            ));
        }
        if magnitude.ncols() == 0 {
            return Err(FeatureError::EmptyInput("magnitude has no frames"));
        }

        let magnitude = magnitude.mapv(f32::abs);
        let initial_phase = Array2::from_shape_fn(magnitude.raw_dim(), |_| rng.gen_range(-PI..=PI));
        let initial = Spectrogram::from_polar(&magnitude, &initial_phase)?;
        let mut signal = transform.inverse(&initial, None)?;
        // A single frame with an even fft size strips down to nothing; keep at
        // least one sample so the next forward pass still yields one frame.
        if signal.is_empty() {
            signal = transform.inverse(&initial, Some(1))?;
        }
        let length = signal.len();

        for iteration in 0..self.iterations {
            let estimate = transform.forward(&signal)?;
            let phase = estimate.phase();
            signal = transform.inverse(&Spectrogram::from_polar(&magnitude, &phase)?, Some(length))?;
            trace!(iteration, "griffin-lim iteration complete");
        }

        debug!(
            iterations = self.iterations,
            frames = magnitude.ncols(),
            samples = length,
            "griffin-lim reconstruction finished"
        );
        Ok(signal)
    }
}

/// Relative distance between a target magnitude and the STFT magnitude of `signal`:
/// `‖ |STFT(x)| − M ‖_F / ‖M‖_F`.
pub fn spectral_convergence(
    transform: &SpectralTransform,
    signal: &[f32],
    target: &Array2<f32>,
) -> Result<f32> {
    let estimate = transform.forward(signal)?.magnitude();
    if estimate.nrows() != target.nrows() {
        return Err(FeatureError::shape(
            "spectral convergence (frequency bins)",
            target.nrows(),
            estimate.nrows(),
        ));
    }
    if estimate.ncols() != target.ncols() {
        return Err(FeatureError::shape(
            "spectral convergence (frames)",
            target.ncols(),
            estimate.ncols(),
        ));
    }
    let diff = (&estimate - target).mapv(|v| v * v).sum().sqrt();
    let norm = target.mapv(|v| v * v).sum().sqrt().max(f32::MIN_POSITIVE);
    Ok(diff / norm)
}

//! Triangular mel filterbank.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::scale::{fft_frequencies, mel_frequencies, MelScale};
use super::{FeatureError, Result};

/// Row normalization applied to the triangular filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterNorm {
    /// Every triangle peaks at 1.0.
    None,
    /// Each row is scaled by `2 / (right - left)` so every band carries
    /// roughly constant energy.
    #[default]
    Area,
}

/// A `(mel_bands × fft_size/2+1)` weight matrix mapping FFT bins onto mel bands.
///
/// Immutable once built; share it behind an `Arc` across utterances.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    weights: Array2<f32>,
    band_edges: Array1<f64>,
    empty_bands: Vec<usize>,
    sample_rate: u32,
    fft_size: usize,
}

impl MelFilterbank {
    pub fn new(
        sample_rate: u32,
        fft_size: usize,
        mel_bands: usize,
        fmin: f64,
        fmax: Option<f64>,
        scale: MelScale,
        norm: FilterNorm,
    ) -> Result<Self> {
        if sample_rate == 0 {
            return Err(FeatureError::invalid_config("sample rate must be positive"));
        }
        if fft_size == 0 {
            return Err(FeatureError::invalid_config("fft size must be positive"));
        }
        if mel_bands == 0 {
            return Err(FeatureError::invalid_config(
                "mel band count must be positive",
            ));
        }
        let fmax = fmax.unwrap_or(sample_rate as f64 / 2.0);
        if !(0.0..fmax).contains(&fmin) {
            return Err(FeatureError::invalid_config(format!(
                "mel frequency range requires 0 <= fmin < fmax (got fmin={fmin}, fmax={fmax})"
            )));
        }

        let bins = 1 + fft_size / 2;
        let fft_freqs = fft_frequencies(sample_rate, fft_size);
        let edges = mel_frequencies(mel_bands + 2, fmin, fmax, scale);

        let mut weights = Array2::<f32>::zeros((mel_bands, bins));
        let mut empty_bands = Vec::new();
        for band in 0..mel_bands {
            let (left, center, right) = (edges[band], edges[band + 1], edges[band + 2]);
            let lower_width = center - left;
            let upper_width = right - center;
            let enorm = match norm {
                FilterNorm::None => 1.0,
                FilterNorm::Area => 2.0 / (right - left),
            };

            let mut peak = 0.0_f64;
            for (bin, &freq) in fft_freqs.iter().enumerate() {
                let lower = (freq - left) / lower_width;
                let upper = (right - freq) / upper_width;
                let weight = lower.min(upper).max(0.0);
                peak = peak.max(weight);
                weights[[band, bin]] = (weight * enorm) as f32;
            }

            // Rows starting at 0 Hz may legitimately be empty.
            if left != 0.0 && peak <= 0.0 {
                empty_bands.push(band);
            }
        }

        if !empty_bands.is_empty() {
            warn!(
                empty = empty_bands.len(),
                mel_bands,
                sample_rate,
                fft_size,
                "empty filters detected in mel basis; increase the sample rate or fmax, or reduce the band count"
            );
        }
        debug!(mel_bands, bins, fmin, fmax, ?scale, ?norm, "built mel filterbank");

        Ok(Self {
            weights,
            band_edges: edges,
            empty_bands,
            sample_rate,
            fft_size,
        })
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    pub fn mel_bands(&self) -> usize {
        self.weights.nrows()
    }

    pub fn bins(&self) -> usize {
        self.weights.ncols()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// The `mel_bands + 2` Hz points delimiting the triangles; band `i` spans
    /// `edges[i]..edges[i + 2]` and peaks at `edges[i + 1]`.
    pub fn band_edges(&self) -> &Array1<f64> {
        &self.band_edges
    }

    /// Bands whose weights are all zero despite a positive lower edge.
    pub fn empty_bands(&self) -> &[usize] {
        &self.empty_bands
    }

    /// Project a freq-major `(bins × frames)` spectrogram onto the mel axis.
    pub fn project(&self, spectrogram: &Array2<f32>) -> Result<Array2<f32>> {
        if spectrogram.nrows() != self.bins() {
            return Err(FeatureError::shape(
                "mel projection (frequency bins)",
                self.bins(),
                spectrogram.nrows(),
            ));
        }
        Ok(self.weights.dot(spectrogram))
    }

    /// Moore-Penrose pseudo-inverse, shape `(bins × mel_bands)`.
    ///
    /// Singular values below `max_sv · ε · max(rows, cols)` are treated as zero.
    pub fn pseudo_inverse(&self) -> Result<Array2<f32>> {
        let (rows, cols) = self.weights.dim();
        let matrix = DMatrix::<f64>::from_fn(rows, cols, |r, c| self.weights[[r, c]] as f64);
        let svd = matrix.svd(true, true);
        let max_singular = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
        let cutoff = max_singular * f64::EPSILON * rows.max(cols) as f64;
        let pinv = svd
            .pseudo_inverse(cutoff)
            .map_err(|err| FeatureError::Linalg(err.to_string()))?;
        debug!(
            rows = pinv.nrows(),
            cols = pinv.ncols(),
            max_singular,
            "computed mel pseudo-inverse"
        );
        Ok(Array2::from_shape_fn((pinv.nrows(), pinv.ncols()), |(r, c)| {
            pinv[(r, c)] as f32
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn slaney(sample_rate: u32, fft_size: usize, bands: usize, norm: FilterNorm) -> MelFilterbank {
        MelFilterbank::new(sample_rate, fft_size, bands, 0.0, None, MelScale::Slaney, norm)
            .unwrap()
    }

    #[test]
    fn shape_matches_bands_and_bins() {
        let fb = slaney(16_000, 1025, 80, FilterNorm::Area);
        assert_eq!(fb.weights().dim(), (80, 513));
        assert_eq!(fb.band_edges().len(), 82);
        assert!(fb.weights().iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn unnormalized_rows_peak_at_most_one() {
        let fb = slaney(16_000, 512, 40, FilterNorm::None);
        for row in fb.weights().rows() {
            let peak = row.iter().copied().fold(0.0_f32, f32::max);
            assert!(peak <= 1.0 + 1e-6);
            assert!(peak > 0.0);
        }
    }

    #[test]
    fn rows_have_contiguous_support() {
        let fb = slaney(22_050, 2048, 64, FilterNorm::Area);
        for row in fb.weights().rows() {
            let nonzero: Vec<usize> = row
                .iter()
                .enumerate()
                .filter_map(|(idx, &w)| (w > 0.0).then_some(idx))
                .collect();
            let first = nonzero[0];
            let last = *nonzero.last().unwrap();
            assert_eq!(nonzero.len(), last - first + 1);
        }
    }

    #[test]
    fn pseudo_inverse_recovers_identity_on_mel_axis() {
        let fb = slaney(16_000, 512, 20, FilterNorm::Area);
        let pinv = fb.pseudo_inverse().unwrap();
        assert_eq!(pinv.dim(), (257, 20));
        let identity = fb.weights().dot(&pinv);
        for ((r, c), value) in identity.indexed_iter() {
            let expected = if r == c { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(*value, expected, epsilon = 1e-3);
        }
    }

    #[test]
    fn too_many_bands_are_reported_not_fatal() {
        let fb = MelFilterbank::new(
            8_000,
            64,
            128,
            20.0,
            None,
            MelScale::Slaney,
            FilterNorm::Area,
        )
        .unwrap();
        assert!(!fb.empty_bands().is_empty());
    }
}

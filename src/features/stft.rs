//! Short-time Fourier transform and its overlap-add inverse.
//!
//! Frames are windowed, transformed with rustfft and kept one-sided
//! (fft_size / 2 + 1 bins). The inverse mirrors the forward policy exactly:
//! same window, hop, centering and padding, so an unmodified spectrogram
//! round-trips to the input signal.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array2, Zip};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use super::{FeatureError, Result};

/// Window-sum-square values at or below this are left unnormalized.
const WINDOW_SUM_FLOOR: f32 = 1e-11;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Periodic Hann window.
    #[default]
    Hann,
    Rectangular,
}

impl WindowKind {
    /// Build a window of `win_length` taps, zero-padded symmetrically to `fft_size`.
    pub fn build(self, win_length: usize, fft_size: usize) -> Vec<f32> {
        let taps: Vec<f32> = match self {
            // Periodic form (denominator N) so shifted copies sum to a constant.
            Self::Hann => (0..win_length)
                .map(|i| {
                    0.5 - 0.5
                        * ((2.0 * std::f64::consts::PI * i as f64) / win_length as f64).cos()
                            as f32
                })
                .collect(),
            Self::Rectangular => vec![1.0; win_length],
        };
        let left = (fft_size - win_length) / 2;
        let mut window = vec![0.0; fft_size];
        window[left..left + win_length].copy_from_slice(&taps);
        window
    }
}

/// How the signal is extended by `fft_size / 2` samples on each side when centering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadMode {
    /// Mirror around the edge sample (the edge itself is not repeated).
    #[default]
    Reflect,
    Zero,
    /// Repeat the edge sample.
    Replicate,
}

/// One-sided complex spectrogram, shape `(freq_bins × frames)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    bins: Array2<Complex32>,
}

impl Spectrogram {
    pub fn new(bins: Array2<Complex32>) -> Self {
        Self { bins }
    }

    /// Combine magnitude and phase (both `freq × frames`) into complex bins.
    pub fn from_polar(magnitude: &Array2<f32>, phase: &Array2<f32>) -> Result<Self> {
        if magnitude.dim() != phase.dim() {
            return Err(FeatureError::shape(
                "polar spectrogram (frames)",
                magnitude.ncols(),
                phase.ncols(),
            ));
        }
        let bins = Zip::from(magnitude)
            .and(phase)
            .map_collect(|&mag, &angle| Complex32::from_polar(mag, angle));
        Ok(Self { bins })
    }

    pub fn bins(&self) -> &Array2<Complex32> {
        &self.bins
    }

    pub fn freq_bins(&self) -> usize {
        self.bins.nrows()
    }

    pub fn frames(&self) -> usize {
        self.bins.ncols()
    }

    pub fn magnitude(&self) -> Array2<f32> {
        self.bins.mapv(|c| c.norm())
    }

    pub fn power(&self) -> Array2<f32> {
        self.bins.mapv(|c| c.norm_sqr())
    }

    /// Phase angle of every bin in `[-π, π]`.
    pub fn phase(&self) -> Array2<f32> {
        self.bins.mapv(|c| c.arg())
    }
}

/// Framed forward/inverse STFT with a fixed window, hop and padding policy.
#[derive(Clone)]
pub struct SpectralTransform {
    fft_size: usize,
    win_length: usize,
    hop_length: usize,
    center: bool,
    pad_mode: PadMode,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("fft_size", &self.fft_size)
            .field("win_length", &self.win_length)
            .field("hop_length", &self.hop_length)
            .field("center", &self.center)
            .field("pad_mode", &self.pad_mode)
            .finish_non_exhaustive()
    }
}

impl SpectralTransform {
    pub fn new(
        fft_size: usize,
        win_length: usize,
        hop_length: usize,
        window: WindowKind,
    ) -> Result<Self> {
        if fft_size == 0 {
            return Err(FeatureError::invalid_config("fft size must be positive"));
        }
        if win_length == 0 || win_length > fft_size {
            return Err(FeatureError::invalid_config(format!(
                "window length must be in 1..={fft_size} (got {win_length})"
            )));
        }
        if hop_length == 0 {
            return Err(FeatureError::invalid_config("hop length must be positive"));
        }

        let mut planner = FftPlanner::<f32>::new();
        Ok(Self {
            fft_size,
            win_length,
            hop_length,
            center: true,
            pad_mode: PadMode::Reflect,
            window: window.build(win_length, fft_size),
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
        })
    }

    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    pub fn with_pad_mode(mut self, pad_mode: PadMode) -> Self {
        self.pad_mode = pad_mode;
        self
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn win_length(&self) -> usize {
        self.win_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn freq_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// The analysis/synthesis window, already padded to `fft_size`.
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    fn pad_amount(&self) -> usize {
        if self.center {
            self.fft_size / 2
        } else {
            0
        }
    }

    /// Number of frames `forward` produces for a signal of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        let padded = len + 2 * self.pad_amount();
        if padded < self.fft_size {
            0
        } else {
            1 + (padded - self.fft_size) / self.hop_length
        }
    }

    pub fn forward(&self, signal: &[f32]) -> Result<Spectrogram> {
        if signal.is_empty() {
            return Err(FeatureError::EmptyInput("waveform has no samples"));
        }
        let padded = pad_signal(signal, self.pad_amount(), self.pad_mode);
        let frames = self.frame_count(signal.len());
        if frames == 0 {
            return Err(FeatureError::shape(
                "stft (signal shorter than fft size)",
                self.fft_size,
                padded.len(),
            ));
        }

        let freq_bins = self.freq_bins();
        let mut bins = Array2::from_elem((freq_bins, frames), Complex32::new(0.0, 0.0));
        let mut buffer = vec![Complex32::new(0.0, 0.0); self.fft_size];
        let mut scratch = vec![Complex32::new(0.0, 0.0); self.forward.get_inplace_scratch_len()];

        for frame in 0..frames {
            let start = frame * self.hop_length;
            let segment = &padded[start..start + self.fft_size];
            for ((slot, &sample), &w) in buffer.iter_mut().zip(segment).zip(&self.window) {
                *slot = Complex32::new(sample * w, 0.0);
            }
            self.forward.process_with_scratch(&mut buffer, &mut scratch);
            for (bin, value) in buffer[..freq_bins].iter().enumerate() {
                bins[[bin, frame]] = *value;
            }
        }

        Ok(Spectrogram { bins })
    }

    /// Overlap-add inverse. Without `length`, the output covers every frame
    /// minus the centering pad; with it, the output is trimmed or zero-padded.
    pub fn inverse(&self, spectrogram: &Spectrogram, length: Option<usize>) -> Result<Vec<f32>> {
        if spectrogram.freq_bins() != self.freq_bins() {
            return Err(FeatureError::shape(
                "istft (frequency bins)",
                self.freq_bins(),
                spectrogram.freq_bins(),
            ));
        }
        let frames = spectrogram.frames();
        if frames == 0 {
            return Err(FeatureError::EmptyInput("spectrogram has no frames"));
        }

        let n = self.fft_size;
        let freq_bins = self.freq_bins();
        let total = n + self.hop_length * (frames - 1);
        let mut output = vec![0.0_f32; total];
        let mut window_sum = vec![0.0_f32; total];
        let mut buffer = vec![Complex32::new(0.0, 0.0); n];
        let mut scratch = vec![Complex32::new(0.0, 0.0); self.inverse.get_inplace_scratch_len()];
        let scale = 1.0 / n as f32;

        for (frame, column) in spectrogram.bins.columns().into_iter().enumerate() {
            for (bin, value) in column.iter().enumerate() {
                buffer[bin] = *value;
            }
            // Hermitian extension; DC (and Nyquist for even sizes) must be real.
            buffer[0].im = 0.0;
            if n % 2 == 0 {
                buffer[n / 2].im = 0.0;
            }
            for bin in freq_bins..n {
                buffer[bin] = buffer[n - bin].conj();
            }
            self.inverse.process_with_scratch(&mut buffer, &mut scratch);

            let start = frame * self.hop_length;
            for (offset, (&w, value)) in self.window.iter().zip(buffer.iter()).enumerate() {
                output[start + offset] += value.re * scale * w;
                window_sum[start + offset] += w * w;
            }
        }

        for (sample, &norm) in output.iter_mut().zip(&window_sum) {
            if norm > WINDOW_SUM_FLOOR {
                *sample /= norm;
            }
        }

        let pad = self.pad_amount().min(total);
        let mut signal = output.split_off(pad);
        match length {
            Some(length) => signal.resize(length, 0.0),
            None => signal.truncate(total.saturating_sub(2 * pad)),
        }
        Ok(signal)
    }
}

/// Extend `signal` by `pad` samples on both sides.
fn pad_signal(signal: &[f32], pad: usize, mode: PadMode) -> Vec<f32> {
    if pad == 0 {
        return signal.to_vec();
    }
    let len = signal.len() as isize;
    let mut padded = Vec::with_capacity(signal.len() + 2 * pad);
    let sample_at = |index: isize| -> f32 {
        if (0..len).contains(&index) {
            return signal[index as usize];
        }
        match mode {
            PadMode::Zero => 0.0,
            PadMode::Replicate => signal[index.clamp(0, len - 1) as usize],
            PadMode::Reflect => signal[reflect_index(index, len)],
        }
    };
    for index in -(pad as isize)..len + pad as isize {
        padded.push(sample_at(index));
    }
    padded
}

/// Fold an out-of-range index back into `0..len` by repeated mirroring.
fn reflect_index(index: isize, len: isize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let folded = index.rem_euclid(period);
    if folded >= len {
        (period - folded) as usize
    } else {
        folded as usize
    }
}

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FeatureError, Result};

pub const DEFAULT_DELTA_WINDOW: usize = 2;

/// How frames outside the sequence are filled when a kernel overhangs an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    #[default]
    Zero,
    Replicate,
}

/// Regression filters for delta features up to a fixed order.
///
/// Kernel 0 is the identity `[1]`; kernel `i` is kernel `i-1` convolved with the
/// `±window` regression ramp and divided by `Σ j²`. All kernels are zero-padded
/// to the length of the highest-order one, so they share a center tap.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaFilterBank {
    kernels: Vec<Vec<f32>>,
    order: usize,
    window: usize,
    edge_mode: EdgeMode,
}

impl DeltaFilterBank {
    pub fn new(order: usize, window: usize) -> Result<Self> {
        if order > 0 && window == 0 {
            return Err(FeatureError::invalid_config(
                "delta window size must be positive when delta order >= 1",
            ));
        }
        let kernels = build_kernels(order, window)
            .into_iter()
            .map(|kernel| kernel.into_iter().map(|tap| tap as f32).collect())
            .collect();
        debug!(order, window, "built delta filter bank");
        Ok(Self {
            kernels,
            order,
            window,
            edge_mode: EdgeMode::default(),
        })
    }

    pub fn with_edge_mode(mut self, edge_mode: EdgeMode) -> Self {
        self.edge_mode = edge_mode;
        self
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn kernels(&self) -> &[Vec<f32>] {
        &self.kernels
    }

    pub fn channels(&self) -> usize {
        self.order + 1
    }

    /// Apply every kernel along time to a `(frames × dims)` matrix.
    ///
    /// Returns `(frames × dims·(order+1))`, channel-major: the static block
    /// first, then each derivative order.
    pub fn apply(&self, features: &Array2<f32>) -> Array2<f32> {
        let (frames, dims) = features.dim();
        let mut output = Array2::<f32>::zeros((frames, dims * self.channels()));
        let taps = self.kernels.first().map_or(1, Vec::len);
        let half = (taps / 2) as isize;

        for (channel, kernel) in self.kernels.iter().enumerate() {
            let mut block = output.slice_mut(s![.., channel * dims..(channel + 1) * dims]);
            for t in 0..frames {
                let mut row = block.row_mut(t);
                for (k, &coeff) in kernel.iter().enumerate() {
                    if coeff == 0.0 {
                        continue;
                    }
                    let source = t as isize + k as isize - half;
                    let source = match self.source_frame(source, frames) {
                        Some(index) => index,
                        None => continue,
                    };
                    row.scaled_add(coeff, &features.row(source));
                }
            }
        }
        output
    }

    fn source_frame(&self, index: isize, frames: usize) -> Option<usize> {
        if (0..frames as isize).contains(&index) {
            return Some(index as usize);
        }
        match self.edge_mode {
            EdgeMode::Zero => None,
            EdgeMode::Replicate => Some(index.clamp(0, frames as isize - 1) as usize),
        }
    }
}

fn build_kernels(order: usize, window: usize) -> Vec<Vec<f64>> {
    let window = window as isize;
    let mut kernels: Vec<Vec<f64>> = vec![vec![1.0]];
    for i in 1..=order {
        let previous = &kernels[i - 1];
        let prev_offset = ((previous.len() - 1) / 2) as isize;
        let offset = prev_offset + window;
        let mut current = vec![0.0; previous.len() + 2 * window as usize];
        let mut normalizer = 0.0;
        for j in -window..=window {
            normalizer += (j * j) as f64;
            for k in -prev_offset..=prev_offset {
                current[(j + k + offset) as usize] +=
                    j as f64 * previous[(k + prev_offset) as usize];
            }
        }
        for tap in current.iter_mut() {
            *tap /= normalizer;
        }
        kernels.push(current);
    }

    let longest = kernels.last().map_or(1, Vec::len);
    kernels
        .into_iter()
        .map(|kernel| {
            let pad = (longest - kernel.len()) / 2;
            let mut padded = vec![0.0; longest];
            padded[pad..pad + kernel.len()].copy_from_slice(&kernel);
            padded
        })
        .collect()
}

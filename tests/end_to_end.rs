use std::f32::consts::PI;

use melwave::config::FeatureConfig;
use melwave::features::FeatureExtractor;
use melwave::types::Waveform;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

const SAMPLE_RATE: u32 = 16_000;

fn sine(freq: f32, secs: f32, amplitude: f32) -> Waveform {
    let len = (SAMPLE_RATE as f32 * secs) as usize;
    let samples = (0..len)
        .map(|i| (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * amplitude)
        .collect();
    Waveform::new(samples, SAMPLE_RATE)
}

/// Frequency (Hz) of the strongest spectral component above `floor_hz`.
fn dominant_frequency(samples: &[f32], floor_hz: f32) -> f32 {
    let mut buffer: Vec<Complex32> = samples.iter().map(|&s| Complex32::new(s, 0.0)).collect();
    FftPlanner::<f32>::new()
        .plan_fft_forward(buffer.len())
        .process(&mut buffer);
    let hz_per_bin = SAMPLE_RATE as f32 / buffer.len() as f32;
    let first = (floor_hz / hz_per_bin).ceil() as usize;
    let (bin, _) = buffer[first..buffer.len() / 2]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
        .unwrap();
    (first + bin) as f32 * hz_per_bin
}

#[test]
fn tone_survives_extraction_and_resynthesis() {
    let config = FeatureConfig::default();
    assert_eq!(config.fft_size, 1025);
    assert_eq!(config.mel_bands, 80);

    let extractor = FeatureExtractor::new(&config).unwrap();
    let input = sine(440.0, 1.0, 0.5);
    let features = extractor.extract(&input).unwrap();
    assert_eq!(features.ncols(), 80);
    assert_eq!(features.nrows(), extractor.transform().frame_count(input.len()));
    assert!(features.iter().all(|v| (0.0..=1.0).contains(v)));

    let mut rng = StdRng::seed_from_u64(7);
    let output = extractor.features_to_waveform(&features, &mut rng).unwrap();
    assert_eq!(output.sample_rate, SAMPLE_RATE);
    assert!(output.samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));

    let edges = extractor.filterbank().band_edges();
    let nearest = (0..extractor.filterbank().mel_bands())
        .min_by(|&a, &b| {
            (edges[a + 1] - 440.0)
                .abs()
                .total_cmp(&(edges[b + 1] - 440.0).abs())
        })
        .unwrap();
    let bandwidth = (edges[nearest + 2] - edges[nearest]) as f32;

    let peak = dominant_frequency(&output.samples, 50.0);
    assert!(
        (peak - 440.0).abs() <= bandwidth,
        "dominant frequency {peak} Hz is more than {bandwidth} Hz from 440 Hz"
    );
}

#[test]
fn analyze_exposes_linear_branch_that_inverts() {
    let config = FeatureConfig {
        fft_size: 512,
        mel_bands: 40,
        griffin_lim_iters: 10,
        ..FeatureConfig::default()
    };
    let extractor = FeatureExtractor::new(&config).unwrap();
    let input = sine(1_000.0, 0.5, 0.4);
    let features = extractor.analyze(&input).unwrap();
    assert_eq!(features.mel.nrows(), features.linear.nrows());
    assert_eq!(features.linear.ncols(), 257);

    let output = extractor
        .linear_features_to_waveform(&features.linear, &mut StdRng::seed_from_u64(1))
        .unwrap();
    let peak = dominant_frequency(&output.samples, 50.0);
    assert!((peak - 1_000.0).abs() <= 2.0 * 16_000.0 / 512.0, "peak at {peak} Hz");
}

#[test]
fn single_frame_inverts_with_even_fft_size() {
    let config = FeatureConfig {
        fft_size: 512,
        mel_bands: 40,
        griffin_lim_iters: 3,
        ..FeatureConfig::default()
    };
    let extractor = FeatureExtractor::new(&config).unwrap();
    let features = ndarray::Array2::from_elem((1, 40), 0.5_f32);
    let output = extractor
        .features_to_waveform(&features, &mut StdRng::seed_from_u64(0))
        .unwrap();
    assert!(!output.is_empty());
    assert!(output.samples.iter().all(|s| s.is_finite()));
}

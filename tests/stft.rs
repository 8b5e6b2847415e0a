use std::f32::consts::PI;

use melwave::features::{PadMode, SpectralTransform, WindowKind};

const SAMPLE_RATE: f32 = 16_000.0;

fn sine(freq: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin() * 0.5)
        .collect()
}

fn mean_abs_error(lhs: &[f32], rhs: &[f32]) -> f32 {
    assert_eq!(lhs.len(), rhs.len());
    lhs.iter().zip(rhs).map(|(a, b)| (a - b).abs()).sum::<f32>() / lhs.len() as f32
}

#[test]
fn hann_round_trip_is_near_identity() {
    let signal = sine(440.0, 16_000);
    let transform = SpectralTransform::new(512, 400, 160, WindowKind::Hann).unwrap();
    let spec = transform.forward(&signal).unwrap();
    let restored = transform.inverse(&spec, Some(signal.len())).unwrap();
    let error = mean_abs_error(&signal, &restored);
    assert!(error < 1e-4, "mean abs error {error}");
}

#[test]
fn odd_fft_size_round_trips() {
    let signal = sine(440.0, 8_000);
    let transform = SpectralTransform::new(1025, 400, 160, WindowKind::Hann).unwrap();
    let spec = transform.forward(&signal).unwrap();
    assert_eq!(spec.freq_bins(), 513);
    let restored = transform.inverse(&spec, Some(signal.len())).unwrap();
    let error = mean_abs_error(&signal, &restored);
    assert!(error < 1e-4, "mean abs error {error}");
}

#[test]
fn rectangular_window_round_trips() {
    let signal = sine(1_000.0, 4_000);
    let transform = SpectralTransform::new(256, 256, 64, WindowKind::Rectangular).unwrap();
    let spec = transform.forward(&signal).unwrap();
    let restored = transform.inverse(&spec, Some(signal.len())).unwrap();
    assert!(mean_abs_error(&signal, &restored) < 1e-4);
}

#[test]
fn replicate_padding_round_trips() {
    let signal = sine(300.0, 4_000);
    let transform = SpectralTransform::new(512, 512, 128, WindowKind::Hann)
        .unwrap()
        .with_pad_mode(PadMode::Replicate);
    let spec = transform.forward(&signal).unwrap();
    let restored = transform.inverse(&spec, Some(signal.len())).unwrap();
    assert!(mean_abs_error(&signal, &restored) < 1e-4);
}

#[test]
fn default_length_covers_all_frames() {
    let transform = SpectralTransform::new(512, 400, 160, WindowKind::Hann).unwrap();
    let spec = transform.forward(&sine(440.0, 16_000)).unwrap();
    assert_eq!(spec.frames(), 101);
    let restored = transform.inverse(&spec, None).unwrap();
    assert_eq!(restored.len(), 160 * 100);
}

#[test]
fn sine_peak_lands_in_expected_bin() {
    let transform = SpectralTransform::new(512, 512, 128, WindowKind::Hann).unwrap();
    let spec = transform.forward(&sine(1_000.0, 8_000)).unwrap();
    let magnitude = spec.magnitude();
    let middle = spec.frames() / 2;
    let peak = (0..spec.freq_bins())
        .max_by(|&a, &b| magnitude[[a, middle]].total_cmp(&magnitude[[b, middle]]))
        .unwrap();
    // 1000 Hz / (16000 / 512) = bin 32
    assert_eq!(peak, 32);
}

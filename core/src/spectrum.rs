//! Spectrum input for the receiver
//!
//! [`SpectrumSource`] is the capability the detector polls once per tick.
//! [`SampleAnalyser`] implements it over a PCM buffer the same way a Web
//! Audio `AnalyserNode` does over a live stream: Blackman window over the
//! most recent `fft_size` samples, magnitude spectrum, then exponential
//! smoothing against the previous frame.

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::{ModemError, Result};

/// Smallest and largest FFT sizes accepted (same bounds as Web Audio)
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// Audio input capability polled by the frequency detector
pub trait SpectrumSource {
    fn sample_rate(&self) -> f32;

    fn fft_size(&self) -> usize;

    /// Number of bins delivered per read
    fn bin_count(&self) -> usize {
        self.fft_size() / 2
    }

    /// Fill `bins` with the current amplitude per frequency bin.
    /// Returns `Ok(false)` once the input has ended.
    fn read_spectrum(&mut self, bins: &mut [f32]) -> Result<bool>;
}

/// Analyser over an in-memory recording, advancing one hop per read
pub struct SampleAnalyser {
    samples: Vec<f32>,
    sample_rate: u32,
    fft_size: usize,
    hop: usize,
    cursor: usize,
    smoothing: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
}

impl SampleAnalyser {
    /// `tick_rate_hz` sets how far the analysis window moves per read,
    /// emulating a poll at that rate over real-time audio.
    pub fn new(
        samples: Vec<f32>,
        sample_rate: u32,
        fft_size: usize,
        tick_rate_hz: u32,
        smoothing: f32,
    ) -> Result<Self> {
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(ModemError::InvalidConfig(format!(
                "fft size must be a power of two in {}..={}, got {}",
                MIN_FFT_SIZE, MAX_FFT_SIZE, fft_size
            )));
        }
        if sample_rate == 0 || tick_rate_hz == 0 {
            return Err(ModemError::InvalidConfig(
                "sample rate and tick rate must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&smoothing) {
            return Err(ModemError::InvalidConfig(format!(
                "smoothing must be within 0.0-1.0, got {}",
                smoothing
            )));
        }

        let hop = ((sample_rate / tick_rate_hz) as usize).max(1);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();

        Ok(Self {
            samples,
            sample_rate,
            fft_size,
            hop,
            cursor: hop,
            smoothing,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            fft,
            input,
            output,
        })
    }

    /// Samples advanced per read
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Position of the end of the next analysis window
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn load_window(&mut self) {
        let end = self.cursor.min(self.samples.len());
        let start = end.saturating_sub(self.fft_size);
        let frame = &self.samples[start..end];
        let pad = self.fft_size - frame.len();

        self.input[..pad].fill(0.0);
        for (i, &sample) in frame.iter().enumerate() {
            self.input[pad + i] = sample * self.window[pad + i];
        }
    }
}

impl SpectrumSource for SampleAnalyser {
    fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }

    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn read_spectrum(&mut self, bins: &mut [f32]) -> Result<bool> {
        if self.cursor > self.samples.len() {
            return Ok(false);
        }

        self.load_window();
        self.fft
            .process(&mut self.input, &mut self.output)
            .map_err(|e| ModemError::Spectrum(e.to_string()))?;

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (i, value) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.output[i].norm() * scale;
            *value = tau * *value + (1.0 - tau) * magnitude;
        }

        let n = bins.len().min(self.smoothed.len());
        bins[..n].copy_from_slice(&self.smoothed[..n]);
        self.cursor += self.hop;
        Ok(true)
    }
}

/// Blackman window (alpha = 0.16), as used by Web Audio analysers
fn blackman_window(len: usize) -> Vec<f32> {
    let a0 = 0.42;
    let a1 = 0.5;
    let a2 = 0.08;
    (0..len)
        .map(|i| {
            let x = i as f32 / len as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    fn peak_bin(bins: &[f32]) -> usize {
        let mut idx = 0;
        for (i, &v) in bins.iter().enumerate() {
            if v > bins[idx] {
                idx = i;
            }
        }
        idx
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(SampleAnalyser::new(vec![], 48000, 1000, 60, 0.8).is_err());
        assert!(SampleAnalyser::new(vec![], 48000, 16, 60, 0.8).is_err());
        assert!(SampleAnalyser::new(vec![], 48000, 2048, 0, 0.8).is_err());
        assert!(SampleAnalyser::new(vec![], 48000, 2048, 60, 1.5).is_err());
    }

    #[test]
    fn test_peak_matches_tone() {
        let rate = 48000;
        let mut analyser = SampleAnalyser::new(sine(1000.0, rate, 9600), rate, 2048, 60, 0.0).unwrap();
        let mut bins = vec![0.0; analyser.bin_count()];
        for _ in 0..4 {
            assert!(analyser.read_spectrum(&mut bins).unwrap());
        }
        let frequency = peak_bin(&bins) as f32 * rate as f32 / 2048.0;
        assert!((frequency - 1000.0).abs() <= 12.0, "peak at {} Hz", frequency);
    }

    #[test]
    fn test_hop_follows_tick_rate() {
        let analyser = SampleAnalyser::new(vec![0.0; 100], 48000, 2048, 60, 0.8).unwrap();
        assert_eq!(analyser.hop(), 800);
    }

    #[test]
    fn test_input_end_is_reported() {
        let mut analyser = SampleAnalyser::new(vec![0.1; 1600], 16000, 256, 10, 0.5).unwrap();
        let mut bins = vec![0.0; analyser.bin_count()];
        assert!(analyser.read_spectrum(&mut bins).unwrap());
        assert!(!analyser.read_spectrum(&mut bins).unwrap());
        assert!(!analyser.read_spectrum(&mut bins).unwrap());
    }

    #[test]
    fn test_silence_is_flat_zero() {
        let mut analyser = SampleAnalyser::new(vec![0.0; 4096], 48000, 1024, 60, 0.8).unwrap();
        let mut bins = vec![1.0; analyser.bin_count()];
        assert!(analyser.read_spectrum(&mut bins).unwrap());
        assert!(bins.iter().all(|&b| b == 0.0));
    }
}

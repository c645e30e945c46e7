use std::f32::consts::PI;

use crate::config::Waveform;
use crate::error::Result;

/// Edge taper ratio (2% on each side, enough to avoid clicks)
const TONE_EDGE_TAPER_RATIO: f32 = 0.02;

/// Minimum taper samples
const TONE_MIN_TAPER_SAMPLES: usize = 32;

/// One playback request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Frequency in Hz
    pub frequency: f32,
    pub duration_ms: u32,
    /// 0-100
    pub volume: u8,
    pub waveform: Waveform,
}

impl Tone {
    /// Linear amplitude for the volume setting
    pub fn gain(&self) -> f32 {
        self.volume.min(100) as f32 * 0.01
    }

    pub fn sample_count(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.duration_ms as u64 / 1000) as usize
    }
}

/// Audio output capability.
///
/// `play` must not return before the tone has finished sounding: the
/// sequencer relies on this to keep tones strictly sequential.
pub trait TonePlayer {
    fn play(&mut self, tone: &Tone) -> Result<()>;
}

impl<P: TonePlayer + ?Sized> TonePlayer for &mut P {
    fn play(&mut self, tone: &Tone) -> Result<()> {
        (**self).play(tone)
    }
}

/// Player that only records the requested tones
#[derive(Debug, Default, Clone)]
pub struct ToneRecorder {
    pub tones: Vec<Tone>,
}

impl ToneRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frequencies(&self) -> Vec<f32> {
        self.tones.iter().map(|t| t.frequency).collect()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.tones.iter().map(|t| t.duration_ms as u64).sum()
    }
}

impl TonePlayer for ToneRecorder {
    fn play(&mut self, tone: &Tone) -> Result<()> {
        self.tones.push(*tone);
        Ok(())
    }
}

/// Oscillator rendering tones to mono PCM samples in [-1, 1]
pub struct ToneSynth {
    sample_rate: u32,
}

impl ToneSynth {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render a single tone
    pub fn render(&self, tone: &Tone) -> Vec<f32> {
        let len = tone.sample_count(self.sample_rate);
        let sample_rate = self.sample_rate as f32;
        let gain = tone.gain();

        let mut samples: Vec<f32> = (0..len)
            .map(|i| {
                let cycles = tone.frequency * i as f32 / sample_rate;
                oscillator(tone.waveform, cycles.fract()) * gain
            })
            .collect();

        self.apply_edge_taper(&mut samples);
        samples
    }

    /// Render a sequence of tones back to back
    pub fn render_all(&self, tones: &[Tone]) -> Vec<f32> {
        let mut samples = Vec::new();
        for tone in tones {
            samples.extend_from_slice(&self.render(tone));
        }
        samples
    }

    fn taper_length(&self, len: usize) -> usize {
        let mut taper = ((len as f32) * TONE_EDGE_TAPER_RATIO).round() as usize;
        if taper < TONE_MIN_TAPER_SAMPLES {
            taper = TONE_MIN_TAPER_SAMPLES;
        }
        taper.min(len / 2)
    }

    fn apply_edge_taper(&self, samples: &mut [f32]) {
        let taper = self.taper_length(samples.len());
        let len = samples.len();
        for i in 0..taper {
            let weight = (PI * (i as f32 / taper as f32) / 2.0).sin().powi(2);
            samples[i] *= weight;
            samples[len - 1 - i] *= weight;
        }
    }
}

/// One period of the waveform, `phase` in [0, 1)
fn oscillator(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => (2.0 * PI * phase).sin(),
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * phase - 1.0,
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frequency: f32, waveform: Waveform) -> Tone {
        Tone {
            frequency,
            duration_ms: 100,
            volume: 50,
            waveform,
        }
    }

    #[test]
    fn test_render_length_and_amplitude() {
        let synth = ToneSynth::new(48000);
        let samples = synth.render(&tone(440.0, Waveform::Sine));
        assert_eq!(samples.len(), 4800);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.5 + 1e-6, "peak {} exceeds volume", peak);
        assert!(peak > 0.45, "peak {} too low", peak);
    }

    #[test]
    fn test_edges_are_tapered() {
        let synth = ToneSynth::new(48000);
        for waveform in [Waveform::Sine, Waveform::Square, Waveform::Sawtooth, Waveform::Triangle] {
            let samples = synth.render(&tone(1000.0, waveform));
            assert_eq!(samples[0], 0.0, "{} should start silent", waveform);
            assert!(samples[samples.len() - 1].abs() < 1e-3);
        }
    }

    #[test]
    fn test_zero_volume_is_silent() {
        let synth = ToneSynth::new(16000);
        let mut t = tone(800.0, Waveform::Square);
        t.volume = 0;
        assert!(synth.render(&t).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_recorder_keeps_order() {
        let mut recorder = ToneRecorder::new();
        recorder.play(&tone(440.0, Waveform::Sine)).unwrap();
        recorder.play(&tone(528.0, Waveform::Sine)).unwrap();
        assert_eq!(recorder.frequencies(), vec![440.0, 528.0]);
        assert_eq!(recorder.total_duration_ms(), 200);
    }

    #[test]
    fn test_render_all_concatenates() {
        let synth = ToneSynth::new(8000);
        let tones = [tone(440.0, Waveform::Sine), tone(880.0, Waveform::Triangle)];
        assert_eq!(synth.render_all(&tones).len(), 1600);
    }
}

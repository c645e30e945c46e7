use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use beepwave_core::{ModemError, Tone, TonePlayer, ToneSynth};
use hound::{SampleFormat, WavSpec, WavWriter};

/// Renders every requested tone into a 16-bit mono WAV file
pub struct WavTonePlayer {
    synth: ToneSynth,
    writer: WavWriter<BufWriter<File>>,
    samples_written: usize,
}

impl WavTonePlayer {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, hound::Error> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(Self {
            synth: ToneSynth::new(sample_rate),
            writer: WavWriter::create(path, spec)?,
            samples_written: 0,
        })
    }

    pub fn samples_written(&self) -> usize {
        self.samples_written
    }

    pub fn finalize(self) -> Result<(), hound::Error> {
        self.writer.finalize()
    }
}

impl TonePlayer for WavTonePlayer {
    fn play(&mut self, tone: &Tone) -> beepwave_core::Result<()> {
        for sample in self.synth.render(tone) {
            // Clamp to [-1.0, 1.0] range to avoid overflow, then scale to i16
            let clamped = sample.clamp(-1.0, 1.0);
            self.writer
                .write_sample((clamped * 32767.0) as i16)
                .map_err(|e| ModemError::Playback(e.to_string()))?;
            self.samples_written += 1;
        }
        Ok(())
    }
}

/// Read a WAV file as mono f32 samples, averaging channels
pub fn read_mono(path: &Path) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    tracing::info!(
        "read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(format!("Unsupported WAV format: {:?} {} bits", format, bits).into());
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use beepwave_core::Waveform;

    #[test]
    fn test_player_writes_readable_wav() {
        let dir = std::env::temp_dir().join("beepwave-wav-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tone.wav");

        let mut player = WavTonePlayer::create(&path, 8000).unwrap();
        let tone = Tone {
            frequency: 440.0,
            duration_ms: 250,
            volume: 50,
            waveform: Waveform::Sine,
        };
        player.play(&tone).unwrap();
        player.play(&tone).unwrap();
        assert_eq!(player.samples_written(), 4000);
        player.finalize().unwrap();

        let (samples, rate) = read_mono(&path).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(samples.len(), 4000);
        assert!(samples.iter().all(|s| s.abs() <= 0.51));
    }
}

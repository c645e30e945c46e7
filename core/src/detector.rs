use std::thread;
use std::time::{Duration, Instant};

use crate::codec::FrequencyCodec;
use crate::error::Result;
use crate::session::RunningFlag;
use crate::spectrum::SpectrumSource;

/// A change of dominant symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Dominant frequency in Hz (bin resolution)
    pub frequency: f32,
    /// Symbol for the frequency, None for separator tones, silence or noise
    /// outside the symbol bands
    pub symbol: Option<u8>,
}

/// Result of polling the spectrum once
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// Same symbol as the last report
    Unchanged,
    Changed(Detection),
    /// The input has no more audio
    EndOfInput,
}

/// Paces the detector loop
pub trait TickSource {
    /// Block until the next tick is due
    fn wait_tick(&mut self);
}

/// Fixed-rate ticks, e.g. a display refresh rate
pub struct IntervalTicker {
    period: Duration,
    next: Option<Instant>,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn from_rate(rate_hz: u32) -> Self {
        Self::new(Duration::from_secs(1) / rate_hz.max(1))
    }
}

impl TickSource for IntervalTicker {
    fn wait_tick(&mut self) {
        let now = Instant::now();
        let deadline = self.next.unwrap_or(now);
        if deadline > now {
            thread::sleep(deadline - now);
        }
        // Don't try to catch up on missed ticks
        self.next = Some(deadline.max(now) + self.period);
    }
}

/// No pacing; for sources that advance on every read (recordings)
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeRunning;

impl TickSource for FreeRunning {
    fn wait_tick(&mut self) {}
}

/// Index of the loudest bin. Ties keep the lowest index.
pub fn loudest_bin(bins: &[f32]) -> usize {
    let mut idx = 0;
    for (i, &amplitude) in bins.iter().enumerate() {
        if amplitude > bins[idx] {
            idx = i;
        }
    }
    idx
}

/// Tracks the dominant frequency of a spectrum source and reports it only
/// when it maps to a different symbol than the last report.
///
/// A tone held for its whole duration spans many ticks; only its first
/// tick is reported.
pub struct FrequencyDetector<S: SpectrumSource> {
    source: S,
    codec: FrequencyCodec,
    bins: Vec<f32>,
    last_frequency: Option<f32>,
}

impl<S: SpectrumSource> FrequencyDetector<S> {
    pub fn new(source: S, codec: FrequencyCodec) -> Self {
        let bins = vec![0.0; source.bin_count()];
        Self {
            source,
            codec,
            bins,
            last_frequency: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn last_frequency(&self) -> Option<f32> {
        self.last_frequency
    }

    /// Release the input
    pub fn into_source(self) -> S {
        self.source
    }

    fn last_symbol(&self) -> Option<u8> {
        self.last_frequency.and_then(|f| self.codec.symbol_of(f))
    }

    /// Feed the dominant frequency of one tick through the debounce
    pub fn observe(&mut self, frequency: f32) -> Option<Detection> {
        let symbol = self.codec.symbol_of(frequency);
        if symbol == self.last_symbol() {
            return None;
        }
        self.last_frequency = Some(frequency);
        Some(Detection { frequency, symbol })
    }

    /// Poll the source once
    pub fn tick(&mut self) -> Result<Tick> {
        if !self.source.read_spectrum(&mut self.bins)? {
            return Ok(Tick::EndOfInput);
        }
        let idx = loudest_bin(&self.bins);
        let frequency = idx as f32 * self.source.sample_rate() / self.source.fft_size() as f32;
        Ok(match self.observe(frequency) {
            Some(detection) => {
                log::debug!(
                    "detected {:.2} Hz ({})",
                    detection.frequency,
                    detection
                        .symbol
                        .map_or_else(|| "no symbol".to_string(), |s| format!("0x{:x}", s))
                );
                Tick::Changed(detection)
            }
            None => Tick::Unchanged,
        })
    }

    /// Poll on every tick until `running` is cleared or the input ends.
    ///
    /// The flag is checked before waiting and again before reading, so a
    /// stop requested during the wait discards that tick.
    pub fn run<T, F>(&mut self, running: &RunningFlag, ticker: &mut T, mut on_detect: F) -> Result<()>
    where
        T: TickSource + ?Sized,
        F: FnMut(Detection),
    {
        while running.is_running() {
            ticker.wait_tick();
            if !running.is_running() {
                break;
            }
            match self.tick()? {
                Tick::Changed(detection) => on_detect(detection),
                Tick::Unchanged => {}
                Tick::EndOfInput => {
                    log::info!("audio input ended");
                    break;
                }
            }
        }
        Ok(())
    }
}

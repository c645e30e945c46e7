use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::FrequencyCodec;
use crate::error::{ModemError, Result};
use crate::{
    DEFAULT_MAX_FREQUENCY, DEFAULT_MIN_FREQUENCY, DEFAULT_SEPARATOR_FREQUENCY,
    DEFAULT_SYMBOL_DURATION_MS, DEFAULT_USE_SEPARATOR, DEFAULT_VOLUME,
};

/// Oscillator shape used for every tone of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Waveform {
    type Err = ModemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            other => Err(ModemError::InvalidConfig(format!("unknown waveform '{}'", other))),
        }
    }
}

/// Tone mapping and playback parameters shared by sender and receiver
///
/// Both ends must agree on `min_frequency`, `max_frequency` and
/// `separator_frequency`; the remaining fields only affect the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Frequency of symbol 0x0 (Hz)
    pub min_frequency: f32,
    /// Frequency of symbol 0xF (Hz)
    pub max_frequency: f32,
    /// Out-of-band tone played between symbols and as calibration/terminator (Hz)
    pub separator_frequency: f32,
    /// Duration of each symbol or separator tone (ms)
    pub symbol_duration_ms: u32,
    /// Playback volume, 0-100
    pub volume: u8,
    pub waveform: Waveform,
    /// Play a separator tone after every nibble
    pub use_separator: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            min_frequency: DEFAULT_MIN_FREQUENCY,
            max_frequency: DEFAULT_MAX_FREQUENCY,
            separator_frequency: DEFAULT_SEPARATOR_FREQUENCY,
            symbol_duration_ms: DEFAULT_SYMBOL_DURATION_MS,
            volume: DEFAULT_VOLUME,
            waveform: Waveform::default(),
            use_separator: DEFAULT_USE_SEPARATOR,
        }
    }
}

impl CodecConfig {
    /// Spacing between adjacent symbol frequencies
    pub fn delta_unit(&self) -> f32 {
        (self.max_frequency - self.min_frequency) / 15.0
    }

    pub fn codec(&self) -> FrequencyCodec {
        FrequencyCodec::new(self.min_frequency, self.delta_unit())
    }

    /// Check the ranges and move the separator out of the symbol bands.
    ///
    /// A separator that would quantize to a valid symbol is relocated to
    /// `max_frequency + delta_unit`.
    pub fn validate(mut self) -> Result<Self> {
        if !self.min_frequency.is_finite() || self.min_frequency <= 0.0 {
            return Err(ModemError::InvalidConfig(format!(
                "min_frequency must be positive, got {}",
                self.min_frequency
            )));
        }
        if !self.max_frequency.is_finite() || self.max_frequency <= self.min_frequency {
            return Err(ModemError::InvalidConfig(format!(
                "max_frequency ({}) must be above min_frequency ({})",
                self.max_frequency, self.min_frequency
            )));
        }
        if self.symbol_duration_ms == 0 {
            return Err(ModemError::InvalidConfig(
                "symbol_duration_ms must be at least 1".to_string(),
            ));
        }
        if self.volume > 100 {
            return Err(ModemError::InvalidConfig(format!(
                "volume must be within 0-100, got {}",
                self.volume
            )));
        }

        if !self.separator_frequency.is_finite()
            || self.codec().symbol_of(self.separator_frequency).is_some()
        {
            let relocated = self.max_frequency + self.delta_unit();
            log::warn!(
                "separator {} Hz falls inside the symbol bands, moved to {} Hz",
                self.separator_frequency,
                relocated
            );
            self.separator_frequency = relocated;
        }

        Ok(self)
    }
}

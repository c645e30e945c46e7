use crate::error::{ModemError, Result};
use crate::MAX_SYMBOL;

/// Maps hex nibbles to tone frequencies and back.
///
/// Symbol `s` sounds at `min_frequency + s * delta_unit`. The acceptance
/// band of each symbol is `[center - delta_unit/2 + 1, center + delta_unit/2]`
/// (for integer Hz): an exact half-unit offset rounds down, so adjacent
/// bands never share a frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyCodec {
    min_frequency: f32,
    delta_unit: f32,
}

impl FrequencyCodec {
    pub fn new(min_frequency: f32, delta_unit: f32) -> Self {
        Self {
            min_frequency,
            delta_unit,
        }
    }

    pub fn delta_unit(&self) -> f32 {
        self.delta_unit
    }

    /// Center frequency of a symbol
    pub fn frequency_of(&self, symbol: u8) -> f32 {
        self.min_frequency + symbol as f32 * self.delta_unit
    }

    /// Checked variant of [`frequency_of`](Self::frequency_of)
    pub fn try_frequency_of(&self, symbol: u8) -> Result<f32> {
        if symbol > MAX_SYMBOL {
            return Err(ModemError::InvalidSymbol(symbol));
        }
        Ok(self.frequency_of(symbol))
    }

    /// Quantize a frequency to its symbol.
    /// Returns None outside the 16 symbol bands.
    pub fn symbol_of(&self, frequency: f32) -> Option<u8> {
        if !frequency.is_finite() {
            return None;
        }
        let number = (frequency - self.min_frequency) / self.delta_unit;
        let rounded = if number - number.floor() == 0.5 {
            number.floor()
        } else {
            number.round()
        };
        if rounded < 0.0 || rounded > MAX_SYMBOL as f32 {
            return None;
        }
        Some(rounded as u8)
    }
}

/// Split a byte into its (high, low) nibbles
pub fn split_byte(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0F)
}

/// Rebuild a byte from its (high, low) nibbles
pub fn join_symbols(high: u8, low: u8) -> u8 {
    (high << 4) | (low & 0x0F)
}

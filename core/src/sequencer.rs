use std::io::Read;

use crate::codec::{split_byte, FrequencyCodec};
use crate::config::CodecConfig;
use crate::error::Result;
use crate::session::RunningFlag;
use crate::tone::{Tone, TonePlayer};
use crate::transfer::TransferReader;
use crate::{CALIBRATION_TONE_MS, TERMINATOR_TONE_MS};

/// Where the sender currently is in the transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Calibrating,
    Metadata,
    Terminator,
    Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every payload byte was played
    Completed { tones: usize, bytes: u64 },
    /// The running flag was cleared before the end
    Cancelled { tones: usize, bytes: u64 },
}

impl SendOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SendOutcome::Completed { .. })
    }
}

/// Drives the tone sequence of one transmission.
///
/// Order on the wire:
/// 1. calibration tone at the separator frequency (1 s)
/// 2. metadata JSON, two nibble tones per byte
/// 3. terminator tone at the separator frequency (1 s)
/// 4. payload bytes, two nibble tones per byte
///
/// With `use_separator` every nibble tone is followed by a separator tone,
/// so that repeated nibbles still produce a frequency change at the
/// receiver. Each tone is awaited before the next is requested.
pub struct TransmitSequencer {
    config: CodecConfig,
    codec: FrequencyCodec,
    phase: SendPhase,
    tones_played: usize,
}

impl TransmitSequencer {
    /// Validates `config` first, so an in-band separator is relocated
    /// before any tone is played.
    pub fn new(config: CodecConfig) -> Result<Self> {
        let config = config.validate()?;
        let codec = config.codec();
        Ok(Self {
            config,
            codec,
            phase: SendPhase::Idle,
            tones_played: 0,
        })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    /// Back to idle, ready for another file
    pub fn reset(&mut self) {
        self.phase = SendPhase::Idle;
        self.tones_played = 0;
    }

    /// Play the whole transmission for `reader`.
    ///
    /// `running` is checked before every tone; a tone already handed to the
    /// player always finishes. The sequencer is idle again on return.
    pub fn transmit<R, P>(
        &mut self,
        reader: &mut TransferReader<R>,
        player: &mut P,
        running: &RunningFlag,
    ) -> Result<SendOutcome>
    where
        R: Read,
        P: TonePlayer + ?Sized,
    {
        self.reset();
        let result = self.run_phases(reader, player, running);
        let tones = self.tones_played;
        let bytes = reader.position();
        self.reset();

        let completed = result?;
        let outcome = if completed {
            SendOutcome::Completed { tones, bytes }
        } else {
            SendOutcome::Cancelled { tones, bytes }
        };
        log::info!("transmission finished: {:?}", outcome);
        Ok(outcome)
    }

    fn run_phases<R, P>(
        &mut self,
        reader: &mut TransferReader<R>,
        player: &mut P,
        running: &RunningFlag,
    ) -> Result<bool>
    where
        R: Read,
        P: TonePlayer + ?Sized,
    {
        let separator = self.config.separator_frequency;

        // Lets the receiver's input level settle
        self.phase = SendPhase::Calibrating;
        log::info!("calibration tone at {} Hz", separator);
        if !self.play(player, running, separator, CALIBRATION_TONE_MS)? {
            return Ok(false);
        }

        self.phase = SendPhase::Metadata;
        let frame = reader.metadata().to_wire()?;
        log::info!(
            "sending metadata frame ({} bytes): {}",
            frame.len(),
            String::from_utf8_lossy(&frame)
        );
        for &byte in &frame {
            if !self.play_byte(player, running, byte)? {
                return Ok(false);
            }
        }

        self.phase = SendPhase::Terminator;
        log::info!("metadata terminated");
        if !self.play(player, running, separator, TERMINATOR_TONE_MS)? {
            return Ok(false);
        }

        self.phase = SendPhase::Payload;
        log::info!("sending payload ({} bytes)", reader.size_bytes());
        loop {
            if !running.is_running() {
                return Ok(false);
            }
            let Some(byte) = reader.read_next()? else {
                break;
            };
            if !self.play_byte(player, running, byte)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn play_byte<P>(&mut self, player: &mut P, running: &RunningFlag, byte: u8) -> Result<bool>
    where
        P: TonePlayer + ?Sized,
    {
        let (high, low) = split_byte(byte);
        log::debug!("byte 0x{:02x} -> 0x{:x} 0x{:x}", byte, high, low);

        let duration = self.config.symbol_duration_ms;
        let separator = self.config.separator_frequency;
        for symbol in [high, low] {
            if !self.play(player, running, self.codec.frequency_of(symbol), duration)? {
                return Ok(false);
            }
            if self.config.use_separator && !self.play(player, running, separator, duration)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Request one tone. Returns false, without playing, once cancelled.
    fn play<P>(
        &mut self,
        player: &mut P,
        running: &RunningFlag,
        frequency: f32,
        duration_ms: u32,
    ) -> Result<bool>
    where
        P: TonePlayer + ?Sized,
    {
        if !running.is_running() {
            log::info!("cancelled during {:?}", self.phase);
            return Ok(false);
        }
        let tone = Tone {
            frequency,
            duration_ms,
            volume: self.config.volume,
            waveform: self.config.waveform,
        };
        player.play(&tone)?;
        self.tones_played += 1;
        Ok(true)
    }
}

//! Acoustic file transfer modem
//!
//! Every byte travels as two tones (one per hex nibble) between 440 Hz and
//! 1760 Hz, optionally delimited by an out-of-band separator tone. The
//! receiver tracks the dominant spectral peak and rebuilds the bytes.

pub mod error;
pub mod config;
pub mod codec;
pub mod metadata;
pub mod transfer;
pub mod tone;
pub mod sequencer;
pub mod spectrum;
pub mod detector;
pub mod assembler;
pub mod session;

pub use assembler::{FrameAssembler, Stage};
pub use codec::FrequencyCodec;
pub use config::{CodecConfig, Waveform};
pub use detector::{Detection, FreeRunning, FrequencyDetector, IntervalTicker, TickSource};
pub use error::{ModemError, Result};
pub use metadata::FileMetadata;
pub use sequencer::{SendOutcome, TransmitSequencer};
pub use session::{ReceiverSession, Role, RunningFlag, SenderSession, SessionState};
pub use spectrum::{SampleAnalyser, SpectrumSource};
pub use tone::{Tone, TonePlayer, ToneRecorder, ToneSynth};
pub use transfer::{ReceivedFile, TransferReader, TransferSink};

// Codec defaults
pub const DEFAULT_MIN_FREQUENCY: f32 = 440.0; // Hz
pub const DEFAULT_MAX_FREQUENCY: f32 = 1760.0; // Hz
pub const DEFAULT_SEPARATOR_FREQUENCY: f32 = 1900.0; // Hz
pub const DEFAULT_SYMBOL_DURATION_MS: u32 = 270;
pub const DEFAULT_VOLUME: u8 = 50;
pub const DEFAULT_USE_SEPARATOR: bool = true;

/// Number of distinct symbols (one hex nibble)
pub const SYMBOL_COUNT: u8 = 16;
pub const MAX_SYMBOL: u8 = SYMBOL_COUNT - 1;

// Framing
pub const CALIBRATION_TONE_MS: u32 = 1000;
pub const TERMINATOR_TONE_MS: u32 = 1000;
/// Leading metadata byte `{` split into nibbles
pub const SYNC_HIGH: u8 = 0x7;
pub const SYNC_LOW: u8 = 0xB;

// Receiver analysis defaults (mirror a Web Audio AnalyserNode)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_TICK_RATE_HZ: u32 = 60; // display refresh

mod config;
mod wav;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use beepwave_core::session::{format_bytes, format_elapsed};
use beepwave_core::{
    CodecConfig, FreeRunning, ModemError, ReceiverSession, SampleAnalyser,
    SenderSession, ToneRecorder, TransferReader, Waveform, DEFAULT_FFT_SIZE, DEFAULT_SAMPLE_RATE,
    DEFAULT_SMOOTHING, DEFAULT_TICK_RATE_HZ,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::wav::WavTonePlayer;

#[derive(Parser)]
#[command(name = "beepwave")]
#[command(about = "Send files as audible tones and decode them from recordings")]
struct Cli {
    /// TOML file with codec settings (default: ./beepwave.toml or ~/.config/beepwave/config.toml)
    #[arg(long, global = true, value_name = "FILE.TOML")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a file's transmission to a WAV audio file
    Send {
        /// File to transmit
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Output sample rate
        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,

        /// MIME type announced to the receiver (default: guessed from the extension)
        #[arg(long)]
        mime_type: Option<String>,

        #[command(flatten)]
        codec: CodecArgs,
    },

    /// Decode a WAV recording and write the received file
    Receive {
        /// Recording to decode
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Directory the received file is written to
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,

        /// Analyser FFT size (power of two)
        #[arg(long, default_value_t = DEFAULT_FFT_SIZE)]
        fft_size: usize,

        /// Analyser polls per second of audio
        #[arg(long, default_value_t = DEFAULT_TICK_RATE_HZ)]
        tick_rate: u32,

        /// Analyser time smoothing, 0.0-1.0
        #[arg(long, default_value_t = DEFAULT_SMOOTHING)]
        smoothing: f32,

        #[command(flatten)]
        codec: CodecArgs,
    },

    /// Print the tone sequence for a file without rendering audio
    Plan {
        /// File to transmit
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        codec: CodecArgs,
    },
}

/// Overrides on top of the config file and environment
#[derive(Args, Debug)]
struct CodecArgs {
    /// Frequency of symbol 0x0 in Hz
    #[arg(long)]
    min_frequency: Option<f32>,

    /// Frequency of symbol 0xF in Hz
    #[arg(long)]
    max_frequency: Option<f32>,

    /// Separator, calibration and terminator frequency in Hz
    #[arg(long)]
    separator_frequency: Option<f32>,

    /// Duration of each tone in milliseconds
    #[arg(long)]
    symbol_duration: Option<u32>,

    /// Playback volume, 0-100
    #[arg(long)]
    volume: Option<u8>,

    /// sine, square, sawtooth or triangle
    #[arg(long, value_parser = parse_waveform)]
    waveform: Option<Waveform>,

    /// Don't play a separator tone after each nibble
    #[arg(long)]
    no_separator: bool,
}

impl CodecArgs {
    fn apply(&self, mut config: CodecConfig) -> CodecConfig {
        if let Some(v) = self.min_frequency {
            config.min_frequency = v;
        }
        if let Some(v) = self.max_frequency {
            config.max_frequency = v;
        }
        if let Some(v) = self.separator_frequency {
            config.separator_frequency = v;
        }
        if let Some(v) = self.symbol_duration {
            config.symbol_duration_ms = v;
        }
        if let Some(v) = self.volume {
            config.volume = v;
        }
        if let Some(v) = self.waveform {
            config.waveform = v;
        }
        if self.no_separator {
            config.use_separator = false;
        }
        config
    }
}

fn parse_waveform(s: &str) -> Result<Waveform, String> {
    s.parse().map_err(|e: ModemError| e.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let base = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Send {
            input,
            output,
            sample_rate,
            mime_type,
            codec,
        } => send_command(&input, &output, sample_rate, mime_type, codec.apply(base))?,
        Commands::Receive {
            input,
            output_dir,
            fft_size,
            tick_rate,
            smoothing,
            codec,
        } => receive_command(
            &input,
            &output_dir,
            fft_size,
            tick_rate,
            smoothing,
            codec.apply(base),
        )?,
        Commands::Plan { input, codec } => plan_command(&input, codec.apply(base))?,
    }

    Ok(())
}

fn open_transfer(
    input_path: &Path,
    mime_type: Option<String>,
) -> Result<TransferReader<File>, Box<dyn std::error::Error>> {
    let mut reader = TransferReader::open(input_path)?;
    if let Some(mime_type) = mime_type {
        reader.set_mime_type(mime_type);
    }
    tracing::info!(
        "read {} ({}, {})",
        input_path.display(),
        reader.metadata().mime_type,
        format_bytes(reader.size_bytes())
    );
    Ok(reader)
}

fn send_command(
    input_path: &Path,
    output_path: &Path,
    sample_rate: u32,
    mime_type: Option<String>,
    config: CodecConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = SenderSession::new(config)?;
    session.load(open_transfer(input_path, mime_type)?)?;

    let mut player = WavTonePlayer::create(output_path, sample_rate)?;
    let outcome = session.send(&mut player)?;
    let samples = player.samples_written();
    player.finalize()?;

    let duration = Duration::from_secs_f64(samples as f64 / sample_rate as f64);
    tracing::info!(
        "encoded {:?} as {} samples ({}) to {}",
        outcome,
        samples,
        format_elapsed(duration),
        output_path.display()
    );
    Ok(())
}

fn receive_command(
    input_path: &Path,
    output_dir: &Path,
    fft_size: usize,
    tick_rate: u32,
    smoothing: f32,
    config: CodecConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    // Keep the input error for reporting; start() only says whether it worked
    let mut open_error = None;
    let mut session = ReceiverSession::new(config)?;
    let started = session.start(|| {
        let source = wav::read_mono(input_path)
            .map_err(|e| ModemError::AudioDevice(format!("{}: {}", input_path.display(), e)))
            .and_then(|(samples, sample_rate)| {
                tracing::info!("extracted {} samples", samples.len());
                SampleAnalyser::new(samples, sample_rate, fft_size, tick_rate, smoothing)
            });
        if let Err(e) = &source {
            open_error = Some(e.to_string());
        }
        source
    });
    if !started {
        let reason = open_error.unwrap_or_else(|| "receiver already running".to_string());
        return Err(format!("cannot start receiver: {}", reason).into());
    }

    let Some(file) = session.run(&mut FreeRunning)? else {
        return Err(format!(
            "no complete transfer in {} (stopped at {:?})",
            input_path.display(),
            session.assembler().stage()
        )
        .into());
    };

    std::fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(file.safe_file_name());
    std::fs::write(&output_path, &file.bytes)?;
    tracing::info!(
        "decoded {} ({}, {}) to {}",
        file.name,
        file.mime_type,
        format_bytes(file.bytes.len() as u64),
        output_path.display()
    );
    Ok(())
}

fn plan_command(input_path: &Path, config: CodecConfig) -> Result<(), Box<dyn std::error::Error>> {
    let codec = config.codec();
    let mut session = SenderSession::new(config)?;
    session.load(open_transfer(input_path, None)?)?;

    let mut recorder = ToneRecorder::new();
    session.send(&mut recorder)?;

    for (i, tone) in recorder.tones.iter().enumerate() {
        let symbol = codec
            .symbol_of(tone.frequency)
            .map_or_else(|| "-".to_string(), |s| format!("{:x}", s));
        println!("{:6} {:9.2} Hz {:6} ms  {}", i, tone.frequency, tone.duration_ms, symbol);
    }

    tracing::info!(
        "{} tones, estimated transmission time {}",
        recorder.tones.len(),
        format_elapsed(Duration::from_millis(recorder.total_duration_ms()))
    );
    Ok(())
}

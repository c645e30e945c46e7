// ============================================================================
// INTEGRATION TESTS
// ============================================================================
// The audio-level tests synthesize the whole transmission at 48 kHz and run
// it through the analyser at 60 ticks per second, roughly 2500 FFTs per
// test. Run in release mode for faster feedback:
//   cargo test -p beepwave-core --test integration_test --release
// ============================================================================

use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use beepwave_core::{
    CodecConfig, FileMetadata, FrameAssembler, FreeRunning, ReceivedFile, ReceiverSession,
    SampleAnalyser, SenderSession, Stage, ToneRecorder, ToneSynth, TransferReader,
    DEFAULT_FFT_SIZE, DEFAULT_SAMPLE_RATE, DEFAULT_SMOOTHING, DEFAULT_TICK_RATE_HZ,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run a sender session into a recorder
fn record_transmission(config: &CodecConfig, name: &str, mime: &str, payload: &[u8]) -> ToneRecorder {
    let mut session = SenderSession::new(config.clone()).expect("Failed to create sender");
    let meta = FileMetadata::new(name, mime, payload.len() as u64);
    session
        .load(TransferReader::new(Cursor::new(payload.to_vec()), meta))
        .expect("Failed to load file");

    let mut recorder = ToneRecorder::new();
    let outcome = session.send(&mut recorder).expect("Failed to send");
    assert!(outcome.is_completed(), "Transmission was cancelled: {:?}", outcome);
    recorder
}

/// Decode PCM samples through the analyser and a receiver session
fn receive_samples(config: &CodecConfig, samples: Vec<f32>) -> Option<ReceivedFile> {
    let mut session = ReceiverSession::new(config.clone()).expect("Failed to create receiver");
    let started = session.start(|| {
        SampleAnalyser::new(
            samples,
            DEFAULT_SAMPLE_RATE,
            DEFAULT_FFT_SIZE,
            DEFAULT_TICK_RATE_HZ,
            DEFAULT_SMOOTHING,
        )
    });
    assert!(started, "Receiver failed to start");
    session.run(&mut FreeRunning).expect("Receiver failed")
}

#[test]
fn test_symbol_level_round_trip() {
    init_logging();
    let config = CodecConfig::default();
    let recorder = record_transmission(&config, "x.txt", "text/plain", &[0x41, 0x42, 0x43]);

    // Separator tones carry no symbol and are skipped by the assembler
    let codec = config.codec();
    let mut assembler = FrameAssembler::new();
    for frequency in recorder.frequencies() {
        if let Some(symbol) = codec.symbol_of(frequency) {
            assembler.push_symbol(symbol);
        }
    }

    assert_eq!(assembler.stage(), Stage::Complete);
    let file = assembler.take_received().expect("No file received");
    assert_eq!(file.name, "x.txt");
    assert_eq!(file.mime_type, "text/plain");
    assert_eq!(file.bytes, vec![0x41, 0x42, 0x43]);
}

#[test]
fn test_audio_round_trip() {
    init_logging();
    let config = CodecConfig::default();
    let payload = b"Hi!";
    let recorder = record_transmission(&config, "hello.txt", "text/plain", payload);

    let samples = ToneSynth::new(DEFAULT_SAMPLE_RATE).render_all(&recorder.tones);
    println!("Synthesized {} samples", samples.len());

    let file = receive_samples(&config, samples).expect("Receiver did not complete");
    assert_eq!(file.name, "hello.txt");
    assert_eq!(file.bytes, payload, "Decoded payload doesn't match original");
}

#[test]
fn test_audio_round_trip_repeated_nibbles() {
    // 0x00 0x11 0xFF repeat each nibble; only the separator keeps them apart
    init_logging();
    let config = CodecConfig::default();
    let payload = [0x00, 0x11, 0xFF];
    let recorder = record_transmission(&config, "rep.bin", "", &payload);

    let samples = ToneSynth::new(DEFAULT_SAMPLE_RATE).render_all(&recorder.tones);
    let file = receive_samples(&config, samples).expect("Receiver did not complete");
    assert_eq!(file.mime_type, "application/octet-stream");
    assert_eq!(file.bytes, payload);
}

#[test]
fn test_audio_round_trip_with_noise() {
    init_logging();
    let config = CodecConfig::default();
    let payload = [0xDE, 0xAD];
    let recorder = record_transmission(&config, "noisy.bin", "application/octet-stream", &payload);

    let mut samples = ToneSynth::new(DEFAULT_SAMPLE_RATE).render_all(&recorder.tones);
    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0f32, 0.05).expect("Invalid noise distribution");
    for sample in samples.iter_mut() {
        *sample += noise.sample(&mut rng);
    }

    let file = receive_samples(&config, samples).expect("Receiver did not complete with noise");
    assert_eq!(file.bytes, payload);
}

#[test]
fn test_audio_round_trip_after_silence() {
    init_logging();
    let config = CodecConfig::default();
    let recorder = record_transmission(&config, "late.txt", "text/plain", b"ok");

    // Receiver starts listening a second before the sender plays
    let mut samples = vec![0.0f32; DEFAULT_SAMPLE_RATE as usize];
    samples.extend(ToneSynth::new(DEFAULT_SAMPLE_RATE).render_all(&recorder.tones));

    let file = receive_samples(&config, samples).expect("Receiver did not complete");
    assert_eq!(file.bytes, b"ok");
}

#[test]
fn test_truncated_recording_does_not_complete() {
    init_logging();
    let config = CodecConfig::default();
    let recorder = record_transmission(&config, "cut.txt", "text/plain", b"abcdef");

    // Drop the last payload byte and its separators
    let tones = &recorder.tones[..recorder.tones.len() - 4];
    let samples = ToneSynth::new(DEFAULT_SAMPLE_RATE).render_all(tones);
    assert!(receive_samples(&config, samples).is_none());
}

#[test]
fn test_random_symbols_without_sync_never_open_gate() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut assembler = FrameAssembler::new();
    for _ in 0..10_000 {
        let symbol = loop {
            let s: u8 = rng.gen_range(0..16);
            if s != 0x7 {
                break s;
            }
        };
        assembler.push_symbol(symbol);
    }
    assert_eq!(assembler.stage(), Stage::AwaitingSync);
    assert!(assembler.meta_bytes().is_empty());
}

#[test]
fn test_custom_band_round_trip() {
    init_logging();
    // Wider band, shorter symbols, no separator
    let config = CodecConfig {
        min_frequency: 600.0,
        max_frequency: 3600.0,
        separator_frequency: 3900.0,
        symbol_duration_ms: 150,
        use_separator: false,
        ..CodecConfig::default()
    };
    // Without separators a detector would merge repeated nibbles of the
    // metadata frame, so this stays at the symbol level
    let recorder = record_transmission(&config, "w", "x", &[0x12, 0x34]);
    let codec = config.codec();
    let mut assembler = FrameAssembler::new();
    for frequency in recorder.frequencies() {
        if let Some(symbol) = codec.symbol_of(frequency) {
            assembler.push_symbol(symbol);
        }
    }
    let file = assembler.take_received().expect("No file received");
    assert_eq!(file.bytes, vec![0x12, 0x34]);
}

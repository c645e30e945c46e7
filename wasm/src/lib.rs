use std::io::Cursor;

use beepwave_core::{
    CodecConfig, FileMetadata, ModemError, ReceivedFile, ReceiverSession, SenderSession,
    SpectrumSource, Stage, Tone, ToneRecorder, ToneSynth, TransferReader, Waveform,
};
use wasm_bindgen::prelude::*;
use web_sys::AnalyserNode;

fn js_error<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Codec settings shared by [`WasmReceiver`] and [`tone_plan`]
#[wasm_bindgen]
#[derive(Clone)]
pub struct WasmCodecConfig {
    inner: CodecConfig,
}

#[wasm_bindgen]
impl WasmCodecConfig {
    /// Defaults: 440-1760 Hz, separator 1900 Hz, 270 ms tones, volume 50, sine
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmCodecConfig {
        WasmCodecConfig {
            inner: CodecConfig::default(),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn min_frequency(&self) -> f32 {
        self.inner.min_frequency
    }

    #[wasm_bindgen(setter)]
    pub fn set_min_frequency(&mut self, value: f32) {
        self.inner.min_frequency = value;
    }

    #[wasm_bindgen(getter)]
    pub fn max_frequency(&self) -> f32 {
        self.inner.max_frequency
    }

    #[wasm_bindgen(setter)]
    pub fn set_max_frequency(&mut self, value: f32) {
        self.inner.max_frequency = value;
    }

    #[wasm_bindgen(getter)]
    pub fn separator_frequency(&self) -> f32 {
        self.inner.separator_frequency
    }

    #[wasm_bindgen(setter)]
    pub fn set_separator_frequency(&mut self, value: f32) {
        self.inner.separator_frequency = value;
    }

    #[wasm_bindgen(getter)]
    pub fn symbol_duration_ms(&self) -> u32 {
        self.inner.symbol_duration_ms
    }

    #[wasm_bindgen(setter)]
    pub fn set_symbol_duration_ms(&mut self, value: u32) {
        self.inner.symbol_duration_ms = value;
    }

    #[wasm_bindgen(getter)]
    pub fn volume(&self) -> u8 {
        self.inner.volume
    }

    #[wasm_bindgen(setter)]
    pub fn set_volume(&mut self, value: u8) {
        self.inner.volume = value;
    }

    #[wasm_bindgen(getter)]
    pub fn use_separator(&self) -> bool {
        self.inner.use_separator
    }

    #[wasm_bindgen(setter)]
    pub fn set_use_separator(&mut self, value: bool) {
        self.inner.use_separator = value;
    }

    /// Oscillator type name, usable as `OscillatorNode.type`
    #[wasm_bindgen(getter)]
    pub fn waveform(&self) -> String {
        self.inner.waveform.to_string()
    }

    /// `sine`, `square`, `sawtooth` or `triangle`
    pub fn set_waveform(&mut self, value: &str) -> Result<(), JsValue> {
        self.inner.waveform = value.parse::<Waveform>().map_err(js_error)?;
        Ok(())
    }

    /// Frequency for a symbol 0-15
    pub fn frequency_of(&self, symbol: u8) -> Result<f32, JsValue> {
        self.inner.codec().try_frequency_of(symbol).map_err(js_error)
    }

    /// Symbol for a frequency, undefined outside the symbol bands
    pub fn symbol_of(&self, frequency: f32) -> Option<u8> {
        self.inner.codec().symbol_of(frequency)
    }
}

impl Default for WasmCodecConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Live analyser node as a spectrum source
struct AnalyserSource {
    node: AnalyserNode,
    sample_rate: f32,
    bytes: Vec<u8>,
}

impl AnalyserSource {
    fn new(node: AnalyserNode, sample_rate: f32) -> beepwave_core::Result<Self> {
        check_input(sample_rate, node.frequency_bin_count() as usize)?;
        Ok(Self {
            node,
            sample_rate,
            bytes: Vec::new(),
        })
    }
}

/// An analyser with no bins or a context without a usable rate cannot
/// be decoded from
fn check_input(sample_rate: f32, bin_count: usize) -> beepwave_core::Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(ModemError::AudioDevice(format!("invalid sample rate {}", sample_rate)));
    }
    if bin_count == 0 {
        return Err(ModemError::AudioDevice("analyser has no frequency bins".to_string()));
    }
    Ok(())
}

impl SpectrumSource for AnalyserSource {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn fft_size(&self) -> usize {
        self.node.fft_size() as usize
    }

    fn bin_count(&self) -> usize {
        self.node.frequency_bin_count() as usize
    }

    fn read_spectrum(&mut self, bins: &mut [f32]) -> beepwave_core::Result<bool> {
        self.bytes.resize(bins.len(), 0);
        self.node.get_byte_frequency_data(&mut self.bytes);
        for (bin, &level) in bins.iter_mut().zip(&self.bytes) {
            *bin = level as f32;
        }
        Ok(true)
    }
}

/// Receiver polled from `requestAnimationFrame`
#[wasm_bindgen]
pub struct WasmReceiver {
    session: ReceiverSession<AnalyserSource>,
    received: Option<ReceivedFile>,
}

#[wasm_bindgen]
impl WasmReceiver {
    #[wasm_bindgen(constructor)]
    pub fn new(config: &WasmCodecConfig) -> Result<WasmReceiver, JsValue> {
        ReceiverSession::new(config.inner.clone())
            .map(|session| WasmReceiver {
                session,
                received: None,
            })
            .map_err(js_error)
    }

    /// Start listening on an analyser fed by the microphone. Returns false
    /// if already running or the analyser is unusable.
    pub fn start(&mut self, analyser: AnalyserNode, sample_rate: f32) -> bool {
        self.received = None;
        self.session.start(|| AnalyserSource::new(analyser, sample_rate))
    }

    /// Read one spectrum frame. Returns true once the file is complete;
    /// ticks after the receiver stopped are no-ops.
    pub fn tick(&mut self) -> Result<bool, JsValue> {
        if !self.session.state().is_running() {
            return Ok(self.received.is_some());
        }
        let stage = self.session.poll().map_err(js_error)?;
        if stage == Stage::Complete && self.received.is_none() {
            self.received = self.session.take_received();
        }
        Ok(self.received.is_some())
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.session.state().is_running()
    }

    /// `awaiting-sync`, `metadata`, `payload` or `complete`
    #[wasm_bindgen(getter)]
    pub fn stage(&self) -> String {
        match self.session.assembler().stage() {
            Stage::AwaitingSync => "awaiting-sync",
            Stage::AcquiringMetadata => "metadata",
            Stage::ReceivingPayload => "payload",
            Stage::Complete => "complete",
        }
        .to_string()
    }

    /// Payload progress, 0.0-1.0
    #[wasm_bindgen(getter)]
    pub fn progress(&self) -> f64 {
        self.session.assembler().progress()
    }

    /// Metadata text received so far
    #[wasm_bindgen(getter)]
    pub fn metadata_text(&self) -> String {
        String::from_utf8_lossy(self.session.assembler().meta_bytes()).into_owned()
    }

    #[wasm_bindgen(getter)]
    pub fn file_name(&self) -> Option<String> {
        self.received.as_ref().map(|f| f.safe_file_name())
    }

    #[wasm_bindgen(getter)]
    pub fn mime_type(&self) -> Option<String> {
        self.received.as_ref().map(|f| f.mime_type.clone())
    }

    /// Hand the received bytes to JS (e.g. for a Blob download)
    pub fn take_file(&mut self) -> Option<Vec<u8>> {
        self.received.take().map(|f| f.bytes)
    }
}

/// Ordered tones of one transmission, for an oscillator-driven player
#[wasm_bindgen]
pub struct WasmTonePlan {
    tones: Vec<Tone>,
}

#[wasm_bindgen]
impl WasmTonePlan {
    #[wasm_bindgen(getter)]
    pub fn length(&self) -> usize {
        self.tones.len()
    }

    pub fn frequencies(&self) -> Vec<f32> {
        self.tones.iter().map(|t| t.frequency).collect()
    }

    pub fn durations_ms(&self) -> Vec<u32> {
        self.tones.iter().map(|t| t.duration_ms).collect()
    }

    /// Linear gain, 0.0-1.0
    #[wasm_bindgen(getter)]
    pub fn gain(&self) -> f32 {
        self.tones.first().map_or(0.0, |t| t.gain())
    }

    #[wasm_bindgen(getter)]
    pub fn total_duration_ms(&self) -> f64 {
        self.tones.iter().map(|t| t.duration_ms as f64).sum()
    }

    /// Render the whole plan to PCM for an `AudioBuffer`
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        ToneSynth::new(sample_rate).render_all(&self.tones)
    }
}

/// Tone sequence for sending `bytes` as a file named `name`
#[wasm_bindgen]
pub fn tone_plan(
    config: &WasmCodecConfig,
    name: &str,
    mime_type: &str,
    bytes: &[u8],
) -> Result<WasmTonePlan, JsValue> {
    let mut session = SenderSession::new(config.inner.clone()).map_err(js_error)?;
    let metadata = FileMetadata::new(name, mime_type, bytes.len() as u64);
    session
        .load(TransferReader::new(Cursor::new(bytes.to_vec()), metadata))
        .map_err(js_error)?;

    let mut recorder = ToneRecorder::new();
    session.send(&mut recorder).map_err(js_error)?;
    Ok(WasmTonePlan {
        tones: recorder.tones,
    })
}

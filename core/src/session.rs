//! Sender and receiver sessions
//!
//! A session owns everything one transfer needs: the codec configuration,
//! the transfer buffer and, on the receiving side, the frequency detector.
//! Cancellation goes through a [`RunningFlag`] that can be cloned into
//! another thread (a Ctrl-C handler, a UI) and is observed at the next
//! tone or tick boundary.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::assembler::{FrameAssembler, Stage};
use crate::config::CodecConfig;
use crate::detector::{FrequencyDetector, Tick, TickSource};
use crate::error::{ModemError, Result};
use crate::sequencer::{SendOutcome, TransmitSequencer};
use crate::spectrum::SpectrumSource;
use crate::tone::TonePlayer;
use crate::transfer::{ReceivedFile, TransferReader};

/// Shared cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    /// A stopped flag
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that is already running
    pub fn started() -> Self {
        let flag = Self::new();
        flag.start();
        flag
    }

    pub fn start(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub role: Role,
    pub running: RunningFlag,
    pub started_at: Option<Instant>,
}

impl SessionState {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            running: RunningFlag::new(),
            started_at: None,
        }
    }

    fn begin(&mut self) {
        self.running.start();
        self.started_at = Some(Instant::now());
    }

    fn end(&mut self) {
        self.running.stop();
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

/// Sends one file at a time through a tone player
pub struct SenderSession<R: Read> {
    state: SessionState,
    sequencer: TransmitSequencer,
    reader: Option<TransferReader<R>>,
}

impl<R: Read> SenderSession<R> {
    pub fn new(config: CodecConfig) -> Result<Self> {
        Ok(Self {
            state: SessionState::new(Role::Sender),
            sequencer: TransmitSequencer::new(config)?,
            reader: None,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &CodecConfig {
        self.sequencer.config()
    }

    /// Handle for cancelling from elsewhere
    pub fn running_flag(&self) -> RunningFlag {
        self.state.running.clone()
    }

    /// Select the file to send, replacing any previous one
    pub fn load(&mut self, reader: TransferReader<R>) -> Result<()> {
        if self.state.is_running() {
            return Err(ModemError::AlreadyRunning);
        }
        self.reader = Some(reader);
        Ok(())
    }

    pub fn reader(&self) -> Option<&TransferReader<R>> {
        self.reader.as_ref()
    }

    /// Play the loaded file. The file is released afterwards, whether the
    /// transmission completed or not.
    pub fn send<P>(&mut self, player: &mut P) -> Result<SendOutcome>
    where
        P: TonePlayer + ?Sized,
    {
        if self.state.is_running() {
            return Err(ModemError::AlreadyRunning);
        }
        let mut reader = self.reader.take().ok_or(ModemError::NotStarted)?;

        self.state.begin();
        log::info!(
            "sending {} ({} bytes)",
            reader.metadata().name,
            reader.size_bytes()
        );
        let result = self
            .sequencer
            .transmit(&mut reader, player, &self.state.running);
        let elapsed = self.state.elapsed();
        self.state.end();

        let outcome = result?;
        log::info!("sender stopped after {}", format_elapsed(elapsed));
        Ok(outcome)
    }

    /// Request cancellation; the tone in flight finishes first
    pub fn stop(&self) {
        self.state.running.stop();
    }
}

/// Listens for one file through a spectrum source
pub struct ReceiverSession<S: SpectrumSource> {
    state: SessionState,
    config: CodecConfig,
    detector: Option<FrequencyDetector<S>>,
    assembler: FrameAssembler,
}

impl<S: SpectrumSource> ReceiverSession<S> {
    pub fn new(config: CodecConfig) -> Result<Self> {
        Ok(Self {
            state: SessionState::new(Role::Receiver),
            config: config.validate()?,
            detector: None,
            assembler: FrameAssembler::new(),
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.state.running.clone()
    }

    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// The finished file, once the assembler is complete
    pub fn take_received(&mut self) -> Option<ReceivedFile> {
        self.assembler.take_received()
    }

    /// Acquire the audio input and arm the session.
    ///
    /// Returns false if a session is already running or the input could not
    /// be opened (e.g. microphone permission denied); the session then
    /// stays torn down.
    pub fn start<F>(&mut self, open_input: F) -> bool
    where
        F: FnOnce() -> Result<S>,
    {
        if self.state.is_running() {
            log::warn!("receiver already running");
            return false;
        }
        match open_input() {
            Ok(source) => {
                self.assembler.reset();
                self.detector = Some(FrequencyDetector::new(source, self.config.codec()));
                self.state.begin();
                log::info!("receiver started, acquiring metadata");
                true
            }
            Err(e) => {
                log::error!("cannot open audio input: {}", e);
                self.stop();
                false
            }
        }
    }

    /// Poll the input until the file is complete, the session is stopped or
    /// the input ends. The session is torn down on return.
    pub fn run<T>(&mut self, ticker: &mut T) -> Result<Option<ReceivedFile>>
    where
        T: TickSource + ?Sized,
    {
        let detector = self.detector.as_mut().ok_or(ModemError::NotStarted)?;
        let assembler = &mut self.assembler;
        let running = self.state.running.clone();
        let mut last_stage = assembler.stage();

        let result = detector.run(&self.state.running, ticker, |detection| {
            let stage = assembler.push_detection(&detection);
            if stage != last_stage {
                log::info!("receiver stage: {:?}", stage);
                last_stage = stage;
            }
            if stage == Stage::Complete {
                running.stop();
            }
        });

        let elapsed = self.state.elapsed();
        let received = self.assembler.take_received();
        if received.is_none() {
            log::warn!(
                "receiver stopped at {:?} after {} ({} payload bytes)",
                self.assembler.stage(),
                format_elapsed(elapsed),
                self.assembler.position()
            );
        } else {
            log::info!("receiver finished in {}", format_elapsed(elapsed));
        }
        self.stop();
        result?;
        Ok(received)
    }

    /// One tick of [`run`](Self::run) for callers that own the timing, such
    /// as an animation-frame callback. The session stops itself once the file
    /// is complete or the input ends; the file is then available from
    /// [`take_received`](Self::take_received).
    pub fn poll(&mut self) -> Result<Stage> {
        let detector = self.detector.as_mut().ok_or(ModemError::NotStarted)?;
        let tick = detector.tick()?;
        let before = self.assembler.stage();
        match tick {
            Tick::Changed(detection) => {
                self.assembler.push_detection(&detection);
            }
            Tick::Unchanged => {}
            Tick::EndOfInput => log::info!("audio input ended"),
        }

        let stage = self.assembler.stage();
        if stage != before {
            log::info!("receiver stage: {:?}", stage);
        }
        if stage == Stage::Complete || tick == Tick::EndOfInput {
            self.stop();
        }
        Ok(stage)
    }

    /// Stop listening and release the audio input
    pub fn stop(&mut self) {
        self.state.end();
        self.detector = None;
    }
}

/// `HH:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Human readable size with two decimals, e.g. `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exponent])
}

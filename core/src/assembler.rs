use crate::codec::join_symbols;
use crate::detector::Detection;
use crate::metadata::FileMetadata;
use crate::transfer::{ReceivedFile, TransferSink};
use crate::{MAX_SYMBOL, SYNC_HIGH, SYNC_LOW};

/// Receive progress of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No metadata byte accepted yet; the `{` gate is active
    AwaitingSync,
    /// Accumulating the metadata JSON until it parses
    AcquiringMetadata,
    ReceivingPayload,
    /// File finalized; further symbols are ignored
    Complete,
}

/// Receive-side state machine turning symbols back into a file.
///
/// Consecutive symbols pair up as (high, low) nibbles. Until the first
/// metadata byte is accepted, only a `0x7` followed by `0xB` (the opening
/// `{` of the JSON frame) is let through, which filters out noise heard
/// before the sender starts. The metadata frame ends when the accumulated
/// bytes parse as JSON. The payload has no gate: bytes are committed until
/// the announced size is reached.
///
/// There is no timeout: a frame that never parses keeps the assembler
/// accumulating indefinitely.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending_high: Option<u8>,
    pending_low: Option<u8>,
    meta_bytes: Vec<u8>,
    metadata: Option<FileMetadata>,
    sink: TransferSink,
    received: Option<ReceivedFile>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        if self.sink.is_finalized() {
            Stage::Complete
        } else if self.metadata.is_some() {
            Stage::ReceivingPayload
        } else if !self.meta_bytes.is_empty() {
            Stage::AcquiringMetadata
        } else {
            Stage::AwaitingSync
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage() == Stage::Complete
    }

    pub fn metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }

    /// Metadata bytes accepted so far
    pub fn meta_bytes(&self) -> &[u8] {
        &self.meta_bytes
    }

    /// Payload bytes committed so far
    pub fn position(&self) -> u64 {
        self.sink.position()
    }

    pub fn progress(&self) -> f64 {
        self.sink.progress()
    }

    /// The finalized file, once complete
    pub fn received(&self) -> Option<&ReceivedFile> {
        self.received.as_ref()
    }

    pub fn take_received(&mut self) -> Option<ReceivedFile> {
        self.received.take()
    }

    /// Drop all progress and wait for a new sync
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed a detector report. Reports without a symbol are ignored.
    pub fn push_detection(&mut self, detection: &Detection) -> Stage {
        match detection.symbol {
            Some(symbol) => self.push_symbol(symbol),
            None => self.stage(),
        }
    }

    /// Feed one detected symbol and return the resulting stage
    pub fn push_symbol(&mut self, symbol: u8) -> Stage {
        if symbol > MAX_SYMBOL {
            log::warn!("ignoring out-of-range symbol {}", symbol);
            return self.stage();
        }

        match self.stage() {
            Stage::AwaitingSync | Stage::AcquiringMetadata => self.push_metadata_symbol(symbol),
            Stage::ReceivingPayload => self.push_payload_symbol(symbol),
            Stage::Complete => {}
        }
        self.stage()
    }

    fn store_nibble(&mut self, symbol: u8) {
        if self.pending_high.is_none() {
            self.pending_high = Some(symbol);
        } else {
            self.pending_low = Some(symbol);
        }
    }

    fn take_byte(&mut self) -> Option<u8> {
        let (high, low) = (self.pending_high?, self.pending_low?);
        self.pending_high = None;
        self.pending_low = None;
        Some(join_symbols(high, low))
    }

    fn push_metadata_symbol(&mut self, symbol: u8) {
        self.store_nibble(symbol);

        if self.meta_bytes.is_empty() {
            if self.pending_high != Some(SYNC_HIGH) {
                self.pending_high = None;
                return;
            }
            if self.pending_low.is_some_and(|low| low != SYNC_LOW) {
                log::debug!("sync lost after 0x{:x}", SYNC_HIGH);
                self.pending_high = None;
                self.pending_low = None;
                return;
            }
        }

        let Some(byte) = self.take_byte() else {
            return;
        };
        if self.meta_bytes.is_empty() {
            log::info!("sync acquired, reading metadata");
        }
        self.meta_bytes.push(byte);

        // The frame is complete once it parses
        match FileMetadata::from_wire(&self.meta_bytes) {
            Ok(metadata) => {
                log::info!(
                    "metadata received: {} ({}, {} bytes)",
                    metadata.name,
                    metadata.mime_type,
                    metadata.size_bytes
                );
                self.sink.set_metadata(metadata.clone());
                self.metadata = Some(metadata);
                // Nothing to wait for with an empty file
                self.finalize_if_full();
            }
            Err(_) => {
                log::debug!("metadata so far: {}", String::from_utf8_lossy(&self.meta_bytes));
            }
        }
    }

    fn push_payload_symbol(&mut self, symbol: u8) {
        self.store_nibble(symbol);
        let Some(byte) = self.take_byte() else {
            return;
        };
        if self.sink.commit(byte) {
            log::debug!(
                "byte {}/{}: 0x{:02x}",
                self.sink.position(),
                self.sink.size_bytes(),
                byte
            );
        }
        self.finalize_if_full();
    }

    fn finalize_if_full(&mut self) {
        if let Some(file) = self.sink.finalize() {
            log::info!("transfer complete: {} ({} bytes)", file.name, file.bytes.len());
            self.received = Some(file);
        }
    }
}

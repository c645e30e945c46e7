use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;
use crate::metadata::FileMetadata;

fn ratio(position: u64, size_bytes: u64, done: bool) -> f64 {
    if size_bytes == 0 {
        return if done { 1.0 } else { 0.0 };
    }
    position as f64 / size_bytes as f64
}

/// Sequential byte source for the sender
///
/// Reads go through a buffered reader but are handed out one byte per call.
/// `position` never exceeds the announced size, even if the underlying
/// reader holds more data.
pub struct TransferReader<R: Read> {
    inner: BufReader<R>,
    metadata: FileMetadata,
    position: u64,
    exhausted: bool,
}

impl TransferReader<File> {
    /// Open a file for sending, with name, size and guessed MIME type
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = FileMetadata::from_path(path)?;
        let file = File::open(path)?;
        Ok(Self::new(file, metadata))
    }
}

impl<R: Read> TransferReader<R> {
    pub fn new(inner: R, metadata: FileMetadata) -> Self {
        Self {
            inner: BufReader::new(inner),
            metadata,
            position: 0,
            exhausted: false,
        }
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Announce a different MIME type. The size and name stay as opened.
    pub fn set_mime_type(&mut self, mime_type: impl Into<String>) {
        self.metadata.mime_type = mime_type.into();
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn size_bytes(&self) -> u64 {
        self.metadata.size_bytes
    }

    /// Next byte of the file, or None at end-of-data
    pub fn read_next(&mut self) -> Result<Option<u8>> {
        if self.exhausted || self.position >= self.metadata.size_bytes {
            self.exhausted = true;
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => {
                    log::warn!(
                        "source ended at byte {} of {}",
                        self.position,
                        self.metadata.size_bytes
                    );
                    self.exhausted = true;
                    return Ok(None);
                }
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.position += 1;
        Ok(Some(byte[0]))
    }

    pub fn progress(&self) -> f64 {
        ratio(self.position, self.metadata.size_bytes, self.exhausted)
    }
}

/// Completed transfer delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ReceivedFile {
    /// Name with any directory components removed, safe to join onto a
    /// destination directory
    pub fn safe_file_name(&self) -> String {
        let base = self
            .name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        match base {
            "" | "." | ".." => "received.bin".to_string(),
            name => name.to_string(),
        }
    }
}

/// Ordered byte sink for the receiver
#[derive(Debug, Default)]
pub struct TransferSink {
    metadata: Option<FileMetadata>,
    buffer: Vec<u8>,
    finalized: bool,
}

impl TransferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the sink from the received metadata frame
    pub fn set_metadata(&mut self, metadata: FileMetadata) {
        self.buffer = Vec::with_capacity(metadata.size_bytes.min(1 << 20) as usize);
        self.metadata = Some(metadata);
    }

    pub fn metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }

    pub fn position(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn size_bytes(&self) -> u64 {
        self.metadata.as_ref().map_or(0, |m| m.size_bytes)
    }

    pub fn is_full(&self) -> bool {
        self.metadata.is_some() && self.position() >= self.size_bytes()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Append a byte. Ignored before sizing or once the sink is full.
    /// Returns true if the byte was stored.
    pub fn commit(&mut self, byte: u8) -> bool {
        if self.metadata.is_none() || self.is_full() {
            return false;
        }
        self.buffer.push(byte);
        true
    }

    /// Produce the artifact. Only succeeds once, and only when full.
    pub fn finalize(&mut self) -> Option<ReceivedFile> {
        if self.finalized || !self.is_full() {
            return None;
        }
        let metadata = self.metadata.as_ref()?;
        self.finalized = true;
        Some(ReceivedFile {
            name: metadata.name.clone(),
            mime_type: metadata.mime_type.clone(),
            bytes: self.buffer.clone(),
        })
    }

    /// Fraction of the payload received. A full sink stays just below 1.0
    /// until [`finalize`](Self::finalize) has produced the file.
    pub fn progress(&self) -> f64 {
        if self.finalized {
            return 1.0;
        }
        ratio(self.position(), self.size_bytes(), false).min(1.0 - f64::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(data: &[u8]) -> TransferReader<Cursor<Vec<u8>>> {
        let meta = FileMetadata::new("data.bin", "", data.len() as u64);
        TransferReader::new(Cursor::new(data.to_vec()), meta)
    }

    #[test]
    fn test_reader_yields_bytes_in_order() {
        let mut r = reader(&[1, 2, 3]);
        assert_eq!(r.read_next().unwrap(), Some(1));
        assert_eq!(r.read_next().unwrap(), Some(2));
        assert_eq!(r.read_next().unwrap(), Some(3));
        assert_eq!(r.read_next().unwrap(), None);
        assert_eq!(r.read_next().unwrap(), None);
        assert_eq!(r.position(), 3);
    }

    #[test]
    fn test_reader_progress_monotonic() {
        let mut r = reader(&[9; 10]);
        let mut last = r.progress();
        assert_eq!(last, 0.0);
        while r.read_next().unwrap().is_some() {
            let p = r.progress();
            assert!(p >= last);
            if r.position() < 10 {
                assert!(p < 1.0);
            }
            last = p;
        }
        assert_eq!(r.progress(), 1.0);
    }

    #[test]
    fn test_reader_stops_at_announced_size() {
        let meta = FileMetadata::new("short", "", 2);
        let mut r = TransferReader::new(Cursor::new(vec![1, 2, 3, 4]), meta);
        assert_eq!(r.read_next().unwrap(), Some(1));
        assert_eq!(r.read_next().unwrap(), Some(2));
        assert_eq!(r.read_next().unwrap(), None);
    }

    #[test]
    fn test_open_reads_file_with_guessed_metadata() {
        let dir = std::env::temp_dir().join("beepwave-transfer-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hello.txt");
        std::fs::write(&path, b"hey").unwrap();

        let mut r = TransferReader::open(&path).unwrap();
        assert_eq!(r.metadata().name, "hello.txt");
        assert_eq!(r.metadata().mime_type, "text/plain");
        assert_eq!(r.size_bytes(), 3);

        r.set_mime_type("application/x-greeting");
        assert_eq!(r.metadata().mime_type, "application/x-greeting");
        assert_eq!(r.size_bytes(), 3);

        let mut bytes = Vec::new();
        while let Some(b) = r.read_next().unwrap() {
            bytes.push(b);
        }
        assert_eq!(bytes, b"hey");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let path = std::env::temp_dir().join("beepwave-transfer-test").join("missing.bin");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(TransferReader::open(&path), Err(crate::ModemError::Io(_))));
    }

    #[test]
    fn test_empty_reader_progress() {
        let mut r = reader(&[]);
        assert_eq!(r.progress(), 0.0);
        assert_eq!(r.read_next().unwrap(), None);
        assert_eq!(r.progress(), 1.0);
    }

    #[test]
    fn test_sink_commit_and_finalize() {
        let mut sink = TransferSink::new();
        assert!(!sink.commit(1), "commit before sizing must be ignored");

        sink.set_metadata(FileMetadata::new("abc.txt", "text/plain", 3));
        assert_eq!(sink.progress(), 0.0);
        assert!(sink.finalize().is_none());

        for b in b"ABC" {
            assert!(sink.commit(*b));
        }
        assert!(!sink.commit(b'D'), "commit past size must be ignored");
        assert_eq!(sink.position(), 3);
        assert!(sink.is_full());
        assert!(sink.progress() < 1.0, "full but not finalized");
        assert!(sink.progress() > 0.99);

        let file = sink.finalize().unwrap();
        assert_eq!(file.bytes, b"ABC");
        assert_eq!(file.name, "abc.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert!(sink.finalize().is_none(), "finalize must only happen once");
        assert_eq!(sink.progress(), 1.0);
    }

    #[test]
    fn test_empty_sink_finalizes() {
        let mut sink = TransferSink::new();
        sink.set_metadata(FileMetadata::new("empty", "", 0));
        assert_eq!(sink.progress(), 0.0);
        assert!(sink.is_full());
        assert!(sink.finalize().unwrap().bytes.is_empty());
        assert_eq!(sink.progress(), 1.0);
    }

    #[test]
    fn test_safe_file_name() {
        let file = |name: &str| ReceivedFile {
            name: name.to_string(),
            mime_type: String::new(),
            bytes: Vec::new(),
        };
        assert_eq!(file("../../etc/passwd").safe_file_name(), "passwd");
        assert_eq!(file("C:\\temp\\a.txt").safe_file_name(), "a.txt");
        assert_eq!(file("..").safe_file_name(), "received.bin");
        assert_eq!(file("").safe_file_name(), "received.bin");
        assert_eq!(file("notes.md").safe_file_name(), "notes.md");
    }
}

// ============================================================
// Layer 4 — Record Store
// ============================================================
// A flat binary file of independently decodable records, so a
// whole training set can be read into memory in one pass.
//
// Layout:
//   "GLYR" magic | u16 LE version
//   repeated:  u32 LE payload length | bincode(RecordPayload)
//
// Reading is forgiving per record: a payload that does not
// decode is reported and skipped, a record cut short at the end
// of the file is reported and ends the stream. A bad header is
// fatal because nothing after it can be trusted.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{GanError, GanResult};

const MAGIC: &[u8; 4] = b"GLYR";
const VERSION: u16 = 1;

/// Largest payload we are willing to allocate for. Anything
/// bigger is a corrupt length prefix, not a glyph image.
const MAX_PAYLOAD_BYTES: u32 = 64 * 1024 * 1024;

/// One stored example. `image` holds encoded image bytes (PNG)
/// of the paired raster: target on the left, source on the right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordPayload {
    Labeled     { label: u32, image: Vec<u8> },
    FixedSample { label: u32, unicode: String, image: Vec<u8> },
}

impl RecordPayload {
    pub fn label(&self) -> u32 {
        match self {
            Self::Labeled { label, .. } | Self::FixedSample { label, .. } => *label,
        }
    }

    pub fn image(&self) -> &[u8] {
        match self {
            Self::Labeled { image, .. } | Self::FixedSample { image, .. } => image,
        }
    }

    pub fn unicode(&self) -> Option<&str> {
        match self {
            Self::FixedSample { unicode, .. } => Some(unicode),
            Self::Labeled { .. } => None,
        }
    }
}

// ─── Writer ───────────────────────────────────────────────────────────────────
pub struct RecordWriter {
    out:     BufWriter<File>,
    path:    PathBuf,
    written: usize,
}

impl RecordWriter {
    pub fn create(path: impl AsRef<Path>) -> GanResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(MAGIC)?;
        out.write_all(&VERSION.to_le_bytes())?;
        Ok(Self { out, path, written: 0 })
    }

    pub fn append(&mut self, record: &RecordPayload) -> GanResult<()> {
        let payload = bincode::serialize(record)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| GanError::data("record payload larger than 4 GiB"))?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(&payload)?;
        self.written += 1;
        Ok(())
    }

    /// Flush and close. Returns how many records were written.
    pub fn finish(mut self) -> GanResult<usize> {
        self.out.flush()?;
        tracing::debug!("Wrote {} records to '{}'", self.written, self.path.display());
        Ok(self.written)
    }
}

// ─── Reader ───────────────────────────────────────────────────────────────────
/// Iterates records in file order. Items are `Err` for records
/// that had to be skipped; the iterator keeps going after a
/// recoverable error and stops after a truncated tail or I/O error.
pub struct RecordReader<R: Read = BufReader<File>> {
    input:    R,
    index:    usize,
    finished: bool,
}

impl RecordReader {
    pub fn open(path: impl AsRef<Path>) -> GanResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            GanError::data(format!("cannot open record store '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn from_reader(mut input: R) -> GanResult<Self> {
        let mut header = [0u8; 6];
        input
            .read_exact(&mut header)
            .map_err(|_| GanError::data("record store is missing its header"))?;
        if &header[..4] != MAGIC {
            return Err(GanError::data("not a glyph record store (bad magic)"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(GanError::data(format!(
                "unsupported record store version {version}"
            )));
        }
        Ok(Self { input, index: 0, finished: false })
    }

    /// Fill `buf` completely. Ok(false) means a clean end of file
    /// before the first byte.
    fn read_full(&mut self, buf: &mut [u8]) -> std::io::Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = GanResult<RecordPayload>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let index = self.index;
        self.index += 1;

        let mut len_bytes = [0u8; 4];
        match self.read_full(&mut len_bytes) {
            Ok(true) => {}
            Ok(false) => {
                self.finished = true;
                return None;
            }
            Err(e) => {
                self.finished = true;
                return Some(Err(truncated(index, e)));
            }
        }

        let len = u32::from_le_bytes(len_bytes);
        if len > MAX_PAYLOAD_BYTES {
            // The framing itself is broken; nothing after this is readable.
            self.finished = true;
            return Some(Err(GanError::data(format!(
                "record {index}: implausible payload length {len}"
            ))));
        }

        let mut payload = vec![0u8; len as usize];
        if let Err(e) = self.read_full(&mut payload).and_then(|complete| {
            if complete || len == 0 { Ok(()) } else { Err(ErrorKind::UnexpectedEof.into()) }
        }) {
            self.finished = true;
            return Some(Err(truncated(index, e)));
        }

        Some(bincode::deserialize(&payload).map_err(|e| {
            GanError::data(format!("record {index}: malformed payload ({e})"))
        }))
    }
}

fn truncated(index: usize, e: std::io::Error) -> GanError {
    if e.kind() == ErrorKind::UnexpectedEof {
        GanError::data(format!("record {index}: truncated at end of store"))
    } else {
        GanError::Io(e)
    }
}

//! KISS byte stuffing and a streaming frame accumulator.
//!
//! A KISS frame is `FEND, command, escaped data, FEND`. The command byte
//! carries the TNC port in its high nibble and the command in its low nibble.

use crate::error::FramingError;

pub const FEND: u8 = 0xC0;
pub const FESC: u8 = 0xDB;
pub const TFEND: u8 = 0xDC;
pub const TFESC: u8 = 0xDD;

/// Low-nibble command for a data frame.
pub const CMD_DATA: u8 = 0x00;

/// Escape FEND and FESC inside frame data.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    for &b in data {
        match b {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            _ => out.push(b),
        }
    }
    out
}

/// Reverse [`escape`].
pub fn unescape(data: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut out = Vec::with_capacity(data.len());
    let mut bytes = data.iter().copied();
    while let Some(b) = bytes.next() {
        if b != FESC {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(TFEND) => out.push(FEND),
            Some(TFESC) => out.push(FESC),
            Some(other) => return Err(FramingError::InvalidEscape(other)),
            None => return Err(FramingError::IncompleteEscape),
        }
    }
    Ok(out)
}

/// Wrap `data` as a KISS data frame for `port`.
pub fn encode_data_frame(port: u8, data: &[u8]) -> Vec<u8> {
    let escaped = escape(data);
    let mut framed = Vec::with_capacity(escaped.len() + 3);
    framed.push(FEND);
    framed.push((port & 0x0F) << 4 | CMD_DATA);
    framed.extend_from_slice(&escaped);
    framed.push(FEND);
    framed
}

/// A data frame pulled off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KissFrame {
    pub port: u8,
    pub data: Vec<u8>,
}

/// Buffers stream bytes and yields complete KISS data frames.
///
/// Empty frames (back-to-back FENDs) and non-data commands are skipped.
/// Frames with broken escapes are dropped.
pub struct KissFrameAccumulator {
    buffer: Vec<u8>,
}

impl KissFrameAccumulator {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<KissFrame> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();

        while let Some(start) = self.buffer.iter().position(|&b| b == FEND) {
            let Some(len) = self.buffer[start + 1..].iter().position(|&b| b == FEND) else {
                // Nothing before the opening FEND can belong to a frame.
                self.buffer.drain(..start);
                break;
            };
            let end = start + 1 + len;
            if let Some(frame) = Self::decode(&self.buffer[start + 1..end]) {
                frames.push(frame);
            }
            // The closing FEND may open the next frame.
            self.buffer.drain(..end);
        }

        frames
    }

    fn decode(inner: &[u8]) -> Option<KissFrame> {
        let (&command, body) = inner.split_first()?;
        if command & 0x0F != CMD_DATA {
            return None;
        }
        match unescape(body) {
            Ok(data) if !data.is_empty() => Some(KissFrame {
                port: command >> 4,
                data,
            }),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("kiss: dropping frame: {e}");
                None
            }
        }
    }
}

impl Default for KissFrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

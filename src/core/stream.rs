//! Byte sources for the lexer and parser.
//!
//! All document access goes through the `BaseStream` trait so parsing code
//! never touches raw buffers directly. Two implementations exist: `Stream`
//! over a whole in-memory buffer, and `SubStream` exposing a window of a
//! shared buffer (used for parsing an object at a known byte offset without
//! copying).

use std::sync::Arc;

use crate::core::error::{PdfError, PdfResult};

/// A positioned cursor over PDF bytes.
pub trait BaseStream {
    /// Total length of this stream in bytes.
    fn length(&self) -> usize;

    /// Current read position.
    fn pos(&self) -> usize;

    /// Repositions the cursor. Positions past the end are allowed and read
    /// as EOF.
    fn set_pos(&mut self, pos: usize);

    /// Reads one byte and advances, or fails at end of data.
    fn get_byte(&mut self) -> PdfResult<u8>;

    /// Peeks the next byte without advancing.
    fn peek_byte(&mut self) -> PdfResult<u8>;

    /// Copies `count` bytes starting at the cursor, advancing past them.
    /// Returns fewer bytes when the stream ends early.
    fn get_bytes(&mut self, count: usize) -> Vec<u8>;

    /// Creates an independent window `[start, start + length)` over the same
    /// underlying bytes.
    fn make_sub_stream(&self, start: usize, length: usize) -> PdfResult<Box<dyn BaseStream>>;
}

/// An in-memory byte stream over the whole document buffer.
pub struct Stream {
    bytes: Arc<[u8]>,
    pos: usize,
}

impl Stream {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Stream {
            bytes: bytes.into(),
            pos: 0,
        }
    }

    pub fn from_shared(bytes: Arc<[u8]>) -> Self {
        Stream { bytes, pos: 0 }
    }

    /// The full underlying buffer, independent of cursor position.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

impl BaseStream for Stream {
    fn length(&self) -> usize {
        self.bytes.len()
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn get_byte(&mut self) -> PdfResult<u8> {
        match self.bytes.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(PdfError::syntax("unexpected end of stream")),
        }
    }

    fn peek_byte(&mut self) -> PdfResult<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| PdfError::syntax("unexpected end of stream"))
    }

    fn get_bytes(&mut self, count: usize) -> Vec<u8> {
        let end = (self.pos + count).min(self.bytes.len());
        let out = self.bytes[self.pos..end].to_vec();
        self.pos = end;
        out
    }

    fn make_sub_stream(&self, start: usize, length: usize) -> PdfResult<Box<dyn BaseStream>> {
        let end = start
            .checked_add(length)
            .ok_or_else(|| PdfError::syntax("sub-stream range overflow"))?;
        if start > self.bytes.len() || end > self.bytes.len() {
            return Err(PdfError::syntax(format!(
                "sub-stream range {}..{} exceeds length {}",
                start,
                end,
                self.bytes.len()
            )));
        }
        Ok(Box::new(SubStream {
            bytes: Arc::clone(&self.bytes),
            start,
            length,
            pos: 0,
        }))
    }
}

/// A window into a shared buffer.
pub struct SubStream {
    bytes: Arc<[u8]>,
    start: usize,
    length: usize,
    pos: usize,
}

impl BaseStream for SubStream {
    fn length(&self) -> usize {
        self.length
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn get_byte(&mut self) -> PdfResult<u8> {
        if self.pos >= self.length {
            return Err(PdfError::syntax("unexpected end of stream"));
        }
        let b = self.bytes[self.start + self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn peek_byte(&mut self) -> PdfResult<u8> {
        if self.pos >= self.length {
            return Err(PdfError::syntax("unexpected end of stream"));
        }
        Ok(self.bytes[self.start + self.pos])
    }

    fn get_bytes(&mut self, count: usize) -> Vec<u8> {
        let end = (self.pos + count).min(self.length);
        let out = self.bytes[self.start + self.pos..self.start + end].to_vec();
        self.pos = end;
        out
    }

    fn make_sub_stream(&self, start: usize, length: usize) -> PdfResult<Box<dyn BaseStream>> {
        let abs_start = self
            .start
            .checked_add(start)
            .ok_or_else(|| PdfError::syntax("sub-stream range overflow"))?;
        let end = start
            .checked_add(length)
            .ok_or_else(|| PdfError::syntax("sub-stream range overflow"))?;
        if end > self.length {
            return Err(PdfError::syntax(format!(
                "sub-stream range {start}..{end} exceeds window length {}",
                self.length
            )));
        }
        Ok(Box::new(SubStream {
            bytes: Arc::clone(&self.bytes),
            start: abs_start,
            length,
            pos: 0,
        }))
    }
}

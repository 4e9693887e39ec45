//! Streaming reader: detect once, then decode a source chunk by chunk.

use std::mem;

use log::{debug, info, warn};

use crate::chunked::{finish, lenient_cut, safe_cut};
use crate::detect::sniff;
use crate::error::{DecodeError, Result};
use crate::label::EncodingLabel;
use crate::options::DecodeOptions;
use crate::source::ByteSource;

/// Iterator over the decoded text of a [`ByteSource`].
///
/// Each item is the text of one or more complete characters. Memory use is
/// one chunk plus a carried remainder shorter than the window. Malformed
/// input is replaced with U+FFFD rather than ending the stream.
pub struct TextStream<S> {
    source: S,
    encoding: EncodingLabel,
    chunk_size: usize,
    window: usize,
    /// Bytes read but not yet decoded.
    pending: Vec<u8>,
    /// Sample bytes that could not be pushed back into the source.
    replay: Vec<u8>,
    at_start: bool,
    eof: bool,
    done: bool,
}

impl<S: ByteSource> TextStream<S> {
    /// Detect the encoding of `source`, then stream it.
    pub fn new(mut source: S, options: &DecodeOptions) -> Result<Self> {
        options.validate()?;
        let sniff = sniff(
            &mut source,
            options.sample_size,
            &options.candidates,
            options.window(),
        );
        info!("Detected encoding {}", sniff.label);

        let mut stream = Self::build(source, sniff.label, options)?;
        if !sniff.restored {
            debug!("Replaying {} sampled bytes", sniff.sample.len());
            stream.replay = sniff.sample;
        }
        Ok(stream)
    }

    /// Stream `source` as `encoding`, skipping detection.
    pub fn with_encoding(source: S, encoding: EncodingLabel, options: &DecodeOptions) -> Result<Self> {
        options.validate()?;
        Self::build(source, encoding, options)
    }

    fn build(source: S, encoding: EncodingLabel, options: &DecodeOptions) -> Result<Self> {
        let window = options.window();
        if window < encoding.max_unit_len() {
            return Err(DecodeError::InvalidOptions(format!(
                "window of {} bytes cannot hold a {}-byte {} character",
                window,
                encoding.max_unit_len(),
                encoding
            )));
        }
        Ok(Self {
            source,
            encoding,
            chunk_size: options.chunk_size,
            window,
            pending: Vec::new(),
            replay: Vec::new(),
            at_start: true,
            eof: false,
            done: false,
        })
    }

    pub fn encoding(&self) -> EncodingLabel {
        self.encoding
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn next_text(&mut self) -> Result<Option<String>> {
        loop {
            if self.eof {
                return Ok(self.drain());
            }

            let chunk = if self.replay.is_empty() {
                self.source.read_bytes(self.chunk_size)?
            } else {
                mem::take(&mut self.replay)
            };
            if chunk.is_empty() {
                self.eof = true;
                continue;
            }

            self.pending.extend_from_slice(&chunk);
            if let Some(text) = self.decode_pending().and_then(|t| self.emit(t)) {
                return Ok(Some(text));
            }
        }
    }

    /// Decode the complete characters of `pending`, keeping a truncated
    /// trailing character for the next read. Malformed sequences become
    /// U+FFFD.
    fn decode_pending(&mut self) -> Option<String> {
        let (cut, text) = match safe_cut(&self.pending, self.encoding, self.window) {
            Some(found) => found,
            None => {
                let found = lenient_cut(&self.pending, self.encoding, self.window)?;
                warn!(
                    "Malformed {} input in a {}-byte chunk replaced with U+FFFD",
                    self.encoding,
                    self.pending.len()
                );
                found
            }
        };
        self.pending.drain(..cut);
        Some(text)
    }

    /// Decode what is left once the source is exhausted.
    fn drain(&mut self) -> Option<String> {
        let text = finish(&mem::take(&mut self.pending), self.encoding)?;
        self.emit(text)
    }

    /// Strip a leading BOM from the first text of a UTF stream.
    fn emit(&mut self, mut text: String) -> Option<String> {
        if self.at_start && !text.is_empty() {
            self.at_start = false;
            if self.encoding.is_unicode() && text.starts_with('\u{FEFF}') {
                text.drain(..'\u{FEFF}'.len_utf8());
            }
        }
        (!text.is_empty()).then_some(text)
    }
}

impl<S: ByteSource> Iterator for TextStream<S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_text() {
            Ok(Some(text)) => Some(Ok(text)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Detect and decode an entire source into one string.
pub fn read_to_string<S: ByteSource>(source: S, options: &DecodeOptions) -> Result<String> {
    TextStream::new(source, options)?.collect()
}

//! Decoding options shared by the detector, the chunked decoder and the
//! streaming reader.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};
use crate::label::CandidateList;

/// Bytes sampled from the head of a source during detection.
pub const DEFAULT_SAMPLE_SIZE: usize = 4096;

/// Bytes requested per read by the streaming reader.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// All options controlling detection and decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Encodings tried in order during detection and fallback decoding.
    pub candidates: CandidateList,
    pub sample_size: usize,
    /// Trailing scan window of the chunked decoder.
    /// Derived from the candidates when unset.
    pub window: Option<usize>,
    pub chunk_size: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            candidates: CandidateList::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            window: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl DecodeOptions {
    pub fn window(&self) -> usize {
        self.window.unwrap_or_else(|| self.candidates.window())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(DecodeError::InvalidOptions(
                "sample_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(DecodeError::InvalidOptions(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        let window = self.window();
        let min_window = self.candidates.max_unit_len();
        if window < min_window {
            return Err(DecodeError::InvalidOptions(format!(
                "window of {} bytes cannot hold a {}-byte character",
                window, min_window
            )));
        }
        Ok(())
    }
}

//! Encoding detection by BOM sniffing and trial decoding of a sample.
//!
//! Detection never fails: unreadable, unseekable or empty sources resolve
//! to the first candidate.

use log::debug;

use crate::chunked::safe_cut;
use crate::label::{default_candidates, CandidateList, EncodingLabel};
use crate::options::DecodeOptions;
use crate::source::ByteSource;

/// What a detection pass learned about a source.
#[derive(Debug)]
pub(crate) struct Sniff {
    pub label: EncodingLabel,
    /// Bytes consumed from the source while sampling.
    pub sample: Vec<u8>,
    /// Whether the source was moved back to where sampling started.
    pub restored: bool,
}

/// Detect the encoding of `source` from its next `sample_size` bytes using
/// the default candidates. The read position is restored when the source
/// supports it.
pub fn detect_encoding<S: ByteSource + ?Sized>(source: &mut S, sample_size: usize) -> EncodingLabel {
    let candidates = default_candidates();
    sniff(source, sample_size, candidates, candidates.window()).label
}

/// [`detect_encoding`] with the candidates, sample size and window taken
/// from `options`.
pub fn detect_encoding_with<S: ByteSource + ?Sized>(
    source: &mut S,
    options: &DecodeOptions,
) -> EncodingLabel {
    sniff(source, options.sample_size, &options.candidates, options.window()).label
}

/// Detect the encoding of an in-memory buffer from its first `sample_size`
/// bytes.
pub fn detect_bytes(bytes: &[u8], sample_size: usize, candidates: &CandidateList) -> EncodingLabel {
    let sample = &bytes[..bytes.len().min(sample_size)];
    classify(sample, sample_size, candidates, candidates.window())
}

pub(crate) fn sniff<S: ByteSource + ?Sized>(
    source: &mut S,
    sample_size: usize,
    candidates: &CandidateList,
    window: usize,
) -> Sniff {
    let origin = match source.tell() {
        Ok(position) => Some(position),
        Err(e) => {
            debug!("Source position unavailable ({}), sampling without restore", e);
            None
        }
    };

    let mut sample = Vec::new();
    let read = read_sample(source, sample_size, &mut sample);

    let restored = match origin {
        Some(position) => match source.seek_to(position) {
            Ok(()) => true,
            Err(e) => {
                debug!("Cannot restore source position {}: {}", position, e);
                false
            }
        },
        None => false,
    };

    let label = match read {
        Ok(()) => classify(&sample, sample_size, candidates, window),
        Err(e) => {
            debug!("Sampling failed ({}), assuming {}", e, candidates.primary());
            candidates.primary()
        }
    };

    Sniff {
        label,
        sample,
        restored,
    }
}

/// Fill `sample` up to `sample_size` bytes, stopping early at end of stream.
fn read_sample<S: ByteSource + ?Sized>(
    source: &mut S,
    sample_size: usize,
    sample: &mut Vec<u8>,
) -> std::io::Result<()> {
    while sample.len() < sample_size {
        let chunk = source.read_bytes(sample_size - sample.len())?;
        if chunk.is_empty() {
            break;
        }
        sample.extend_from_slice(&chunk);
    }
    Ok(())
}

fn classify(
    sample: &[u8],
    sample_size: usize,
    candidates: &CandidateList,
    window: usize,
) -> EncodingLabel {
    if sample.is_empty() {
        return candidates.primary();
    }

    if let Some((label, _)) = EncodingLabel::for_bom(sample) {
        debug!("Byte-order mark identifies {}", label);
        return label;
    }

    // A full sample may end inside a character; only a short sample is
    // known to end where the stream does.
    let truncated = sample.len() >= sample_size;
    candidates
        .iter()
        .find(|&candidate| match safe_cut(sample, candidate, window) {
            Some((cut, _)) => cut == sample.len() || truncated,
            None => false,
        })
        .unwrap_or_else(|| {
            debug!("No candidate decodes the sample, assuming {}", candidates.primary());
            candidates.primary()
        })
}

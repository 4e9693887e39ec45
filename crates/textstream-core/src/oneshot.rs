//! One-shot decoding of fully materialized buffers.

use std::iter;

use log::{debug, warn};

use crate::detect::detect_bytes;
use crate::label::{default_candidates, CandidateList, EncodingLabel};
use crate::options::DecodeOptions;

/// Decode a complete buffer.
///
/// Tries `encoding` strictly, then every entry of `fallback_encodings`
/// (the default candidates when `None`) in order. If nothing decodes
/// cleanly the buffer is decoded with `encoding` anyway, substituting
/// U+FFFD for malformed sequences.
pub fn decode_chunk(
    buffer: &[u8],
    encoding: EncodingLabel,
    fallback_encodings: Option<&CandidateList>,
) -> String {
    decode_with_fallbacks(buffer, encoding, fallback_encodings).0
}

/// [`decode_chunk`], also reporting which encoding produced the text.
fn decode_with_fallbacks(
    buffer: &[u8],
    encoding: EncodingLabel,
    fallback_encodings: Option<&CandidateList>,
) -> (String, EncodingLabel) {
    let fallbacks = fallback_encodings.unwrap_or_else(|| default_candidates());
    let attempts = iter::once(encoding).chain(fallbacks.iter().filter(|&e| e != encoding));

    for candidate in attempts {
        if let Some(text) = candidate.decode_strict(buffer) {
            if candidate != encoding {
                debug!("Decoded {} bytes as {} instead of {}", buffer.len(), candidate, encoding);
            }
            return (text, candidate);
        }
    }

    warn!(
        "{} bytes are not valid {} or any fallback encoding, decoding with replacement characters",
        buffer.len(),
        encoding
    );
    (encoding.decode_lossy(buffer).0, encoding)
}

/// Detect and decode a whole in-memory document.
///
/// Fallbacks are the configured candidates followed by windows-1252, which
/// accepts any byte sequence. A leading BOM is stripped. Returns the text
/// and the encoding that produced it.
pub fn decode_all(bytes: &[u8], options: &DecodeOptions) -> (String, EncodingLabel) {
    if let Some((label, bom_len)) = EncodingLabel::for_bom(bytes) {
        return decode_with_fallbacks(&bytes[bom_len..], label, Some(&CandidateList::from(label)));
    }

    let label = detect_bytes(bytes, options.sample_size, &options.candidates);
    let mut fallbacks = options.candidates.clone();
    fallbacks.push(EncodingLabel::windows_1252());
    decode_with_fallbacks(bytes, label, Some(&fallbacks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_encoding() {
        let text = decode_chunk("纯文本".as_bytes(), EncodingLabel::utf8(), None);
        assert_eq!(text, "纯文本");
    }

    #[test]
    fn test_falls_back_in_order() {
        let bytes = encoding_rs::GBK.encode("备用编码").0.into_owned();
        let text = decode_chunk(&bytes, EncodingLabel::utf8(), None);
        assert_eq!(text, "备用编码");

        let fallbacks = CandidateList::from_labels(["windows-1252", "gbk"]).unwrap();
        let text = decode_chunk(&bytes, EncodingLabel::utf8(), Some(&fallbacks));
        assert_eq!(text, encoding_rs::WINDOWS_1252.decode(&bytes).0);
    }

    #[test]
    fn test_invalid_everywhere_is_lossy() {
        let fallbacks = CandidateList::from_labels(["gbk"]).unwrap();
        let text = decode_chunk(b"\xff\xfe", EncodingLabel::utf8(), Some(&fallbacks));
        assert!(text.contains('\u{FFFD}'));
        assert_eq!(text, "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(decode_chunk(b"", EncodingLabel::gbk(), None), "");
    }

    #[test]
    fn test_decode_all() {
        let options = DecodeOptions::default();

        let bytes = encoding_rs::GBK.encode("全文解码").0.into_owned();
        let (text, label) = decode_all(&bytes, &options);
        assert_eq!(text, "全文解码");
        assert_eq!(label, EncodingLabel::gbk());

        let (text, label) = decode_all(b"\xef\xbb\xbfwith bom", &options);
        assert_eq!(text, "with bom");
        assert_eq!(label, EncodingLabel::utf8());

        // Neither UTF-8 nor GBK: windows-1252 takes it.
        let (text, label) = decode_all(b"caf\xe9 \xff", &options);
        assert_eq!(label, EncodingLabel::windows_1252());
        assert_eq!(text, "café ÿ");
    }

    #[test]
    fn test_decode_all_honors_sample_size() {
        let mut bytes = b"abcd".to_vec();
        bytes.extend_from_slice(&encoding_rs::GBK.encode("样本").0);
        let options = DecodeOptions {
            sample_size: 4,
            ..DecodeOptions::default()
        };
        // The sample is plain ASCII, so UTF-8 is tried first and GBK is
        // reached as a fallback.
        assert_eq!(
            detect_bytes(&bytes, options.sample_size, &options.candidates),
            EncodingLabel::utf8()
        );
        let (text, label) = decode_all(&bytes, &options);
        assert_eq!(text, "abcd样本");
        assert_eq!(label, EncodingLabel::gbk());
    }
}

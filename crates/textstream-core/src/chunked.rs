//! Boundary-safe decoding of accumulated chunks.
//!
//! A read of N bytes can end in the middle of a multi-byte character.
//! Instead of forcing a decode (and producing U+FFFD) the decoder finds the
//! longest prefix made of complete characters and hands the partial tail
//! back to the caller, who prepends it to the next chunk.

use std::slice;

use encoding_rs::{CoderResult, Decoder, DecoderResult};
use log::debug;

use crate::label::{default_candidates, EncodingLabel, WINDOW_SAFETY_FACTOR};

/// Result of [`decode_chunk_safe`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkDecode {
    /// Text of the complete characters, `None` when nothing was decodable.
    pub text: Option<String>,
    /// Bytes to prepend to the next chunk.
    pub remainder: Vec<u8>,
}

/// Trailing window used when the caller does not supply one.
pub fn default_window(encoding: EncodingLabel) -> usize {
    default_candidates().max_unit_len().max(encoding.max_unit_len()) * WINDOW_SAFETY_FACTOR
}

/// Decode as much of `buffer` as forms complete characters, using the
/// default trailing window for `encoding`.
pub fn decode_chunk_safe(buffer: &[u8], encoding: EncodingLabel) -> ChunkDecode {
    decode_chunk_safe_with_window(buffer, encoding, default_window(encoding))
}

/// Decode as much of `buffer` as forms complete characters.
///
/// Only the last `window - 1` cut positions are tried, so the remainder of a
/// deferred result is always shorter than `window`. The buffer is decoded in
/// a single pass. When it holds malformed input, or no character boundary
/// falls within the window, the whole buffer comes back untouched with
/// `text: None`.
pub fn decode_chunk_safe_with_window(
    buffer: &[u8],
    encoding: EncodingLabel,
    window: usize,
) -> ChunkDecode {
    if buffer.is_empty() {
        return ChunkDecode::default();
    }

    match safe_cut(buffer, encoding, window) {
        Some((cut, text)) => ChunkDecode {
            text: (cut > 0).then_some(text),
            remainder: buffer[cut..].to_vec(),
        },
        None => {
            debug!(
                "No safe {} cut point in the last {} bytes of a {}-byte buffer",
                encoding,
                window,
                buffer.len()
            );
            ChunkDecode {
                text: None,
                remainder: buffer.to_vec(),
            }
        }
    }
}

/// Force a decode of the bytes left over at end of stream. A truncated
/// trailing character becomes U+FFFD.
pub fn finish(remainder: &[u8], encoding: EncodingLabel) -> Option<String> {
    if remainder.is_empty() {
        return None;
    }
    let (text, had_errors) = encoding.decode_lossy(remainder);
    if had_errors {
        log::warn!(
            "Stream ended inside a {} character; {} trailing bytes replaced",
            encoding,
            remainder.len()
        );
    }
    Some(text)
}

/// Longest prefix within the window that decodes strictly, with its text.
/// A cut equal to `buffer.len()` means the buffer holds only complete
/// characters. `None` when the buffer contains malformed input or no
/// character boundary falls within the window.
pub(crate) fn safe_cut(
    buffer: &[u8],
    encoding: EncodingLabel,
    window: usize,
) -> Option<(usize, String)> {
    scan(buffer, encoding, window, false)
}

/// [`safe_cut`] with malformed sequences decoded as U+FFFD. Only a
/// truncated trailing character is left after the cut.
pub(crate) fn lenient_cut(
    buffer: &[u8],
    encoding: EncodingLabel,
    window: usize,
) -> Option<(usize, String)> {
    scan(buffer, encoding, window, true)
}

/// One pass over `buffer`. Bytes before the window are decoded in bulk and
/// the rest one at a time; a byte that produces output ends a character.
fn scan(
    buffer: &[u8],
    encoding: EncodingLabel,
    window: usize,
    lenient: bool,
) -> Option<(usize, String)> {
    let mut decoder = encoding.encoding().new_decoder_without_bom_handling();
    let mut text = String::new();

    let lowest = buffer.len().saturating_sub(window.saturating_sub(1));
    let bulk = lowest.saturating_sub(1);
    feed(&mut decoder, &buffer[..bulk], &mut text, lenient)?;

    let mut cut = (lowest == 0).then_some((0, 0));
    for (offset, byte) in buffer.iter().enumerate().skip(bulk) {
        let before = text.len();
        feed(&mut decoder, slice::from_ref(byte), &mut text, lenient)?;
        if text.len() > before {
            cut = Some((offset + 1, text.len()));
        }
    }

    let (cut, text_len) = cut?;
    text.truncate(text_len);
    Some((cut, text))
}

/// Push `bytes` through `decoder`, holding back a trailing partial
/// character. Strict mode stops with `None` at the first malformed sequence.
fn feed(decoder: &mut Decoder, mut bytes: &[u8], out: &mut String, lenient: bool) -> Option<()> {
    loop {
        let room = if lenient {
            decoder.max_utf8_buffer_length(bytes.len())
        } else {
            decoder.max_utf8_buffer_length_without_replacement(bytes.len())
        };
        out.reserve(room.unwrap_or(bytes.len()));

        let (output_full, read) = if lenient {
            let (result, read, _) = decoder.decode_to_string(bytes, out, false);
            (matches!(result, CoderResult::OutputFull), read)
        } else {
            match decoder.decode_to_string_without_replacement(bytes, out, false) {
                (DecoderResult::Malformed(..), _) => return None,
                (result, read) => (matches!(result, DecoderResult::OutputFull), read),
            }
        };
        if !output_full {
            return Some(());
        }
        bytes = &bytes[read..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gbk(text: &str) -> Vec<u8> {
        let (bytes, _, had_errors) = encoding_rs::GBK.encode(text);
        assert!(!had_errors);
        bytes.into_owned()
    }

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    /// Feed `bytes` in `size`-byte chunks the way a read loop would.
    fn stream(bytes: &[u8], size: usize, encoding: EncodingLabel) -> String {
        let mut out = String::new();
        let mut buffer = Vec::new();
        for chunk in bytes.chunks(size) {
            buffer.extend_from_slice(chunk);
            let decoded = decode_chunk_safe(&buffer, encoding);
            if let Some(text) = decoded.text {
                out.push_str(&text);
            }
            buffer = decoded.remainder;
        }
        if let Some(text) = finish(&buffer, encoding) {
            out.push_str(&text);
        }
        out
    }

    #[test]
    fn test_empty_buffer() {
        let decoded = decode_chunk_safe(b"", EncodingLabel::utf8());
        assert_eq!(decoded.text, None);
        assert!(decoded.remainder.is_empty());
    }

    #[test]
    fn test_complete_characters_leave_no_remainder() {
        let decoded = decode_chunk_safe("héllo 世界".as_bytes(), EncodingLabel::utf8());
        assert_eq!(decoded.text.as_deref(), Some("héllo 世界"));
        assert!(decoded.remainder.is_empty());

        let decoded = decode_chunk_safe(&gbk("中文test"), EncodingLabel::gbk());
        assert_eq!(decoded.text.as_deref(), Some("中文test"));
        assert!(decoded.remainder.is_empty());
    }

    #[test]
    fn test_truncated_utf8_character_is_deferred() {
        let bytes = "ab世界".as_bytes();
        for cut in 1..3 {
            let buffer = &bytes[..bytes.len() - cut];
            let decoded = decode_chunk_safe(buffer, EncodingLabel::utf8());
            assert_eq!(decoded.text.as_deref(), Some("ab世"));
            assert_eq!(decoded.remainder, &bytes[5..bytes.len() - cut]);
        }
    }

    #[test]
    fn test_truncated_gbk_character_is_deferred() {
        let bytes = gbk("测试中");
        let decoded = decode_chunk_safe(&bytes[..5], EncodingLabel::gbk());
        assert_eq!(decoded.text.as_deref(), Some("测试"));
        assert_eq!(decoded.remainder, vec![bytes[4]]);
    }

    #[test]
    fn test_gbk_split_inside_first_character() {
        let bytes = gbk("中文test");
        let encoding = EncodingLabel::gbk();

        let first = decode_chunk_safe(&bytes[..1], encoding);
        assert_eq!(first.text, None);
        assert_eq!(first.remainder, vec![0xD6]);

        let mut buffer = first.remainder;
        buffer.extend_from_slice(&bytes[1..]);
        let second = decode_chunk_safe(&buffer, encoding);
        assert_eq!(second.text.as_deref(), Some("中文test"));
        assert!(second.remainder.is_empty());
    }

    #[test]
    fn test_gb18030_four_byte_sequence_is_deferred() {
        // U+20000 only exists as a four-byte GB18030 sequence.
        let (bytes, _, _) = encoding_rs::GB18030.encode("a\u{20000}");
        assert_eq!(bytes.len(), 5);
        let encoding = EncodingLabel::for_label("gb18030").unwrap();
        for end in 2..5 {
            let decoded = decode_chunk_safe(&bytes[..end], encoding);
            assert_eq!(decoded.text.as_deref(), Some("a"));
            assert_eq!(decoded.remainder, &bytes[1..end]);
        }
    }

    #[test]
    fn test_utf16_surrogate_pair_is_deferred() {
        let bytes = utf16le("x😀");
        let encoding = EncodingLabel::utf16le();
        for end in 3..6 {
            let decoded = decode_chunk_safe(&bytes[..end], encoding);
            assert_eq!(decoded.text.as_deref(), Some("x"));
            assert_eq!(decoded.remainder, &bytes[2..end]);
        }
    }

    #[test]
    fn test_corrupt_tail_is_exhausted() {
        let buffer = b"valid text \xff\xfe";
        let decoded = decode_chunk_safe(buffer, EncodingLabel::utf8());
        assert_eq!(decoded.text, None);
        assert_eq!(decoded.remainder, buffer);
    }

    #[test]
    fn test_corrupt_data_before_window_is_exhausted() {
        let mut buffer = b"\xff".to_vec();
        buffer.extend_from_slice(&[b'a'; 64]);
        buffer.extend_from_slice(&"世".as_bytes()[..2]);
        let decoded = decode_chunk_safe(&buffer, EncodingLabel::utf8());
        assert_eq!(decoded.text, None);
        assert_eq!(decoded.remainder, buffer);
    }

    #[test]
    fn test_lenient_cut_replaces_malformed_bytes() {
        let mut buffer = b"ok \xff".to_vec();
        buffer.extend_from_slice(&"世".as_bytes()[..2]);
        let utf8 = EncodingLabel::utf8();
        assert_eq!(safe_cut(&buffer, utf8, 20), None);
        assert_eq!(lenient_cut(&buffer, utf8, 20), Some((4, "ok \u{FFFD}".to_string())));

        // Valid GBK: every trail byte is also a lead byte, so boundaries
        // come from the decoder state rather than the bytes alone.
        let bytes = gbk("中文");
        assert_eq!(lenient_cut(&bytes, EncodingLabel::gbk(), 20), Some((4, "中文".to_string())));
    }

    #[test]
    fn test_large_buffer_with_split_tail() {
        let bytes = "汉".repeat(400_000).into_bytes();
        let buffer = &bytes[..bytes.len() - 1];
        let decoded = decode_chunk_safe(buffer, EncodingLabel::utf8());
        assert_eq!(decoded.text.map(|t| t.chars().count()), Some(399_999));
        assert_eq!(decoded.remainder, &"汉".as_bytes()[..2]);

        let mut corrupt = buffer.to_vec();
        corrupt[10] = 0xFF;
        let decoded = decode_chunk_safe(&corrupt, EncodingLabel::utf8());
        assert_eq!(decoded.text, None);
        assert_eq!(decoded.remainder.len(), corrupt.len());
    }

    #[test]
    fn test_window_bounds_remainder() {
        let bytes = "世".as_bytes();
        // A window of 2 only tries the cut one byte from the end, which
        // splits the character, so nothing is decodable.
        let decoded = decode_chunk_safe_with_window(&bytes[..2], EncodingLabel::utf8(), 2);
        assert_eq!(decoded.text, None);
        assert_eq!(decoded.remainder, &bytes[..2]);

        let decoded = decode_chunk_safe_with_window(&bytes[..2], EncodingLabel::utf8(), 3);
        assert_eq!(decoded.text, None);
        assert_eq!(decoded.remainder, &bytes[..2]);
    }

    #[test]
    fn test_every_split_reconstructs_text() {
        let text = "混合 mixed 文本, ünïcödé 😀 and ascii.";
        let cases = [
            (EncodingLabel::utf8(), text.as_bytes().to_vec()),
            (EncodingLabel::utf16le(), utf16le(text)),
        ];
        for (encoding, bytes) in cases {
            for split in 0..=bytes.len() {
                let mut buffer = bytes[..split].to_vec();
                let first = decode_chunk_safe(&buffer, encoding);
                let mut out = first.text.unwrap_or_default();
                buffer = first.remainder;
                assert!(buffer.len() < 20);
                buffer.extend_from_slice(&bytes[split..]);
                let second = decode_chunk_safe(&buffer, encoding);
                out.push_str(&second.text.unwrap_or_default());
                assert!(second.remainder.is_empty());
                assert_eq!(out, text, "{} split at {}", encoding, split);
            }
        }
    }

    #[test]
    fn test_small_chunks_reconstruct_gbk_text() {
        let text = "第一章 开始\n天地玄黄，宇宙洪荒。Chapter 1.";
        let bytes = gbk(text);
        for size in 1..=7 {
            assert_eq!(stream(&bytes, size, EncodingLabel::gbk()), text);
        }
    }

    #[test]
    fn test_finish_forces_truncated_tail() {
        assert_eq!(finish(b"", EncodingLabel::utf8()), None);
        assert_eq!(
            finish(&"世".as_bytes()[..2], EncodingLabel::utf8()).as_deref(),
            Some("\u{FFFD}")
        );
    }
}

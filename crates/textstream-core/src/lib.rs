//! Encoding detection and boundary-safe incremental decoding of byte streams.
//!
//! ```
//! use std::io::Cursor;
//! use textstream_core::{decode_chunk_safe, detect_encoding, EncodingLabel};
//!
//! let bytes = encoding_rs::GBK.encode("中文test").0.into_owned();
//! let mut source = Cursor::new(bytes.clone());
//! let encoding = detect_encoding(&mut source, 4096);
//! assert_eq!(encoding, EncodingLabel::gbk());
//!
//! // A read that stops inside the first character decodes nothing yet.
//! let first = decode_chunk_safe(&bytes[..1], encoding);
//! assert_eq!(first.text, None);
//!
//! let mut buffer = first.remainder;
//! buffer.extend_from_slice(&bytes[1..]);
//! let second = decode_chunk_safe(&buffer, encoding);
//! assert_eq!(second.text.as_deref(), Some("中文test"));
//! ```

pub mod chunked;
pub mod detect;
pub mod error;
pub mod label;
pub mod oneshot;
pub mod options;
pub mod reader;
pub mod source;

pub use chunked::{decode_chunk_safe, decode_chunk_safe_with_window, finish, ChunkDecode};
pub use detect::{detect_bytes, detect_encoding, detect_encoding_with};
pub use error::{DecodeError, Result};
pub use label::{default_candidates, CandidateList, EncodingLabel};
pub use oneshot::{decode_all, decode_chunk};
pub use options::DecodeOptions;
pub use reader::{read_to_string, TextStream};
pub use source::{ByteSource, Unseekable};

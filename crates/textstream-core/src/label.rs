//! Encoding labels and the ordered candidate list used for detection.

use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DecodeError, Result};

/// Multiplier applied to the longest character unit among the candidates
/// to obtain the trailing scan window of the chunked decoder.
pub const WINDOW_SAFETY_FACTOR: usize = 5;

static DEFAULT_CANDIDATES: Lazy<CandidateList> = Lazy::new(CandidateList::default);

/// The process-wide default candidate list: UTF-8, then GBK.
pub fn default_candidates() -> &'static CandidateList {
    &DEFAULT_CANDIDATES
}

/// A resolved encoding. Only constructible from a recognized WHATWG label,
/// a BOM, or one of the named constructors, so it is never free text.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncodingLabel(&'static Encoding);

impl EncodingLabel {
    pub fn utf8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    pub fn gbk() -> Self {
        Self(encoding_rs::GBK)
    }

    pub fn utf16le() -> Self {
        Self(encoding_rs::UTF_16LE)
    }

    pub fn utf16be() -> Self {
        Self(encoding_rs::UTF_16BE)
    }

    pub fn windows_1252() -> Self {
        Self(encoding_rs::WINDOWS_1252)
    }

    /// Resolve a label such as `"utf-8"`, `"gbk"` or `"latin1"`.
    /// The replacement encoding is rejected along with unknown labels.
    pub fn for_label(label: &str) -> Result<Self> {
        Encoding::for_label_no_replacement(label.as_bytes())
            .map(Self)
            .ok_or_else(|| DecodeError::UnknownEncoding(label.to_string()))
    }

    /// Identify a UTF encoding from a leading byte-order mark.
    /// Returns the label and the length of the mark.
    pub fn for_bom(bytes: &[u8]) -> Option<(Self, usize)> {
        Encoding::for_bom(bytes).map(|(encoding, len)| (Self(encoding), len))
    }

    /// Canonical name, e.g. `UTF-8` or `GBK`.
    pub fn name(self) -> &'static str {
        self.0.name()
    }

    pub fn encoding(self) -> &'static Encoding {
        self.0
    }

    /// Whether this is one of the encodings a BOM can announce.
    pub fn is_unicode(self) -> bool {
        self.0 == encoding_rs::UTF_8
            || self.0 == encoding_rs::UTF_16LE
            || self.0 == encoding_rs::UTF_16BE
    }

    /// Longest byte sequence a single character can occupy.
    pub fn max_unit_len(self) -> usize {
        let encoding = self.0;
        if encoding.is_single_byte() {
            1
        } else if encoding == encoding_rs::BIG5
            || encoding == encoding_rs::SHIFT_JIS
            || encoding == encoding_rs::EUC_KR
        {
            2
        } else if encoding == encoding_rs::EUC_JP {
            3
        } else if encoding == encoding_rs::ISO_2022_JP {
            // Escape sequence plus a double-byte character.
            8
        } else {
            // UTF-8, GB18030/GBK four-byte forms, UTF-16 surrogate pairs.
            4
        }
    }

    /// Decode without replacement characters and without BOM sniffing.
    /// `None` means the bytes are not valid in this encoding.
    pub fn decode_strict(self, bytes: &[u8]) -> Option<String> {
        self.0
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned())
    }

    /// Decode substituting U+FFFD for malformed sequences.
    /// The flag reports whether any substitution happened.
    pub fn decode_lossy(self, bytes: &[u8]) -> (String, bool) {
        let (text, had_errors) = self.0.decode_without_bom_handling(bytes);
        (text.into_owned(), had_errors)
    }
}

impl fmt::Display for EncodingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for EncodingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodingLabel({})", self.name())
    }
}

impl FromStr for EncodingLabel {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::for_label(s)
    }
}

impl Serialize for EncodingLabel {
    fn serialize<S>(&self, s: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for EncodingLabel {
    fn deserialize<D>(d: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(d)?;
        Self::for_label(&label).map_err(serde::de::Error::custom)
    }
}

/// Ordered, non-empty list of encodings. Order is preference: the first
/// entry wins ties and is the fallback when nothing fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EncodingLabel>", into = "Vec<EncodingLabel>")]
pub struct CandidateList(Vec<EncodingLabel>);

impl CandidateList {
    pub fn new(labels: Vec<EncodingLabel>) -> Result<Self> {
        if labels.is_empty() {
            return Err(DecodeError::InvalidOptions(
                "candidate list must not be empty".to_string(),
            ));
        }
        let mut list = Self(Vec::with_capacity(labels.len()));
        for label in labels {
            list.push(label);
        }
        Ok(list)
    }

    /// Build from label strings, e.g. `["utf-8", "gbk"]`.
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = labels
            .into_iter()
            .map(|l| EncodingLabel::for_label(l.as_ref().trim()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(labels)
    }

    /// Append a candidate with the lowest preference. Duplicates are ignored.
    pub fn push(&mut self, label: EncodingLabel) {
        if !self.0.contains(&label) {
            self.0.push(label);
        }
    }

    /// The highest-preference candidate, used as the default label.
    pub fn primary(&self) -> EncodingLabel {
        self.0[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = EncodingLabel> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: EncodingLabel) -> bool {
        self.0.contains(&label)
    }

    pub fn max_unit_len(&self) -> usize {
        self.iter().map(EncodingLabel::max_unit_len).max().unwrap_or(1)
    }

    /// Trailing scan window derived from the widest candidate.
    pub fn window(&self) -> usize {
        self.max_unit_len() * WINDOW_SAFETY_FACTOR
    }
}

impl Default for CandidateList {
    fn default() -> Self {
        Self(vec![EncodingLabel::utf8(), EncodingLabel::gbk()])
    }
}

impl From<EncodingLabel> for CandidateList {
    fn from(label: EncodingLabel) -> Self {
        Self(vec![label])
    }
}

impl TryFrom<Vec<EncodingLabel>> for CandidateList {
    type Error = DecodeError;

    fn try_from(labels: Vec<EncodingLabel>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<CandidateList> for Vec<EncodingLabel> {
    fn from(list: CandidateList) -> Self {
        list.0
    }
}

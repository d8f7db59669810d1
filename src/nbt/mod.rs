//! Named Binary Tag (NBT) decoding for auction item blobs
//!
//! Item bytes arrive as base64 text wrapping a gzip stream which holds a
//! big-endian NBT tree. `decode_item_bytes` peels all three layers and
//! returns a typed tree; `encode_item_bytes` is its inverse.

mod reader;
mod writer;

pub use reader::from_bytes;
pub use writer::to_bytes;

use base64::{engine::general_purpose, Engine as _};
use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use thiserror::Error;

/// Maximum nesting of compounds and lists accepted by the parser
pub const MAX_DEPTH: usize = 512;

/// Largest uncompressed tag stream accepted from one listing
pub const MAX_DECOMPRESSED: usize = 2 * 1024 * 1024;

/// Errors produced while turning item bytes into a tag tree
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid base64 item bytes: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid gzip stream: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("Tag stream truncated at offset {offset}: {needed} more bytes needed")]
    UnexpectedEof { needed: usize, offset: usize },

    #[error("Unknown tag id {id} at offset {offset}")]
    UnknownTag { id: u8, offset: usize },

    #[error("Negative length {len} at offset {offset}")]
    NegativeLength { len: i32, offset: usize },

    #[error("Root tag must be a compound, found tag id {0}")]
    InvalidRoot(u8),

    #[error("Tag nesting exceeds 512 levels")]
    DepthLimit,

    #[error("Decompressed item bytes exceed {limit} bytes")]
    TooLarge { limit: usize },
}

/// Trees the tag stream format cannot represent
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{kind} of length {len} does not fit its length prefix")]
    TooLong { kind: TagKind, len: usize },

    #[error("List mixes {expected} and {found} elements")]
    MixedList { expected: TagKind, found: TagKind },

    #[error("TAG_End can only appear as the kind of an empty list")]
    UnexpectedEnd,

    #[error("Failed to compress tag stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Tag kinds of the NBT format, with their wire ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    End,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    ByteArray,
    String,
    List,
    Compound,
    IntArray,
    LongArray,
}

impl TagKind {
    pub fn id(&self) -> u8 {
        match self {
            TagKind::End => 0,
            TagKind::Byte => 1,
            TagKind::Short => 2,
            TagKind::Int => 3,
            TagKind::Long => 4,
            TagKind::Float => 5,
            TagKind::Double => 6,
            TagKind::ByteArray => 7,
            TagKind::String => 8,
            TagKind::List => 9,
            TagKind::Compound => 10,
            TagKind::IntArray => 11,
            TagKind::LongArray => 12,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => TagKind::End,
            1 => TagKind::Byte,
            2 => TagKind::Short,
            3 => TagKind::Int,
            4 => TagKind::Long,
            5 => TagKind::Float,
            6 => TagKind::Double,
            7 => TagKind::ByteArray,
            8 => TagKind::String,
            9 => TagKind::List,
            10 => TagKind::Compound,
            11 => TagKind::IntArray,
            12 => TagKind::LongArray,
            _ => return None,
        })
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::End => "TAG_End",
            TagKind::Byte => "TAG_Byte",
            TagKind::Short => "TAG_Short",
            TagKind::Int => "TAG_Int",
            TagKind::Long => "TAG_Long",
            TagKind::Float => "TAG_Float",
            TagKind::Double => "TAG_Double",
            TagKind::ByteArray => "TAG_Byte_Array",
            TagKind::String => "TAG_String",
            TagKind::List => "TAG_List",
            TagKind::Compound => "TAG_Compound",
            TagKind::IntArray => "TAG_Int_Array",
            TagKind::LongArray => "TAG_Long_Array",
        };
        f.write_str(name)
    }
}

/// A decoded tag value
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::End => TagKind::End,
            Tag::Byte(_) => TagKind::Byte,
            Tag::Short(_) => TagKind::Short,
            Tag::Int(_) => TagKind::Int,
            Tag::Long(_) => TagKind::Long,
            Tag::Float(_) => TagKind::Float,
            Tag::Double(_) => TagKind::Double,
            Tag::ByteArray(_) => TagKind::ByteArray,
            Tag::String(_) => TagKind::String,
            Tag::List(_) => TagKind::List,
            Tag::Compound(_) => TagKind::Compound,
            Tag::IntArray(_) => TagKind::IntArray,
            Tag::LongArray(_) => TagKind::LongArray,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integral value of Byte/Short/Int/Long tags
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Tag::Byte(v) => Some(v.into()),
            Tag::Short(v) => Some(v.into()),
            Tag::Int(v) => Some(v.into()),
            Tag::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Value of any numeric scalar tag, widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Tag::Float(v) => Some(v.into()),
            Tag::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }
}

impl From<i8> for Tag {
    fn from(v: i8) -> Self {
        Tag::Byte(v)
    }
}

impl From<i16> for Tag {
    fn from(v: i16) -> Self {
        Tag::Short(v)
    }
}

impl From<i32> for Tag {
    fn from(v: i32) -> Self {
        Tag::Int(v)
    }
}

impl From<i64> for Tag {
    fn from(v: i64) -> Self {
        Tag::Long(v)
    }
}

impl From<f32> for Tag {
    fn from(v: f32) -> Self {
        Tag::Float(v)
    }
}

impl From<f64> for Tag {
    fn from(v: f64) -> Self {
        Tag::Double(v)
    }
}

impl From<&str> for Tag {
    fn from(v: &str) -> Self {
        Tag::String(v.to_string())
    }
}

impl From<String> for Tag {
    fn from(v: String) -> Self {
        Tag::String(v)
    }
}

impl From<Compound> for Tag {
    fn from(v: Compound) -> Self {
        Tag::Compound(v)
    }
}

impl From<Vec<Tag>> for Tag {
    fn from(v: Vec<Tag>) -> Self {
        Tag::List(v)
    }
}

impl From<Vec<i8>> for Tag {
    fn from(v: Vec<i8>) -> Self {
        Tag::ByteArray(v)
    }
}

impl From<Vec<i32>> for Tag {
    fn from(v: Vec<i32>) -> Self {
        Tag::IntArray(v)
    }
}

impl From<Vec<i64>> for Tag {
    fn from(v: Vec<i64>) -> Self {
        Tag::LongArray(v)
    }
}

/// Named children of a compound tag, kept in stream order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
    positions: HashMap<String, usize>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a child. A replaced child keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, tag: impl Into<Tag>) {
        let name = name.into();
        let tag = tag.into();
        match self.positions.get(&name) {
            Some(&position) => self.entries[position].1 = tag,
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, tag));
            }
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, tag: impl Into<Tag>) -> Self {
        self.insert(name, tag);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.positions
            .get(name)
            .map(|&position| &self.entries[position].1)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Tag::as_str)
    }

    pub fn get_compound(&self, name: &str) -> Option<&Compound> {
        self.get(name).and_then(Tag::as_compound)
    }

    /// First child in stream order
    pub fn first(&self) -> Option<(&str, &Tag)> {
        self.entries.first().map(|(n, tag)| (n.as_str(), tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(n, tag)| (n.as_str(), tag))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Root of a decoded tag stream: a named compound
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blob {
    pub name: String,
    pub root: Compound,
}

impl Blob {
    pub fn new(root: Compound) -> Self {
        Self {
            name: String::new(),
            root,
        }
    }
}

/// Decode an auction `item_bytes` field: base64 -> gzip -> NBT.
pub fn decode_item_bytes(item_bytes: &str) -> Result<Blob, DecodeError> {
    let compressed = general_purpose::STANDARD.decode(item_bytes.trim())?;

    let mut raw = Vec::new();
    MultiGzDecoder::new(compressed.as_slice())
        .take(MAX_DECOMPRESSED as u64 + 1)
        .read_to_end(&mut raw)?;
    if raw.len() > MAX_DECOMPRESSED {
        return Err(DecodeError::TooLarge {
            limit: MAX_DECOMPRESSED,
        });
    }

    from_bytes(&raw)
}

/// Encode a tree the way the auction API ships it: NBT -> gzip -> base64.
pub fn encode_item_bytes(blob: &Blob) -> Result<String, EncodeError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&to_bytes(blob)?)?;
    let compressed = encoder.finish()?;
    Ok(general_purpose::STANDARD.encode(compressed))
}

//! Big-endian tag stream parser

use super::{Blob, Compound, DecodeError, Tag, TagKind, MAX_DEPTH};

/// Parse an uncompressed tag stream whose root is a named compound.
///
/// Bytes after the root compound are ignored.
pub fn from_bytes(bytes: &[u8]) -> Result<Blob, DecodeError> {
    let mut reader = Reader::new(bytes);

    let id = reader.read_u8()?;
    if id != TagKind::Compound.id() {
        return Err(DecodeError::InvalidRoot(id));
    }
    let name = reader.read_string()?;
    let root = reader.read_compound(1)?;

    Ok(Blob { name, root })
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::UnexpectedEof {
                needed: n - self.remaining(),
                offset: self.pos,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(i8::from_be_bytes(self.array()?))
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    fn read_kind(&mut self) -> Result<TagKind, DecodeError> {
        let offset = self.pos;
        let id = self.read_u8()?;
        TagKind::from_id(id).ok_or(DecodeError::UnknownTag { id, offset })
    }

    /// Array/list length prefix; `min_element_size` bounds the count by
    /// the bytes actually left so a corrupt prefix cannot force a huge
    /// allocation.
    fn read_len(&mut self, min_element_size: usize) -> Result<usize, DecodeError> {
        let offset = self.pos;
        let len = self.read_i32()?;
        if len < 0 {
            return Err(DecodeError::NegativeLength { len, offset });
        }
        let len = len as usize;
        let needed = len.saturating_mul(min_element_size);
        if needed > self.remaining() {
            return Err(DecodeError::UnexpectedEof {
                needed: needed - self.remaining(),
                offset: self.pos,
            });
        }
        Ok(len)
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        Ok(decode_java_string(bytes))
    }

    fn read_compound(&mut self, depth: usize) -> Result<Compound, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthLimit);
        }
        let mut compound = Compound::new();
        loop {
            let kind = self.read_kind()?;
            if kind == TagKind::End {
                return Ok(compound);
            }
            let name = self.read_string()?;
            let tag = self.read_payload(kind, depth)?;
            compound.insert(name, tag);
        }
    }

    fn read_list(&mut self, depth: usize) -> Result<Vec<Tag>, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthLimit);
        }
        let offset = self.pos;
        let kind = self.read_kind()?;
        let len = self.read_len(min_payload_size(kind))?;
        if kind == TagKind::End && len > 0 {
            return Err(DecodeError::UnknownTag { id: 0, offset });
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_payload(kind, depth)?);
        }
        Ok(items)
    }

    fn read_payload(&mut self, kind: TagKind, depth: usize) -> Result<Tag, DecodeError> {
        Ok(match kind {
            TagKind::End => Tag::End,
            TagKind::Byte => Tag::Byte(self.read_i8()?),
            TagKind::Short => Tag::Short(self.read_i16()?),
            TagKind::Int => Tag::Int(self.read_i32()?),
            TagKind::Long => Tag::Long(self.read_i64()?),
            TagKind::Float => Tag::Float(self.read_f32()?),
            TagKind::Double => Tag::Double(self.read_f64()?),
            TagKind::ByteArray => {
                let len = self.read_len(1)?;
                Tag::ByteArray(self.take(len)?.iter().map(|b| *b as i8).collect())
            }
            TagKind::String => Tag::String(self.read_string()?),
            TagKind::List => Tag::List(self.read_list(depth + 1)?),
            TagKind::Compound => Tag::Compound(self.read_compound(depth + 1)?),
            TagKind::IntArray => {
                let len = self.read_len(4)?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.read_i32()?);
                }
                Tag::IntArray(values)
            }
            TagKind::LongArray => {
                let len = self.read_len(8)?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.read_i64()?);
                }
                Tag::LongArray(values)
            }
        })
    }
}

fn min_payload_size(kind: TagKind) -> usize {
    match kind {
        TagKind::End => 0,
        TagKind::Byte => 1,
        TagKind::Short | TagKind::String => 2,
        TagKind::Int | TagKind::Float => 4,
        TagKind::Long | TagKind::Double => 8,
        TagKind::ByteArray | TagKind::IntArray | TagKind::LongArray => 4,
        TagKind::List => 5,
        TagKind::Compound => 1,
    }
}

/// Java writes strings as "modified UTF-8": NUL becomes `C0 80`.
/// Anything else that is not valid UTF-8 is replaced lossily.
fn decode_java_string(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_owned();
    }
    let mut cleaned = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0xC0 && bytes.get(i + 1) == Some(&0x80) {
            cleaned.push(0);
            i += 2;
        } else {
            cleaned.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&cleaned).into_owned()
}

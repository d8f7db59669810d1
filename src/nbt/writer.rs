//! Big-endian tag stream writer, the inverse of the parser

use super::{Blob, Compound, EncodeError, Tag, TagKind};

/// Serialize a tree into an uncompressed tag stream.
///
/// Trees the parser would not read back the same way are refused:
/// over-long strings or arrays, lists mixing element kinds, and `End`
/// anywhere but as the kind of an empty list.
pub fn to_bytes(blob: &Blob) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    out.push(TagKind::Compound.id());
    write_string(&mut out, &blob.name)?;
    write_compound(&mut out, &blob.root)?;
    Ok(out)
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<(), EncodeError> {
    let mut bytes = Vec::with_capacity(s.len());
    for b in s.bytes() {
        if b == 0 {
            bytes.extend_from_slice(&[0xC0, 0x80]);
        } else {
            bytes.push(b);
        }
    }
    let len = u16::try_from(bytes.len()).map_err(|_| EncodeError::TooLong {
        kind: TagKind::String,
        len: bytes.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&bytes);
    Ok(())
}

fn write_len(out: &mut Vec<u8>, kind: TagKind, len: usize) -> Result<(), EncodeError> {
    let prefix = i32::try_from(len).map_err(|_| EncodeError::TooLong { kind, len })?;
    out.extend_from_slice(&prefix.to_be_bytes());
    Ok(())
}

fn write_compound(out: &mut Vec<u8>, compound: &Compound) -> Result<(), EncodeError> {
    for (name, tag) in compound.iter() {
        if tag.kind() == TagKind::End {
            return Err(EncodeError::UnexpectedEnd);
        }
        out.push(tag.kind().id());
        write_string(out, name)?;
        write_payload(out, tag)?;
    }
    out.push(TagKind::End.id());
    Ok(())
}

fn write_payload(out: &mut Vec<u8>, tag: &Tag) -> Result<(), EncodeError> {
    match tag {
        Tag::End => return Err(EncodeError::UnexpectedEnd),
        Tag::Byte(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::ByteArray(values) => {
            write_len(out, TagKind::ByteArray, values.len())?;
            out.extend(values.iter().map(|v| *v as u8));
        }
        Tag::String(s) => write_string(out, s)?,
        Tag::List(items) => {
            let kind = items.first().map(Tag::kind).unwrap_or(TagKind::End);
            if let Some(other) = items.iter().map(Tag::kind).find(|k| *k != kind) {
                return Err(EncodeError::MixedList {
                    expected: kind,
                    found: other,
                });
            }
            out.push(kind.id());
            write_len(out, TagKind::List, items.len())?;
            for item in items {
                write_payload(out, item)?;
            }
        }
        Tag::Compound(compound) => write_compound(out, compound)?,
        Tag::IntArray(values) => {
            write_len(out, TagKind::IntArray, values.len())?;
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        Tag::LongArray(values) => {
            write_len(out, TagKind::LongArray, values.len())?;
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
    Ok(())
}

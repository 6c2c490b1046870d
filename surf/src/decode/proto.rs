//! Schema-less protocol-buffer sniffing.
//!
//! Binary attributes frequently hold serialised protobuf messages whose schema
//! is unknown to us. Walking the wire format is enough to pull out the
//! length-delimited payloads, which is where human-readable strings live.
//!
//! Decoding is all or nothing: a blob either parses structurally from the
//! first byte to the last, or it yields no payloads at all. A length-delimited
//! field that itself parses as a message is descended into; one that does not
//! is kept as a leaf payload. Field semantics are never validated, so random
//! bytes can occasionally pass.
//!
//! Nesting is followed to at most [`MAX_DEPTH`] levels. Deeper length-delimited
//! fields are kept whole as leaf payloads and deeper groups fail the blob.

/// Recursion limit for nested messages and groups, as in protobuf runtimes.
pub const MAX_DEPTH: usize = 100;

const MAX_VARINT_LEN: usize = 10;
const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    Bytes,
    StartGroup,
    EndGroup,
    Fixed32,
}

impl WireType {
    fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::Bytes),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }
}

/// Reads a base-128 varint, returning the value and the bytes consumed.
pub fn consume_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Reads a field key, returning field number, wire type and bytes consumed.
pub fn consume_tag(buf: &[u8]) -> Option<(u32, WireType, usize)> {
    let (raw, len) = consume_varint(buf)?;
    let number = raw >> 3;
    if number == 0 || number > MAX_FIELD_NUMBER {
        return None;
    }
    let wire = WireType::from_raw(raw & 0x7)?;
    Some((number as u32, wire, len))
}

fn take_fixed(buf: &[u8], width: usize) -> Option<usize> {
    (buf.len() >= width).then_some(width)
}

/// Parses fields until the buffer ends or, inside a group, until the matching
/// end-group tag. Returns the number of bytes consumed.
fn parse_fields<'a>(
    buf: &'a [u8],
    group: Option<u32>,
    depth: usize,
    payloads: &mut Vec<&'a [u8]>,
) -> Option<usize> {
    let mut pos = 0;
    while pos < buf.len() {
        let (number, wire, tag_len) = consume_tag(&buf[pos..])?;
        pos += tag_len;

        let value_len = match wire {
            WireType::Varint => consume_varint(&buf[pos..])?.1,
            WireType::Fixed64 => take_fixed(&buf[pos..], 8)?,
            WireType::Fixed32 => take_fixed(&buf[pos..], 4)?,
            WireType::Bytes => {
                let (len, prefix_len) = consume_varint(&buf[pos..])?;
                let start = pos + prefix_len;
                let len = usize::try_from(len).ok()?;
                let end = start.checked_add(len).filter(|&end| end <= buf.len())?;
                let payload = &buf[start..end];

                let mut nested = Vec::new();
                if depth < MAX_DEPTH
                    && parse_fields(payload, None, depth + 1, &mut nested) == Some(payload.len())
                {
                    payloads.extend(nested);
                } else {
                    payloads.push(payload);
                }
                prefix_len + len
            }
            WireType::StartGroup if depth >= MAX_DEPTH => return None,
            WireType::StartGroup => parse_fields(&buf[pos..], Some(number), depth + 1, payloads)?,
            WireType::EndGroup => {
                return (group == Some(number)).then_some(pos);
            }
        };

        if value_len == 0 {
            return None;
        }
        pos += value_len;
    }

    // a group must be closed by its end tag
    match group {
        Some(_) => None,
        None => Some(pos),
    }
}

/// Parses `blob` as an unknown-schema message and returns every leaf
/// length-delimited payload found at any depth. `None` when the blob is not
/// a structurally valid message.
pub fn parse_unknown(blob: &[u8]) -> Option<Vec<&[u8]>> {
    let mut payloads = Vec::new();
    let consumed = parse_fields(blob, None, 0, &mut payloads)?;
    (consumed == blob.len()).then_some(payloads)
}

/// Joins payloads into one searchable string.
pub fn join_payloads(payloads: &[&[u8]], delimiter: &str) -> String {
    payloads
        .iter()
        .map(|p| String::from_utf8_lossy(p))
        .collect::<Vec<_>>()
        .join(delimiter)
}

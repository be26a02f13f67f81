//! Minimal decoder for the `ApexManifest` protobuf message.
//!
//! Only the fields needed to identify a package are read:
//! `string name = 1` and `int64 version = 2`. Other fields are skipped by
//! wire type.

use crate::error::ApexError;
use crate::ApexManifest;

const FIELD_NAME: u64 = 1;
const FIELD_VERSION: u64 = 2;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

fn invalid(msg: impl Into<String>) -> ApexError {
    ApexError::InvalidProtobuf(msg.into())
}

fn read_varint(buf: &[u8], pos: &mut usize) -> Result<u64, ApexError> {
    let mut value: u64 = 0;
    for shift in (0..64).step_by(7) {
        let byte = *buf.get(*pos).ok_or_else(|| invalid("truncated varint"))?;
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(invalid("varint too long"))
}

fn take<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], ApexError> {
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| invalid("field runs past end of message"))?;
    let slice = &buf[*pos..end];
    *pos = end;
    Ok(slice)
}

/// Decode an encoded `ApexManifest` message.
pub fn decode_manifest(buf: &[u8]) -> Result<ApexManifest, ApexError> {
    let mut pos = 0;
    let mut name = None;
    let mut version = None;

    while pos < buf.len() {
        let key = read_varint(buf, &mut pos)?;
        let field = key >> 3;
        match key & 0x7 {
            WIRE_VARINT => {
                let value = read_varint(buf, &mut pos)?;
                if field == FIELD_VERSION {
                    version = Some(value as i64);
                }
            }
            WIRE_FIXED64 => {
                take(buf, &mut pos, 8)?;
            }
            WIRE_LEN => {
                let len = usize::try_from(read_varint(buf, &mut pos)?)
                    .map_err(|_| invalid("length overflow"))?;
                let bytes = take(buf, &mut pos, len)?;
                if field == FIELD_NAME {
                    let s = std::str::from_utf8(bytes)
                        .map_err(|e| invalid(format!("name is not UTF-8: {}", e)))?;
                    name = Some(s.to_string());
                }
            }
            WIRE_FIXED32 => {
                take(buf, &mut pos, 4)?;
            }
            other => return Err(invalid(format!("unsupported wire type {}", other))),
        }
    }

    match name {
        Some(name) if !name.is_empty() => Ok(ApexManifest { name, version }),
        _ => Err(ApexError::MissingName),
    }
}

//! Low-level wire format primitives.
//!
//! ## Wire Format Overview
//!
//! Each field is encoded as:
//! - A varint "tag" containing the field index and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT
//! - 1: I64 (8 bytes, little-endian)
//! - 2: LEN (varint length followed by that many bytes)
//! - 3 / 4: group start / end markers (legacy, carry no payload)
//! - 5: I32 (4 bytes, little-endian)

mod varint;

use crate::error::{Error, Result};

pub use varint::{encoded_len, read_varint32, read_varint64, MAX_VARINT32_LEN, MAX_VARINT_LEN};

/// Wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::UnsupportedWireType {
                offset: 0,
                wire_type: value,
            }),
        }
    }
}

/// A decoded field tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// Field index (`raw >> 3`)
    pub index: u64,
    /// Wire type (`raw & 0x7`)
    pub wire_type: WireType,
}

impl Tag {
    /// Split a raw tag read at `offset` into index and wire type
    pub fn from_raw(raw: u32, offset: usize) -> Result<Self> {
        let wire_type = (raw & 0x07) as u8;
        let wire_type = WireType::try_from(wire_type)
            .map_err(|_| Error::UnsupportedWireType { offset, wire_type })?;

        Ok(Self {
            index: u64::from(raw >> 3),
            wire_type,
        })
    }
}

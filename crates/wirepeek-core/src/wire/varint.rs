//! Base-128 varint decoding with strict overrun protection.
//!
//! Both readers take the whole buffer plus a `[start, len)` window rather
//! than a sub-slice, so reported offsets are always absolute positions in
//! the caller's buffer.

use crate::error::{Error, Result};

/// Maximum encoded size of a 64-bit varint
pub const MAX_VARINT_LEN: usize = 10;

/// Maximum canonical encoded size of a 32-bit varint
pub const MAX_VARINT32_LEN: usize = 5;

fn check_range(data: &[u8], start: usize, len: usize) -> Result<()> {
    if start > len || len > data.len() || len == 0 {
        return Err(Error::invalid_range(start, len, data.len()));
    }
    Ok(())
}

/// Decode a 64-bit varint from `data[start..len]`.
///
/// Returns the decoded value and the number of bytes it occupied (1-10).
/// Bits of a tenth byte beyond bit 63 are dropped.
pub fn read_varint64(data: &[u8], start: usize, len: usize) -> Result<(u64, usize)> {
    check_range(data, start, len)?;

    let mut result: u64 = 0;
    for (i, &byte) in data[start..len].iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(Error::truncated_varint(start));
        }

        result |= u64::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::truncated_varint(start))
}

/// Decode a 32-bit varint from `data[start..len]`.
///
/// The value is accumulated at 64-bit width and rejected with
/// [`Error::VarintOverflow32`] if it does not fit in a `u32`. Padded
/// encodings longer than five bytes are accepted as long as the value fits.
pub fn read_varint32(data: &[u8], start: usize, len: usize) -> Result<(u32, usize)> {
    let (value, used) = read_varint64(data, start, len)?;
    let value = u32::try_from(value).map_err(|_| Error::varint_overflow32(start))?;
    Ok((value, used))
}

/// Number of bytes the canonical encoding of `value` occupies
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

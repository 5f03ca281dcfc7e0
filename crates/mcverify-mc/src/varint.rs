//! `VarInt` encoding/decoding for Minecraft protocol.
//!
//! Minecraft uses a variable-length integer encoding where each byte
//! uses 7 bits for data and 1 bit to indicate if more bytes follow.

use bytes::BufMut;

use crate::error::{ProtocolError, Result};

/// Segment bits mask (lower 7 bits).
pub(crate) const SEGMENT_BITS: u8 = 0x7F;

/// Continue bit (high bit).
pub(crate) const CONTINUE_BIT: u8 = 0x80;

/// Maximum encoded size of a `VarInt`.
pub const MAX_VARINT_LEN: usize = 5;

/// Decode a `VarInt` from the start of a byte slice without consuming it.
///
/// Returns `Ok(None)` if the slice ends before the `VarInt` does, or the
/// decoded value and its encoded length otherwise.
///
/// # Errors
///
/// Returns [`ProtocolError::VarIntTooBig`] if the fifth byte still has the
/// continue bit set.
pub fn peek_varint(bytes: &[u8]) -> Result<Option<(i32, usize)>> {
    let mut value: i32 = 0;
    let mut position: u32 = 0;

    for (index, &byte) in bytes.iter().enumerate() {
        value |= i32::from(byte & SEGMENT_BITS) << position;

        if byte & CONTINUE_BIT == 0 {
            return Ok(Some((value, index + 1)));
        }

        if index + 1 == MAX_VARINT_LEN {
            return Err(ProtocolError::VarIntTooBig);
        }
        position += 7;
    }

    Ok(None)
}

/// Write a `VarInt` to a buffer.
///
/// Returns the number of bytes written.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub fn put_varint(buf: &mut impl BufMut, mut value: i32) -> usize {
    let mut bytes_written = 0;

    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = (value & i32::from(SEGMENT_BITS)) as u8;
        value = ((value as u32) >> 7) as i32;

        if value != 0 {
            byte |= CONTINUE_BIT;
        }

        buf.put_u8(byte);
        bytes_written += 1;

        if value == 0 {
            break;
        }
    }

    bytes_written
}

/// Calculate the number of bytes needed to encode a `VarInt`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn varint_len(value: i32) -> usize {
    let value = value as u32;

    if value == 0 {
        return 1;
    }

    let bits_needed = 32 - value.leading_zeros();
    (bits_needed as usize).div_ceil(7)
}

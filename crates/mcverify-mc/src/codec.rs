//! Byte-level reading and writing for Minecraft protocol data.
//!
//! Minecraft packets are framed as:
//! - `[VarInt length][VarInt packet_id][payload...]`
//!
//! The length includes the packet ID and payload, but not itself.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{ProtocolError, Result};
use crate::varint::{CONTINUE_BIT, SEGMENT_BITS, peek_varint, put_varint, varint_len};

/// Maximum packet size (2 MiB, same as vanilla).
pub const MAX_PACKET_SIZE: usize = 2 * 1024 * 1024;

/// Default maximum string length in characters.
pub const MAX_STRING_LENGTH: usize = 32767;

/// Reads protocol values from a buffer, counting the bytes consumed.
#[derive(Debug)]
pub struct ByteReader<B> {
    buf: B,
    bytes_read: usize,
}

impl<B: Buf> ByteReader<B> {
    /// Create a reader over the given buffer.
    pub const fn new(buf: B) -> Self {
        Self { buf, bytes_read: 0 }
    }

    /// Total number of bytes consumed so far.
    #[must_use]
    pub const fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Number of bytes left in the underlying buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(ProtocolError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    /// Read a single byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is empty.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        self.bytes_read += 1;
        Ok(self.buf.get_u8())
    }

    /// Read a boolean (any non-zero byte is `true`).
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is empty.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a `VarInt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer ends early or the `VarInt` is longer
    /// than 5 bytes.
    pub fn read_varint(&mut self) -> Result<i32> {
        let mut value: i32 = 0;
        let mut position: u32 = 0;

        loop {
            let byte = self.read_u8()?;
            value |= i32::from(byte & SEGMENT_BITS) << position;

            if byte & CONTINUE_BIT == 0 {
                break;
            }

            position += 7;
            if position >= 32 {
                return Err(ProtocolError::VarIntTooBig);
            }
        }

        Ok(value)
    }

    /// Read a string of at most `max_chars` characters.
    ///
    /// The byte length prefix is checked against the UTF-8 worst case
    /// (`max_chars * 3`) before anything is decoded, and the decoded string
    /// is checked again in UTF-16 code units.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::StringTooLong`] if either bound is exceeded
    /// or the prefix is negative.
    pub fn read_utf8(&mut self, max_chars: usize) -> Result<String> {
        let len = self.read_varint()?;
        let max_bytes = max_chars * 3;

        let len = usize::try_from(len).map_err(|_| ProtocolError::StringTooLong {
            len: 0,
            max: max_bytes,
        })?;

        if len > max_bytes {
            return Err(ProtocolError::StringTooLong {
                len,
                max: max_bytes,
            });
        }

        let bytes = self.read_bytes(len)?;
        let string = String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;

        let chars = string.encode_utf16().count();
        if chars > max_chars {
            return Err(ProtocolError::StringTooLong {
                len: chars,
                max: max_chars,
            });
        }

        Ok(string)
    }

    /// Read a string bounded by [`MAX_STRING_LENGTH`].
    ///
    /// # Errors
    ///
    /// See [`ByteReader::read_utf8`].
    pub fn read_string(&mut self) -> Result<String> {
        self.read_utf8(MAX_STRING_LENGTH)
    }

    /// Read a big-endian unsigned short.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 2 bytes remain.
    pub fn read_unsigned_short(&mut self) -> Result<u16> {
        self.ensure(2)?;
        self.bytes_read += 2;
        Ok(self.buf.get_u16())
    }

    /// Read a big-endian signed long.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 8 bytes remain.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        self.bytes_read += 8;
        Ok(self.buf.get_i64())
    }

    /// Read a UUID as two big-endian longs (most significant first).
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 16 bytes remain.
    #[allow(clippy::cast_sign_loss)]
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let most = self.read_i64()? as u64;
        let least = self.read_i64()? as u64;
        Ok(Uuid::from_u64_pair(most, least))
    }

    /// Read exactly `len` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(len)?;
        self.bytes_read += len;
        Ok(self.buf.copy_to_bytes(len))
    }

    /// Read a `VarInt`-prefixed byte array.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is negative or the buffer ends early.
    pub fn read_byte_array(&mut self) -> Result<Bytes> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;
        self.read_bytes(len)
    }

    /// Discard exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than `len` bytes remain.
    pub fn consume(&mut self, len: usize) -> Result<()> {
        self.ensure(len)?;
        self.bytes_read += len;
        self.buf.advance(len);
        Ok(())
    }
}

/// Writes protocol values into a growable buffer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer, returning the written bytes.
    #[must_use]
    pub fn into_inner(self) -> BytesMut {
        self.buf
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Write a boolean as a `VarInt` 0 or 1.
    pub fn write_bool(&mut self, value: bool) {
        self.write_varint(i32::from(value));
    }

    /// Write a `VarInt`.
    pub fn write_varint(&mut self, value: i32) {
        put_varint(&mut self.buf, value);
    }

    /// Write a `VarInt`-prefixed UTF-8 string.
    pub fn write_utf8(&mut self, value: &str) {
        self.write_byte_array(value.as_bytes());
    }

    /// Write a big-endian unsigned short.
    pub fn write_unsigned_short(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Write a big-endian signed long.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Write a UUID as two big-endian longs (most significant first).
    #[allow(clippy::cast_possible_wrap)]
    pub fn write_uuid(&mut self, value: Uuid) {
        let (most, least) = value.as_u64_pair();
        self.write_i64(most as i64);
        self.write_i64(least as i64);
    }

    /// Write raw bytes with no prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a `VarInt`-prefixed byte array.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn write_byte_array(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as i32);
        self.write_bytes(bytes);
    }
}

/// Prefix a serialized packet (ID and body) with its `VarInt` length.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn frame(packet: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(varint_len(packet.len() as i32) + packet.len());
    put_varint(&mut buf, packet.len() as i32);
    buf.put_slice(packet);
    buf
}

/// Split one complete frame (length prefix included) off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed.
///
/// # Errors
///
/// Returns an error if the length prefix is malformed, negative, or
/// exceeds [`MAX_PACKET_SIZE`].
pub fn split_frame(buf: &mut BytesMut) -> Result<Option<BytesMut>> {
    let Some((length, header_len)) = peek_varint(buf)? else {
        return Ok(None);
    };

    let length = usize::try_from(length).map_err(|_| ProtocolError::NegativeLength(length))?;

    if length > MAX_PACKET_SIZE {
        return Err(ProtocolError::PacketTooLong {
            len: length,
            max: MAX_PACKET_SIZE,
        });
    }

    let total = header_len + length;
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }

    Ok(Some(buf.split_to(total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: BytesMut) -> ByteReader<Bytes> {
        ByteReader::new(bytes.freeze())
    }

    #[test]
    fn test_read_write_string() {
        let original = "Hello, Minecraft!";

        let mut writer = ByteWriter::new();
        writer.write_utf8(original);

        let mut reader = reader(writer.into_inner());
        assert_eq!(reader.read_string().unwrap(), original);
        assert_eq!(reader.bytes_read(), 1 + original.len());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_string_prefix_too_long() {
        let mut writer = ByteWriter::new();
        // Claims 49 bytes for a 16 character limit, with no body behind it
        writer.write_varint(49);

        let result = reader(writer.into_inner()).read_utf8(16);
        assert!(matches!(
            result,
            Err(ProtocolError::StringTooLong { len: 49, max: 48 })
        ));
    }

    #[test]
    fn test_string_negative_prefix() {
        let mut writer = ByteWriter::new();
        writer.write_varint(-1);

        let result = reader(writer.into_inner()).read_utf8(16);
        assert!(matches!(result, Err(ProtocolError::StringTooLong { .. })));
    }

    #[test]
    fn test_string_too_many_chars() {
        // 17 ASCII characters fit the byte bound of 48 but not the char bound of 16
        let mut writer = ByteWriter::new();
        writer.write_utf8("abcdefghijklmnopq");

        let result = reader(writer.into_inner()).read_utf8(16);
        assert!(matches!(
            result,
            Err(ProtocolError::StringTooLong { len: 17, max: 16 })
        ));
    }

    #[test]
    fn test_string_multibyte_chars_counted_once() {
        // 4 characters, 12 bytes
        let mut writer = ByteWriter::new();
        writer.write_utf8("日本語字");

        assert_eq!(reader(writer.into_inner()).read_utf8(4).unwrap(), "日本語字");
    }

    #[test]
    fn test_string_invalid_utf8() {
        let mut writer = ByteWriter::new();
        writer.write_byte_array(&[0xff, 0xfe]);

        let result = reader(writer.into_inner()).read_string();
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8)));
    }

    #[test]
    fn test_short_reads() {
        let mut r = reader(BytesMut::from(&[0x01][..]));
        assert!(matches!(
            r.read_unsigned_short(),
            Err(ProtocolError::UnexpectedEof {
                needed: 2,
                remaining: 1
            })
        ));

        let mut r = reader(BytesMut::from(&[0u8; 15][..]));
        assert!(matches!(
            r.read_uuid(),
            Err(ProtocolError::UnexpectedEof { .. })
        ));

        let mut writer = ByteWriter::new();
        writer.write_varint(10);
        writer.write_bytes(&[1, 2, 3]);
        assert!(matches!(
            reader(writer.into_inner()).read_byte_array(),
            Err(ProtocolError::UnexpectedEof {
                needed: 10,
                remaining: 3
            })
        ));

        assert!(matches!(
            reader(BytesMut::new()).read_varint(),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_negative_byte_array_length() {
        let mut writer = ByteWriter::new();
        writer.write_varint(-5);

        assert!(matches!(
            reader(writer.into_inner()).read_byte_array(),
            Err(ProtocolError::NegativeLength(-5))
        ));
    }

    #[test]
    fn test_fixed_width_values() {
        let mut writer = ByteWriter::new();
        writer.write_unsigned_short(25565);
        writer.write_i64(-2);
        writer.write_bool(true);
        writer.write_bool(false);

        let bytes = writer.into_inner();
        assert_eq!(&bytes[..2], &[0x63, 0xdd]);

        let mut r = reader(bytes);
        assert_eq!(r.read_unsigned_short().unwrap(), 25565);
        assert_eq!(r.read_i64().unwrap(), -2);
        assert!(r.read_bool().unwrap());
        assert!(!r.read_bool().unwrap());
        assert_eq!(r.bytes_read(), 12);
    }

    #[test]
    fn test_uuid_layout() {
        let uuid = Uuid::parse_str("853c80ef-3c37-49fd-aa49-938b674adae6").unwrap();

        let mut writer = ByteWriter::new();
        writer.write_uuid(uuid);
        let bytes = writer.into_inner();

        // Two big-endian halves are the RFC byte order
        assert_eq!(&bytes[..], uuid.as_bytes());
        assert_eq!(reader(bytes).read_uuid().unwrap(), uuid);
    }

    #[test]
    fn test_consume() {
        let mut r = reader(BytesMut::from(&[1u8, 2, 3, 4][..]));
        r.consume(3).unwrap();
        assert_eq!(r.bytes_read(), 3);
        assert_eq!(r.read_u8().unwrap(), 4);
        assert!(r.consume(1).is_err());
    }

    #[test]
    fn test_split_frame() {
        let mut buf = frame(b"\x00hello");
        buf.extend_from_slice(&[0x02, 0x01]);

        let first = split_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&first[..], b"\x06\x00hello");

        // Second frame declares 2 bytes but only 1 is buffered
        assert!(split_frame(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], &[0x02, 0x01]);

        buf.extend_from_slice(&[0x09]);
        let second = split_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&second[..], &[0x02, 0x01, 0x09]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_split_frame_incomplete_length() {
        let mut buf = BytesMut::from(&[0x80][..]);
        assert!(split_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_split_frame_too_long() {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, i32::try_from(MAX_PACKET_SIZE + 1).unwrap());

        assert!(matches!(
            split_frame(&mut buf),
            Err(ProtocolError::PacketTooLong { .. })
        ));
    }

    #[test]
    fn test_split_frame_negative_length() {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, -1);

        assert!(matches!(
            split_frame(&mut buf),
            Err(ProtocolError::NegativeLength(-1))
        ));
    }
}

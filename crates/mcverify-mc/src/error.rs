//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when reading or writing Minecraft protocol data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A `VarInt` was too long (more than 5 bytes).
    #[error("VarInt too big")]
    VarIntTooBig,

    /// A string exceeded the maximum length.
    #[error("String too long: {len} (max {max})")]
    StringTooLong {
        /// The declared byte length or decoded character count.
        len: usize,
        /// The maximum allowed value.
        max: usize,
    },

    /// A length prefix was negative.
    #[error("Negative length: {0}")]
    NegativeLength(i32),

    /// The buffer ended before a value could be read completely.
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the read.
        needed: usize,
        /// Bytes that were left.
        remaining: usize,
    },

    /// A string was not valid UTF-8.
    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    /// A packet exceeded the maximum length.
    #[error("Packet too long: {len} bytes (max {max})")]
    PacketTooLong {
        /// The declared length of the packet.
        len: usize,
        /// The maximum allowed length.
        max: usize,
    },

    /// A packet ID that is not valid in this position was received.
    #[error("Invalid packet ID: {0}")]
    InvalidPacketId(i32),

    /// An invalid next state was requested in a handshake.
    #[error("Invalid next state: {0}")]
    InvalidNextState(i32),

    /// A packet other than the expected one arrived.
    #[error("Expected {expected} packet but found {actual}")]
    UnexpectedPacket {
        /// Name of the expected packet.
        expected: &'static str,
        /// Description of the packet that arrived.
        actual: String,
    },
}

/// Result type alias using [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;

//! Handshake packet definitions.
//!
//! The intention is the first packet sent by the client and declares
//! whether this is a status ping, a login attempt, or a transfer.

use bytes::Buf;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{ProtocolError, Result};
use crate::packets::traits::{Packet, ProtocolState, Readable, Writable};

/// The next state requested by an intention packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    /// Status request (server list ping).
    Status = 1,
    /// Login request.
    Login = 2,
    /// Transfer (1.20.5+).
    Transfer = 3,
}

impl TryFrom<i32> for NextState {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::Status),
            2 => Ok(Self::Login),
            3 => Ok(Self::Transfer),
            _ => Err(ProtocolError::InvalidNextState(value)),
        }
    }
}

/// Intention packet sent by the client.
///
/// The raw `intent` is kept as sent so that an unexpected value can still
/// be answered with a disconnect instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intention {
    /// The protocol version the client is using.
    pub protocol_version: i32,
    /// The server address the client connected to.
    pub server_address: String,
    /// The server port the client connected to.
    pub server_port: u16,
    /// The requested next state.
    pub intent: i32,
}

impl Intention {
    /// Interpret the raw intent.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidNextState`] for unknown values.
    pub fn next_state(&self) -> Result<NextState> {
        NextState::try_from(self.intent)
    }
}

impl Packet for Intention {
    const ID: i32 = 0x00;
    const STATE: ProtocolState = ProtocolState::Handshake;
    const NAME: &'static str = "Intention";
}

impl Readable for Intention {
    fn read<B: Buf>(reader: &mut ByteReader<B>) -> Result<Self> {
        Ok(Self {
            protocol_version: reader.read_varint()?,
            server_address: reader.read_string()?,
            server_port: reader.read_unsigned_short()?,
            intent: reader.read_varint()?,
        })
    }
}

impl Writable for Intention {
    fn write(&self, writer: &mut ByteWriter) {
        writer.write_varint(self.protocol_version);
        writer.write_utf8(&self.server_address);
        writer.write_unsigned_short(self.server_port);
        writer.write_varint(self.intent);
    }
}

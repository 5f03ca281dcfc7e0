//! Packet traits for serialization and deserialization.
//!
//! These traits provide a common interface for reading and writing the
//! handful of packets exchanged during a login handshake.

use bytes::Buf;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::Result;

/// The protocol state of a connection.
///
/// Selects which packet ID to decoder mapping is active for inbound data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    /// Handshaking state (initial connection).
    Handshake,
    /// Login state (authentication).
    Login,
}

/// A Minecraft protocol packet.
///
/// This trait provides metadata about a packet type, including its ID
/// and the protocol state it belongs to.
pub trait Packet: Sized {
    /// The packet ID.
    const ID: i32;

    /// The protocol state this packet belongs to.
    const STATE: ProtocolState;

    /// Human-readable packet name, used in error messages.
    const NAME: &'static str;
}

/// A packet body that can be read from a buffer.
pub trait Readable: Sized {
    /// Read the packet body (everything after the packet ID).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet data is malformed.
    fn read<B: Buf>(reader: &mut ByteReader<B>) -> Result<Self>;
}

/// A packet body that can be written to a buffer.
pub trait Writable {
    /// Write the packet body (everything after the packet ID).
    fn write(&self, writer: &mut ByteWriter);
}

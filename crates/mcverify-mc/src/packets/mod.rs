//! Minecraft protocol packets.
//!
//! Packets are organized by protocol state:
//! - Handshake: the client's intention
//! - Login: hello, encryption and disconnect
//!
//! Inbound packets are decoded through a per-state table of packet ID to
//! decoder. IDs missing from the active table are skipped, never decoded.

pub mod handshake;
pub mod login;
pub mod traits;

use std::fmt;

use bytes::{Bytes, BytesMut};

pub use handshake::{Intention, NextState};
pub use login::{Disconnect, EncryptionRequest, Hello, Key};
pub use traits::{Packet, ProtocolState, Readable, Writable};

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{ProtocolError, Result};

/// Decodes one packet body into an [`InboundPacket`].
type Decoder = fn(&mut ByteReader<Bytes>) -> Result<InboundPacket>;

fn decode_intention(reader: &mut ByteReader<Bytes>) -> Result<InboundPacket> {
    Intention::read(reader).map(InboundPacket::Intention)
}

fn decode_hello(reader: &mut ByteReader<Bytes>) -> Result<InboundPacket> {
    Hello::read(reader).map(InboundPacket::Hello)
}

fn decode_key(reader: &mut ByteReader<Bytes>) -> Result<InboundPacket> {
    Key::read(reader).map(InboundPacket::Key)
}

static HANDSHAKE_DECODERS: [(i32, Decoder); 1] = [(Intention::ID, decode_intention)];

static LOGIN_DECODERS: [(i32, Decoder); 2] =
    [(Hello::ID, decode_hello), (Key::ID, decode_key)];

impl ProtocolState {
    /// The inbound packet IDs registered for this state and their decoders.
    fn decoders(self) -> &'static [(i32, Decoder)] {
        match self {
            Self::Handshake => &HANDSHAKE_DECODERS,
            Self::Login => &LOGIN_DECODERS,
        }
    }

    fn decoder(self, id: i32) -> Option<Decoder> {
        self.decoders()
            .iter()
            .find(|(packet_id, _)| *packet_id == id)
            .map(|(_, decoder)| *decoder)
    }
}

/// A packet received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPacket {
    /// A packet ID not registered for the current state. The body was skipped.
    Unknown {
        /// The packet ID.
        id: i32,
    },
    /// Handshake intention.
    Intention(Intention),
    /// Login hello.
    Hello(Hello),
    /// Encryption response.
    Key(Key),
}

impl InboundPacket {
    /// Read one length-prefixed packet.
    ///
    /// Unregistered IDs consume exactly the declared remaining length and
    /// yield [`InboundPacket::Unknown`]. Registered decoders are not checked
    /// against the declared length.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame or packet body is malformed.
    pub fn read(state: ProtocolState, reader: &mut ByteReader<Bytes>) -> Result<Self> {
        let length = reader.read_varint()?;
        let length = usize::try_from(length).map_err(|_| ProtocolError::NegativeLength(length))?;

        let before_id = reader.bytes_read();
        let id = reader.read_varint()?;
        let remaining = length.saturating_sub(reader.bytes_read() - before_id);

        match state.decoder(id) {
            Some(decoder) => decoder(reader),
            None => {
                reader.consume(remaining)?;
                Ok(Self::Unknown { id })
            }
        }
    }

    /// Short description for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown { .. } => "Unknown",
            Self::Intention(_) => Intention::NAME,
            Self::Hello(_) => Hello::NAME,
            Self::Key(_) => Key::NAME,
        }
    }
}

impl fmt::Display for InboundPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { id } => write!(f, "Unknown(0x{id:02x})"),
            other => f.write_str(other.name()),
        }
    }
}

/// A concrete inbound packet type that can be extracted from an
/// [`InboundPacket`].
pub trait Inbound: Packet {
    /// Extract this packet type, handing the packet back on mismatch.
    ///
    /// # Errors
    ///
    /// Returns the original packet if it is a different variant.
    fn from_inbound(packet: InboundPacket) -> std::result::Result<Self, InboundPacket>;
}

impl Inbound for Intention {
    fn from_inbound(packet: InboundPacket) -> std::result::Result<Self, InboundPacket> {
        match packet {
            InboundPacket::Intention(intention) => Ok(intention),
            other => Err(other),
        }
    }
}

impl Inbound for Hello {
    fn from_inbound(packet: InboundPacket) -> std::result::Result<Self, InboundPacket> {
        match packet {
            InboundPacket::Hello(hello) => Ok(hello),
            other => Err(other),
        }
    }
}

impl Inbound for Key {
    fn from_inbound(packet: InboundPacket) -> std::result::Result<Self, InboundPacket> {
        match packet {
            InboundPacket::Key(key) => Ok(key),
            other => Err(other),
        }
    }
}

/// A packet sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPacket {
    /// Encryption request (the server's hello).
    Hello(EncryptionRequest),
    /// Disconnect with a reason.
    Disconnect(Disconnect),
}

impl OutboundPacket {
    /// The packet ID.
    #[must_use]
    pub const fn id(&self) -> i32 {
        match self {
            Self::Hello(_) => EncryptionRequest::ID,
            Self::Disconnect(_) => Disconnect::ID,
        }
    }

    /// Serialize the packet ID followed by the body, without a length prefix.
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        match self {
            Self::Hello(packet) => encode(packet),
            Self::Disconnect(packet) => encode(packet),
        }
    }

    /// Read one length-prefixed clientbound login packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed or the ID is unknown.
    pub fn read(reader: &mut ByteReader<Bytes>) -> Result<Self> {
        let _length = reader.read_varint()?;
        match reader.read_varint()? {
            EncryptionRequest::ID => EncryptionRequest::read(reader).map(Self::Hello),
            Disconnect::ID => Disconnect::read(reader).map(Self::Disconnect),
            id => Err(ProtocolError::InvalidPacketId(id)),
        }
    }
}

impl From<EncryptionRequest> for OutboundPacket {
    fn from(packet: EncryptionRequest) -> Self {
        Self::Hello(packet)
    }
}

impl From<Disconnect> for OutboundPacket {
    fn from(packet: Disconnect) -> Self {
        Self::Disconnect(packet)
    }
}

/// Serialize a packet's ID followed by its body, without a length prefix.
#[must_use]
pub fn encode<P: Packet + Writable>(packet: &P) -> BytesMut {
    let mut writer = ByteWriter::new();
    writer.write_varint(P::ID);
    packet.write(&mut writer);
    writer.into_inner()
}

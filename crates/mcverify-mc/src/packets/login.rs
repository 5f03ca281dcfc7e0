//! Login protocol packets.
//!
//! Only the packets needed to authenticate a player are modelled: the
//! client's hello and key response, and the server's encryption request
//! and disconnect.

use bytes::{Buf, Bytes};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::Result;
use crate::packets::traits::{Packet, ProtocolState, Readable, Writable};

/// Maximum server ID length.
const MAX_SERVER_ID_LENGTH: usize = 20;

/// Maximum disconnect reason length.
const MAX_DISCONNECT_REASON_LENGTH: usize = 262_144;

// =============================================================================
// Hello (Client -> Server, ID: 0x00)
// =============================================================================

/// Hello packet (client -> server).
///
/// Sent by the client to begin the login process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// The username the client claims.
    pub name: String,
    /// The profile UUID the client claims.
    pub profile_uuid: Uuid,
}

impl Hello {
    /// Create a new hello packet.
    #[must_use]
    pub fn new(name: impl Into<String>, profile_uuid: Uuid) -> Self {
        Self {
            name: name.into(),
            profile_uuid,
        }
    }
}

impl Packet for Hello {
    const ID: i32 = 0x00;
    const STATE: ProtocolState = ProtocolState::Login;
    const NAME: &'static str = "Hello";
}

impl Readable for Hello {
    fn read<B: Buf>(reader: &mut ByteReader<B>) -> Result<Self> {
        Ok(Self {
            name: reader.read_string()?,
            profile_uuid: reader.read_uuid()?,
        })
    }
}

impl Writable for Hello {
    fn write(&self, writer: &mut ByteWriter) {
        writer.write_utf8(&self.name);
        writer.write_uuid(self.profile_uuid);
    }
}

// =============================================================================
// Key (Client -> Server, ID: 0x01)
// =============================================================================

/// Key packet (client -> server).
///
/// Sent by the client in response to an encryption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// The shared secret, encrypted with the server's public key.
    pub encrypted_secret: Bytes,
    /// The challenge, encrypted with the server's public key.
    pub encrypted_challenge: Bytes,
}

impl Packet for Key {
    const ID: i32 = 0x01;
    const STATE: ProtocolState = ProtocolState::Login;
    const NAME: &'static str = "Key";
}

impl Readable for Key {
    fn read<B: Buf>(reader: &mut ByteReader<B>) -> Result<Self> {
        Ok(Self {
            encrypted_secret: reader.read_byte_array()?,
            encrypted_challenge: reader.read_byte_array()?,
        })
    }
}

impl Writable for Key {
    fn write(&self, writer: &mut ByteWriter) {
        writer.write_byte_array(&self.encrypted_secret);
        writer.write_byte_array(&self.encrypted_challenge);
    }
}

// =============================================================================
// EncryptionRequest (Server -> Client, ID: 0x01)
// =============================================================================

/// Encryption request packet (server -> client).
///
/// The server's hello: carries the public key and a random challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRequest {
    /// Server ID mixed into the session hash.
    pub server_id: String,
    /// The server's public key (DER-encoded).
    pub public_key: Bytes,
    /// Random challenge the client must echo back encrypted.
    pub challenge: Bytes,
    /// Whether the client should authenticate with Mojang (1.20.5+).
    pub should_authenticate: bool,
}

impl Packet for EncryptionRequest {
    const ID: i32 = 0x01;
    const STATE: ProtocolState = ProtocolState::Login;
    const NAME: &'static str = "EncryptionRequest";
}

impl Readable for EncryptionRequest {
    fn read<B: Buf>(reader: &mut ByteReader<B>) -> Result<Self> {
        Ok(Self {
            server_id: reader.read_utf8(MAX_SERVER_ID_LENGTH)?,
            public_key: reader.read_byte_array()?,
            challenge: reader.read_byte_array()?,
            should_authenticate: reader.read_bool()?,
        })
    }
}

impl Writable for EncryptionRequest {
    fn write(&self, writer: &mut ByteWriter) {
        writer.write_utf8(&self.server_id);
        writer.write_byte_array(&self.public_key);
        writer.write_byte_array(&self.challenge);
        writer.write_bool(self.should_authenticate);
    }
}

// =============================================================================
// Disconnect (Server -> Client, ID: 0x00)
// =============================================================================

/// Plain text chat component.
#[derive(Debug, Deserialize)]
struct TextComponent {
    text: String,
}

/// Disconnect packet (server -> client).
///
/// The message is sent as a `{"text": ...}` chat component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    /// The plain text disconnect reason.
    pub message: String,
}

impl Disconnect {
    /// Create a new disconnect packet with a plain text reason.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Packet for Disconnect {
    const ID: i32 = 0x00;
    const STATE: ProtocolState = ProtocolState::Login;
    const NAME: &'static str = "Disconnect";
}

impl Readable for Disconnect {
    fn read<B: Buf>(reader: &mut ByteReader<B>) -> Result<Self> {
        let reason = reader.read_utf8(MAX_DISCONNECT_REASON_LENGTH)?;

        // Anything that is not a plain text component is kept verbatim
        let message = match serde_json::from_str::<TextComponent>(&reason) {
            Ok(component) => component.text,
            Err(_) => reason,
        };

        Ok(Self { message })
    }
}

impl Writable for Disconnect {
    fn write(&self, writer: &mut ByteWriter) {
        let reason = json!({ "text": self.message });
        writer.write_utf8(&reason.to_string());
    }
}

//! Per-connection framing, packet dispatch and encryption.

use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use mcverify_mc::ProtocolError;
use mcverify_mc::codec::{ByteReader, frame, split_frame};
use mcverify_mc::packets::{Disconnect, Inbound, InboundPacket, OutboundPacket, ProtocolState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::cipher::PacketCipher;
use crate::crypto::{ServerKeys, SharedSecret};
use crate::error::Result;

/// Initial receive buffer capacity.
const READ_BUFFER_SIZE: usize = 4096;

/// A client connection going through the login handshake.
///
/// Starts in the handshake state without encryption. Receiving a `Key`
/// packet in the login state turns encryption on for both directions; it
/// stays on for the rest of the connection.
pub struct Connection<S> {
    stream: S,
    keys: Arc<ServerKeys>,
    state: ProtocolState,
    cipher: Option<PacketCipher>,
    /// Shared secret the cipher was derived from.
    secret: Option<SharedSecret>,
    /// Received bytes not yet parsed. Always plaintext.
    buffer: BytesMut,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream with a fresh, unencrypted connection in the handshake state.
    pub fn new(stream: S, keys: Arc<ServerKeys>) -> Self {
        Self {
            stream,
            keys,
            state: ProtocolState::Handshake,
            cipher: None,
            secret: None,
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }

    /// The current protocol state.
    pub const fn state(&self) -> ProtocolState {
        self.state
    }

    /// Switch the protocol state. Affects decoding of subsequent packets.
    pub fn switch_state(&mut self, state: ProtocolState) {
        debug!(from = ?self.state, to = ?state, "Switching protocol state");
        self.state = state;
    }

    /// Whether encryption has been enabled.
    pub const fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// The shared secret from the client's `Key` packet, once encryption is on.
    pub const fn shared_secret(&self) -> Option<&SharedSecret> {
        self.secret.as_ref()
    }

    /// Read the next packet.
    ///
    /// Packets with IDs unknown in the current state come back as
    /// [`InboundPacket::Unknown`] with their body skipped. A `Key` packet in
    /// the login state enables encryption before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, end of stream, malformed packets, or
    /// when the shared secret in a `Key` packet cannot be decrypted.
    pub async fn wait_for_packet(&mut self) -> Result<InboundPacket> {
        let body = self.read_frame().await?;
        let mut reader = ByteReader::new(body.freeze());
        let packet = InboundPacket::read(self.state, &mut reader)?;

        if reader.remaining() > 0 {
            debug!(
                packet = %packet,
                trailing = reader.remaining(),
                "Ignoring trailing bytes after packet"
            );
        }
        trace!(packet = %packet, state = ?self.state, "Received packet");

        if self.state == ProtocolState::Login {
            if let InboundPacket::Key(key) = &packet {
                let secret = self.keys.decrypt_secret(&key.encrypted_secret)?;
                self.enable_encryption(secret);
            }
        }

        Ok(packet)
    }

    /// Read the next packet and require it to be a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedPacket`] if another packet arrives,
    /// or any error from [`Connection::wait_for_packet`].
    ///
    /// # Panics
    ///
    /// In debug builds, if `T` does not belong to the current state.
    pub async fn expect_packet<T: Inbound>(&mut self) -> Result<T> {
        debug_assert_eq!(T::STATE, self.state, "{} expected in wrong state", T::NAME);

        let packet = self.wait_for_packet().await?;
        T::from_inbound(packet).map_err(|other| {
            ProtocolError::UnexpectedPacket {
                expected: T::NAME,
                actual: other.to_string(),
            }
            .into()
        })
    }

    /// Send a packet, encrypting it if encryption is on.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the stream fails.
    pub async fn send(&mut self, packet: impl Into<OutboundPacket>) -> Result<()> {
        let packet = packet.into();
        let mut bytes = frame(&packet.encode());

        if let Some(cipher) = &mut self.cipher {
            cipher.encrypt(&mut bytes);
        }

        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;

        trace!(id = packet.id(), len = bytes.len(), "Sent packet");
        Ok(())
    }

    /// Send a disconnect with `message` and close the write side.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the stream fails.
    pub async fn disconnect(&mut self, message: &str) -> Result<()> {
        debug!(message, "Disconnecting client");
        self.send(Disconnect::new(message)).await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    fn enable_encryption(&mut self, secret: SharedSecret) {
        let mut cipher = PacketCipher::new(&secret);
        // Bytes after the Key packet were already read as ciphertext
        cipher.decrypt(&mut self.buffer);
        self.cipher = Some(cipher);
        self.secret = Some(secret);
        debug!(buffered = self.buffer.len(), "Encryption enabled");
    }

    /// Read one complete frame, length prefix included.
    async fn read_frame(&mut self) -> Result<BytesMut> {
        loop {
            if let Some(frame) = split_frame(&mut self.buffer)? {
                return Ok(frame);
            }

            let start = self.buffer.len();
            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by client",
                )
                .into());
            }

            if let Some(cipher) = &mut self.cipher {
                cipher.decrypt(&mut self.buffer[start..]);
            }
        }
    }
}

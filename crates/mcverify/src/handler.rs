//! The login handshake that proves account ownership.
//!
//! One attempt runs these steps in order, over a single connection:
//!
//! 1. Read the intention; anything but a login is turned away.
//! 2. Read the client's hello to learn the claimed username.
//! 3. Send an encryption request with the public key and a fresh challenge.
//! 4. Read the key response, which turns on encryption, and check the
//!    challenge.
//! 5. Ask the session server whether the player joined with our server hash.
//! 6. Disconnect the client with the result.
//!
//! Every branch ends with exactly one disconnect message. Protocol, I/O and
//! crypto errors abort the attempt without one.

use std::sync::Arc;

use bytes::Bytes;
use mcverify_mc::packets::{EncryptionRequest, Hello, Intention, Key, NextState, ProtocolState};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::crypto::{CHALLENGE_SIZE, ServerKeys, generate_challenge, server_hash};
use crate::error::Result;
use crate::session::{GameProfile, SessionService};

/// Server ID sent in the encryption request and mixed into the server hash.
pub const SERVER_ID: &str = "camelot-mc-verify";

/// Sent when the intention is not a login.
pub const NOT_LOGIN_MESSAGE: &str = "Expected intention to be login";

/// Sent when the challenge does not decrypt to the value we sent.
pub const CHALLENGE_INVALID_MESSAGE: &str =
    "Challenge invalid. Contact server moderators for assistance";

/// Sent when the session server does not confirm the join.
pub const NOT_JOINED_MESSAGE: &str =
    "Failed to verify that you've connected to this server! Contact server moderators for assistance";

/// How an attempt ended. Each outcome has already been reported to the
/// client in a disconnect message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The client did not ask to log in.
    NotLogin {
        /// The intent the client sent.
        intent: i32,
    },
    /// The key response did not carry our challenge.
    ChallengeInvalid,
    /// The session server did not confirm the join.
    NotJoined {
        /// The username the client claimed.
        username: String,
    },
    /// The player owns the account.
    Verified {
        /// The profile confirmed by the session server.
        profile: GameProfile,
        /// The message the callback returned.
        message: String,
    },
}

impl Outcome {
    /// Whether account ownership was proven.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// Called once ownership of a profile is proven.
///
/// Receives the server address from the client's intention and the
/// verified profile, and returns the message to disconnect the client with.
pub trait VerificationCallback {
    fn on_verified(&self, server_address: &str, profile: &GameProfile) -> String;
}

impl<F> VerificationCallback for F
where
    F: Fn(&str, &GameProfile) -> String,
{
    fn on_verified(&self, server_address: &str, profile: &GameProfile) -> String {
        self(server_address, profile)
    }
}

/// Drives one verification attempt.
pub struct VerificationHandler<S, V, C> {
    connection: Connection<S>,
    keys: Arc<ServerKeys>,
    session: V,
    callback: C,
    challenge: [u8; CHALLENGE_SIZE],
}

impl<S, V, C> VerificationHandler<S, V, C>
where
    S: AsyncRead + AsyncWrite + Unpin,
    V: SessionService,
    C: VerificationCallback,
{
    /// Prepare an attempt over `stream` with a fresh challenge.
    pub fn new(stream: S, keys: Arc<ServerKeys>, session: V, callback: C) -> Self {
        Self {
            connection: Connection::new(stream, Arc::clone(&keys)),
            keys,
            session,
            callback,
            challenge: generate_challenge(),
        }
    }

    /// Run the attempt to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the client misbehaves at the protocol level, the
    /// connection fails, the shared secret cannot be decrypted, or the
    /// session server cannot be reached.
    pub async fn run(mut self) -> Result<Outcome> {
        let intention: Intention = self.connection.expect_packet().await?;
        debug!(
            protocol = intention.protocol_version,
            address = %intention.server_address.escape_debug(),
            port = intention.server_port,
            intent = intention.intent,
            "Received intention"
        );

        if intention.intent != NextState::Login as i32 {
            self.connection.disconnect(NOT_LOGIN_MESSAGE).await?;
            return Ok(Outcome::NotLogin {
                intent: intention.intent,
            });
        }

        self.connection.switch_state(ProtocolState::Login);

        let hello: Hello = self.connection.expect_packet().await?;
        debug!(username = %hello.name, uuid = %hello.profile_uuid, "Received hello");

        let public_key = self.keys.public_key_der();
        self.connection
            .send(EncryptionRequest {
                server_id: SERVER_ID.to_string(),
                public_key: public_key.clone(),
                challenge: Bytes::copy_from_slice(&self.challenge),
                should_authenticate: true,
            })
            .await?;

        let key: Key = self.connection.expect_packet().await?;
        if !self
            .keys
            .verify_challenge(&key.encrypted_challenge, &self.challenge)
        {
            warn!(username = %hello.name, "Challenge mismatch");
            self.connection.disconnect(CHALLENGE_INVALID_MESSAGE).await?;
            return Ok(Outcome::ChallengeInvalid);
        }

        // Receiving the key turned encryption on with the decrypted secret
        let secret = match self.connection.shared_secret() {
            Some(secret) => *secret,
            None => self.keys.decrypt_secret(&key.encrypted_secret)?,
        };
        let hash = server_hash(SERVER_ID, &public_key, &secret);

        let profile = match self.session.has_joined_server(&hello.name, &hash).await {
            Ok(profile) => profile,
            Err(e) => {
                if let Err(send_err) = self.connection.disconnect(NOT_JOINED_MESSAGE).await {
                    debug!(error = %send_err, "Failed to notify client of session error");
                }
                return Err(e.into());
            }
        };

        let Some(profile) = profile else {
            info!(username = %hello.name, "Session server did not confirm join");
            self.connection.disconnect(NOT_JOINED_MESSAGE).await?;
            return Ok(Outcome::NotJoined {
                username: hello.name,
            });
        };

        let message = self
            .callback
            .on_verified(&intention.server_address, &profile);
        info!(name = %profile.name, uuid = %profile.id, "Verified account ownership");

        self.connection.disconnect(&message).await?;
        Ok(Outcome::Verified { profile, message })
    }
}

/// Run one verification attempt over `stream`.
///
/// # Errors
///
/// See [`VerificationHandler::run`].
pub async fn verify<S, V, C>(
    stream: S,
    keys: Arc<ServerKeys>,
    session: V,
    callback: C,
) -> Result<Outcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
    V: SessionService,
    C: VerificationCallback,
{
    VerificationHandler::new(stream, keys, session, callback)
        .run()
        .await
}

//! Key exchange and session hashing for online-mode login.
//!
//! The server owns one RSA keypair for its whole lifetime. For each
//! attempt it sends the DER public key and a fresh challenge, then
//! decrypts the client's shared secret and challenge with the private key.
//! The shared secret is hashed together with the server ID and public key
//! into the "server hash" the session server recomputes on its side.

use std::fmt;

use bytes::Bytes;
use num_bigint::BigInt;
use rand::Rng;
use rsa::pkcs8::EncodePublicKey;
use rsa::rand_core::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};

use crate::error::CryptoError;

/// RSA key size in bits. Vanilla clients expect 1024.
pub const RSA_KEY_SIZE: usize = 1024;

/// Challenge size in bytes.
pub const CHALLENGE_SIZE: usize = 4;

/// Shared secret size in bytes (AES-128).
pub const SHARED_SECRET_SIZE: usize = 16;

/// The symmetric key agreed with the client.
pub type SharedSecret = [u8; SHARED_SECRET_SIZE];

/// The server's RSA keypair.
///
/// Read-only after construction; share it across attempts behind an `Arc`.
pub struct ServerKeys {
    private_key: RsaPrivateKey,
    /// Public key, DER-encoded as `SubjectPublicKeyInfo`.
    public_key_der: Bytes,
}

impl ServerKeys {
    /// Generate a new 1024-bit keypair.
    ///
    /// # Errors
    ///
    /// Returns an error if RSA key generation fails.
    pub fn generate() -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_SIZE)?;
        Self::from_private_key(private_key)
    }

    /// Wrap an existing private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be DER-encoded.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, CryptoError> {
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_der = public_key.to_public_key_der()?.into_vec();

        Ok(Self {
            private_key,
            public_key_der: Bytes::from(public_key_der),
        })
    }

    /// Get the DER-encoded public key.
    #[must_use]
    pub fn public_key_der(&self) -> Bytes {
        self.public_key_der.clone()
    }

    /// Get the public half of the keypair.
    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.private_key)
    }

    /// Decrypt the client's shared secret.
    ///
    /// # Errors
    ///
    /// Returns an error if decryption fails or the secret is not 16 bytes.
    pub fn decrypt_secret(&self, encrypted_secret: &[u8]) -> Result<SharedSecret, CryptoError> {
        let secret = self
            .private_key
            .decrypt(Pkcs1v15Encrypt, encrypted_secret)?;

        secret
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSecretLength(secret.len()))
    }

    /// Check that the encrypted challenge decrypts to `expected`.
    ///
    /// Any decryption failure counts as a mismatch.
    #[must_use]
    pub fn verify_challenge(&self, encrypted_challenge: &[u8], expected: &[u8]) -> bool {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, encrypted_challenge)
            .is_ok_and(|decrypted| decrypted == expected)
    }
}

impl fmt::Debug for ServerKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerKeys")
            .field("public_key_der", &format_args!("{} bytes", self.public_key_der.len()))
            .finish_non_exhaustive()
    }
}

/// Generate a random challenge for one attempt.
#[must_use]
pub fn generate_challenge() -> [u8; CHALLENGE_SIZE] {
    let mut challenge = [0u8; CHALLENGE_SIZE];
    rand::rng().fill(&mut challenge);
    challenge
}

/// Calculate the server hash sent to the session server.
///
/// The hash is `SHA1(server_id + shared_secret + public_key)`, with the
/// server ID encoded as ISO-8859-1, formatted as a signed hex string.
#[must_use]
pub fn server_hash(server_id: &str, public_key_der: &[u8], shared_secret: &[u8]) -> String {
    let mut hasher = Sha1::new();

    hasher.update(latin1(server_id));
    hasher.update(shared_secret);
    hasher.update(public_key_der);

    minecraft_hex_digest(&hasher.finalize())
}

/// Encode as ISO-8859-1, replacing unmappable characters with `?`.
fn latin1(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Convert a SHA1 hash to Minecraft's signed hex digest format.
///
/// The hash is treated as a two's complement signed number and printed
/// in hex without leading zeros.
fn minecraft_hex_digest(hash: &[u8]) -> String {
    let bigint = BigInt::from_signed_bytes_be(hash);
    format!("{bigint:x}")
}

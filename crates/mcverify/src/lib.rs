//! Minecraft account ownership verification.
//!
//! Runs the server side of the online-mode login handshake, far enough to
//! prove that a client owns the account it logs in with, and then turns the
//! client away with a message.
//!
//! ```ignore
//! let keys = Arc::new(ServerKeys::generate()?);
//! let outcome = verify(stream, keys, MojangSessionService::new(), |address: &str, profile: &GameProfile| {
//!     format!("Verified {} via {address}", profile.name)
//! })
//! .await?;
//! ```

pub mod cipher;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod handler;
pub mod session;

pub use cipher::PacketCipher;
pub use connection::Connection;
pub use crypto::ServerKeys;
pub use error::{CryptoError, SessionError, VerifyError};
pub use handler::{Outcome, SERVER_ID, VerificationCallback, VerificationHandler, verify};
pub use session::{GameProfile, MojangSessionService, ProfileProperty, SessionService};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, LazyLock};

    use crate::crypto::ServerKeys;

    /// Key generation is slow in debug builds; share one pair per test binary.
    pub static KEYS: LazyLock<Arc<ServerKeys>> =
        LazyLock::new(|| Arc::new(ServerKeys::generate().unwrap()));

    /// A second, unrelated key pair.
    pub static OTHER_KEYS: LazyLock<ServerKeys> =
        LazyLock::new(|| ServerKeys::generate().unwrap());
}

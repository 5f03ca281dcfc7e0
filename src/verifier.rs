//! Resolves a verified profile to the pending verification it completes.

use std::sync::Arc;

use mcverify::{GameProfile, VerificationCallback};
use tracing::{info, warn};

use crate::address::JoinAddress;
use crate::store::VerificationStore;

/// Sent when the client did not connect through a join address.
pub const ADDRESS_INCOMPATIBLE_MESSAGE: &str =
    "Server address incompatible. Contact server moderators for assistance";

/// Completes pending verifications by the token in the join address.
#[derive(Clone)]
pub struct TokenVerifier {
    store: Arc<VerificationStore>,
    address: Arc<JoinAddress>,
}

impl TokenVerifier {
    pub const fn new(store: Arc<VerificationStore>, address: Arc<JoinAddress>) -> Self {
        Self { store, address }
    }
}

impl VerificationCallback for TokenVerifier {
    fn on_verified(&self, server_address: &str, profile: &GameProfile) -> String {
        let Some(token) = self.address.token_from(server_address) else {
            warn!(address = %server_address.escape_debug(), "Join address does not match");
            return ADDRESS_INCOMPATIBLE_MESSAGE.to_string();
        };

        let Some(account) = self.store.complete(&token, profile.clone()) else {
            warn!(token = %token, "Unknown verification token");
            return format!("Unknown verification token ({token}). Verification may no longer be needed");
        };

        info!(
            guild = account.guild,
            user = account.user,
            name = %profile.name,
            uuid = %profile.id,
            "Verification completed"
        );

        format!(
            "Ownership for §6@{}§r verified as §b{}§r\nYou have been unmuted and may return to the server",
            account.user_name, profile.name
        )
    }
}

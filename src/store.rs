//! In-memory store of pending and completed verifications.

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mcverify::GameProfile;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

/// Characters a join token is made of.
const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Join token length.
pub const TOKEN_LENGTH: usize = 8;

/// Completed verifications kept for `GET /verified`. Older ones are dropped.
pub const VERIFIED_HISTORY: usize = 1024;

/// A Discord member who still has to prove account ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingVerification {
    pub token: String,
    pub guild: u64,
    pub user: u64,
    pub user_name: String,
    /// Deadline in seconds since the Unix epoch.
    pub expires_at: u64,
}

/// A completed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedAccount {
    pub guild: u64,
    pub user: u64,
    pub user_name: String,
    pub profile: GameProfile,
    /// Completion time in seconds since the Unix epoch.
    pub verified_at: u64,
}

/// Thread-safe store of verifications, keyed by join token.
pub struct VerificationStore {
    window: Duration,
    history: usize,
    pending: RwLock<HashMap<String, PendingVerification>>,
    verified: RwLock<VecDeque<VerifiedAccount>>,
}

impl VerificationStore {
    /// Create an empty store whose entries stay valid for `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self::with_history(window, VERIFIED_HISTORY)
    }

    /// Create an empty store that remembers at most `history` completed
    /// verifications.
    #[must_use]
    pub fn with_history(window: Duration, history: usize) -> Self {
        Self {
            window,
            history,
            pending: RwLock::new(HashMap::new()),
            verified: RwLock::new(VecDeque::new()),
        }
    }

    /// Start a verification for a member.
    ///
    /// A member already pending in the same guild gets a new token and a
    /// new deadline.
    pub fn create(&self, guild: u64, user: u64, user_name: impl Into<String>) -> PendingVerification {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, p| !(p.guild == guild && p.user == user));

        let token = loop {
            let token = generate_token();
            if !pending.contains_key(&token) {
                break token;
            }
        };

        let verification = PendingVerification {
            token: token.clone(),
            guild,
            user,
            user_name: user_name.into(),
            expires_at: unix_now() + self.window.as_secs(),
        };
        pending.insert(token, verification.clone());
        drop(pending);

        info!(
            guild,
            user,
            token = %verification.token,
            "Verification started"
        );

        verification
    }

    /// List pending verifications, oldest deadline first.
    pub fn list(&self) -> Vec<PendingVerification> {
        let mut list: Vec<_> = self
            .pending
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        list.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.token.cmp(&b.token)));
        list
    }

    /// Look up a pending verification by token.
    pub fn get(&self, token: &str) -> Option<PendingVerification> {
        self.pending
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    /// Cancel a pending verification.
    /// Returns the removed entry, or `None` if not found.
    pub fn cancel(&self, token: &str) -> Option<PendingVerification> {
        self.pending
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
    }

    /// Complete the verification for `token` with a proven profile.
    /// Returns `None` if no verification is pending for the token.
    pub fn complete(&self, token: &str, profile: GameProfile) -> Option<VerifiedAccount> {
        let pending = self.cancel(token)?;

        let account = VerifiedAccount {
            guild: pending.guild,
            user: pending.user,
            user_name: pending.user_name,
            profile,
            verified_at: unix_now(),
        };
        let mut verified = self.verified.write().unwrap_or_else(PoisonError::into_inner);
        verified.push_back(account.clone());
        while verified.len() > self.history {
            verified.pop_front();
        }
        drop(verified);

        Some(account)
    }

    /// List the most recent completed verifications, in completion order.
    pub fn verified(&self) -> Vec<VerifiedAccount> {
        self.verified
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Remove verifications past their deadline.
    /// Returns the removed entries.
    pub fn cleanup_expired(&self) -> Vec<PendingVerification> {
        self.cleanup_expired_at(unix_now())
    }

    fn cleanup_expired_at(&self, now: u64) -> Vec<PendingVerification> {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);

        let expired: Vec<String> = pending
            .iter()
            .filter(|(_, p)| p.expires_at <= now)
            .map(|(token, _)| token.clone())
            .collect();

        let removed: Vec<_> = expired
            .iter()
            .filter_map(|token| pending.remove(token))
            .collect();
        drop(pending);

        for p in &removed {
            warn!(guild = p.guild, user = p.user, token = %p.token, "Verification expired");
        }

        removed
    }
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_LENGTH)
        .map(|_| char::from(TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())]))
        .collect()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

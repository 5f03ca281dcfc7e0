//! Join addresses that carry a verification token in the hostname.
//!
//! Each pending verification gets its own address, such as
//! `k3y5t0k3.verify.example.com:25565`. The client sends the hostname it
//! connected to in its intention, which is how the token comes back to us.

use thiserror::Error;

/// Placeholder for the token in the address template.
pub const TOKEN_PLACEHOLDER: &str = "<token>";

/// A parsed join address template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAddress {
    template: String,
    /// Lowercased host before the token.
    prefix: String,
    /// Lowercased host after the token, port excluded.
    suffix: String,
}

/// The template has no `<token>` in its host part.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("join address '{0}' must contain <token> in its host")]
pub struct MissingTokenError(String);

impl JoinAddress {
    /// Parse a template such as `<token>.verify.example.com:25565`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host part does not contain `<token>`.
    pub fn parse(template: &str) -> Result<Self, MissingTokenError> {
        let host = template.split(':').next().unwrap_or_default();
        let (prefix, suffix) = host
            .split_once(TOKEN_PLACEHOLDER)
            .ok_or_else(|| MissingTokenError(template.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            prefix: prefix.to_ascii_lowercase(),
            suffix: suffix.to_ascii_lowercase(),
        })
    }

    /// The address a player joins to present `token`.
    #[must_use]
    pub fn for_token(&self, token: &str) -> String {
        self.template.replace(TOKEN_PLACEHOLDER, token)
    }

    /// Extract the token from the server address a client connected to.
    ///
    /// Anything from the first NUL on is ignored (modded clients append
    /// markers there), as is a trailing dot. Matching is case-insensitive.
    #[must_use]
    pub fn token_from(&self, server_address: &str) -> Option<String> {
        let host = server_address
            .split_once('\0')
            .map_or(server_address, |(host, _)| host);
        let host = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();

        let token = host
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;

        let valid = !token.is_empty()
            && token
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());

        valid.then(|| token.to_string())
    }
}

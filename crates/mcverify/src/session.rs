//! Session server lookups.
//!
//! After the key exchange, the server asks the session server whether the
//! player joined with the computed server hash. A profile in the answer
//! proves the player owns the account.

use std::future::Future;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Default `hasJoined` endpoint of Mojang's session server.
pub const SESSION_SERVER_URL: &str = "https://sessionserver.mojang.com/session/minecraft/hasJoined";

/// A verified Minecraft profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProfile {
    /// Player UUID.
    pub id: Uuid,
    /// Player username, as spelled by the session server.
    pub name: String,
    /// Profile properties (e.g., skin textures).
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

/// A signed profile property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Checks whether a player has joined a server session.
pub trait SessionService {
    /// Look up the player's session for `server_hash`.
    ///
    /// Returns `Ok(None)` when the session server does not know about the
    /// join.
    fn has_joined_server(
        &self,
        username: &str,
        server_hash: &str,
    ) -> impl Future<Output = Result<Option<GameProfile>, SessionError>> + Send;
}

impl<T: SessionService> SessionService for Arc<T> {
    fn has_joined_server(
        &self,
        username: &str,
        server_hash: &str,
    ) -> impl Future<Output = Result<Option<GameProfile>, SessionError>> + Send {
        (**self).has_joined_server(username, server_hash)
    }
}

/// Response from the `hasJoined` endpoint. The ID comes without hyphens.
#[derive(Debug, Deserialize)]
struct HasJoinedResponse {
    id: String,
    name: String,
    #[serde(default)]
    properties: Vec<ProfileProperty>,
}

impl TryFrom<HasJoinedResponse> for GameProfile {
    type Error = SessionError;

    fn try_from(response: HasJoinedResponse) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&response.id)
            .map_err(|e| SessionError::InvalidProfile(format!("bad id {:?}: {e}", response.id)))?;

        Ok(Self {
            id,
            name: response.name,
            properties: response.properties,
        })
    }
}

/// Parse a `hasJoined` response body. An empty body means not joined.
///
/// # Errors
///
/// Returns an error if the body is not a valid profile.
pub fn parse_has_joined(body: &[u8]) -> Result<Option<GameProfile>, SessionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let response: HasJoinedResponse = serde_json::from_slice(body)?;
    GameProfile::try_from(response).map(Some)
}

/// [`SessionService`] backed by Mojang's session server.
#[derive(Debug, Clone)]
pub struct MojangSessionService {
    client: Client,
    url: String,
}

impl Default for MojangSessionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MojangSessionService {
    /// Create a client for Mojang's public session server.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(SESSION_SERVER_URL)
    }

    /// Create a client for a compatible session server at `url`.
    #[must_use]
    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// The `hasJoined` endpoint in use.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SessionService for MojangSessionService {
    async fn has_joined_server(
        &self,
        username: &str,
        server_hash: &str,
    ) -> Result<Option<GameProfile>, SessionError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("username", username), ("serverId", server_hash)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SessionError::Status(status));
        }

        let body = response.bytes().await?;
        parse_has_joined(&body)
    }
}

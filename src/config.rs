//! Server configuration from environment variables.

use std::time::Duration;

use mcverify::session::SESSION_SERVER_URL;

use crate::utils::{EnvError, env_bool, env_string, env_u64};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minecraft listener address, `None` when disabled.
    pub listen_addr: Option<String>,
    pub api_addr: String,
    pub api_enabled: bool,
    /// Join address template containing `<token>`.
    pub verify_address: String,
    /// Deadline for one verification attempt, `None` for no deadline.
    pub verify_timeout: Option<Duration>,
    /// How long a pending verification stays valid.
    pub verify_window: Duration,
    pub cleanup_interval: Duration,
    pub session_server_url: String,
}

impl Config {
    /// Load the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an invalid value.
    pub fn from_env() -> Result<Self, EnvError> {
        let listen_addr = env_string("ADDR", "0.0.0.0:25565")?;
        let timeout = env_u64("VERIFY_TIMEOUT_SECS", 30)?;
        let cleanup_interval = env_u64("CLEANUP_INTERVAL_SECS", 60)?;

        if cleanup_interval == 0 {
            return Err("CLEANUP_INTERVAL_SECS: must be greater than 0".into());
        }

        Ok(Self {
            listen_addr: listener_addr(&listen_addr).map(str::to_string),
            api_addr: env_string("API_ADDR", "127.0.0.1:8080")?,
            api_enabled: env_bool("API_ENABLED", true)?,
            verify_address: env_string("VERIFY_ADDRESS", "<token>.verify.localhost:25565")?,
            verify_timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            verify_window: Duration::from_secs(env_u64("VERIFY_WINDOW_SECS", 3600)?),
            cleanup_interval: Duration::from_secs(cleanup_interval),
            session_server_url: env_string("SESSION_SERVER_URL", SESSION_SERVER_URL)?,
        })
    }
}

/// The address to listen on, or `None` if the listener is disabled by an
/// empty address or port 0.
fn listener_addr(addr: &str) -> Option<&str> {
    let addr = addr.trim();
    if addr.is_empty() {
        return None;
    }

    match addr.rsplit_once(':') {
        Some((_, "0")) => None,
        _ => Some(addr),
    }
}

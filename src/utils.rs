//! Helpers for reading configuration from the environment.

use std::env;
use std::str::FromStr;

/// Error type for environment variable parsing.
pub type EnvError = Box<dyn std::error::Error + Send + Sync>;

/// Read an environment variable, `None` if unset.
fn env_var(name: &str) -> Result<Option<String>, EnvError> {
    match env::var(name) {
        Ok(v) => Ok(Some(v)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{name}: {e}").into()),
    }
}

/// Parse an environment variable as a boolean, with a default value.
///
/// Valid values (case-insensitive): "true", "1", "false", "0".
/// Returns an error for any other value to prevent misconfiguration.
///
/// # Errors
///
/// Returns an error if the environment variable is set to an invalid value,
/// or if the value contains invalid Unicode.
pub fn env_bool(name: &str, default: bool) -> Result<bool, EnvError> {
    let Some(value) = env_var(name)? else {
        return Ok(default);
    };

    match value.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!(
            "{name}: invalid value '{value}' (expected 'true', 'false', '1', or '0')"
        )
        .into()),
    }
}

/// Parse an environment variable as an unsigned integer, with a default value.
///
/// # Errors
///
/// Returns an error if the variable is set but is not a valid number.
pub fn env_u64(name: &str, default: u64) -> Result<u64, EnvError> {
    env_parse(name, default)
}

/// Read an environment variable as a string, with a default value.
///
/// An empty value is returned as is; callers decide what it means.
///
/// # Errors
///
/// Returns an error if the value contains invalid Unicode.
pub fn env_string(name: &str, default: &str) -> Result<String, EnvError> {
    Ok(env_var(name)?.unwrap_or_else(|| default.to_string()))
}

fn env_parse<T>(name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = env_var(name)? else {
        return Ok(default);
    };

    value
        .trim()
        .parse()
        .map_err(|e| format!("{name}: invalid value '{value}' ({e})").into())
}

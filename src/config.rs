//! Environment-backed configuration.
//!
//! The only required secret is the weather provider API key. Resolving it is
//! the first thing a networked pipeline run does, so a missing credential
//! fails before any request is issued or any store file is touched.

use thiserror::Error;

/// Environment variable holding the weather provider API key.
pub const WEATHER_KEY_VAR: &str = "VISUAL_CROSSING_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to find {0} in .env or environment")]
    MissingVar(&'static str),
}

/// Credentials for the external weather provider.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_key: String,
}

impl WeatherConfig {
    /// Loads `.env` (if present) and reads [`WEATHER_KEY_VAR`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when the variable is absent or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let api_key =
            std::env::var(WEATHER_KEY_VAR).map_err(|_| ConfigError::MissingVar(WEATHER_KEY_VAR))?;
        if api_key.is_empty() {
            return Err(ConfigError::MissingVar(WEATHER_KEY_VAR));
        }
        Ok(Self { api_key })
    }
}

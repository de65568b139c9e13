//! Cart engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional and fall back to defaults:
//! - `CART_MAX_PER_ITEM` - Maximum units of one product per cart (default: 10)
//! - `CART_LOCK_WAIT_MS` - Bounded wait for a cart's mutation lock before
//!   giving up with an infrastructure error (default: 5000)
//! - `CART_CATALOG_CACHE_TTL_SECS` - TTL for the optional catalog read cache
//!   (default: 60)

use std::time::Duration;

use thiserror::Error;

const DEFAULT_MAX_PER_ITEM: u32 = 10;
const DEFAULT_LOCK_WAIT_MS: u64 = 5000;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Maximum units of a single product allowed in one cart.
    pub max_per_item: u32,
    /// How long a mutating operation waits for the cart's lock.
    pub lock_wait: Duration,
    /// TTL for the optional catalog read-through cache.
    pub catalog_cache_ttl: Duration,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            max_per_item: DEFAULT_MAX_PER_ITEM,
            lock_wait: Duration::from_millis(DEFAULT_LOCK_WAIT_MS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but does not parse, or
    /// if `CART_MAX_PER_ITEM` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let max_per_item = parse_env_or("CART_MAX_PER_ITEM", DEFAULT_MAX_PER_ITEM)?;
        if max_per_item == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CART_MAX_PER_ITEM".to_owned(),
                "must be at least 1".to_owned(),
            ));
        }

        let lock_wait_ms: u64 = parse_env_or("CART_LOCK_WAIT_MS", DEFAULT_LOCK_WAIT_MS)?;
        let cache_ttl_secs: u64 =
            parse_env_or("CART_CATALOG_CACHE_TTL_SECS", DEFAULT_CATALOG_CACHE_TTL_SECS)?;

        Ok(Self {
            max_per_item,
            lock_wait: Duration::from_millis(lock_wait_ms),
            catalog_cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CartConfig::default();
        assert_eq!(config.max_per_item, 10);
        assert_eq!(config.lock_wait, Duration::from_millis(5000));
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(60));
    }
}

use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use log::info;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub media_root: PathBuf,
    pub media_url: String,
    pub public_url: String,
    pub jwt_secret: String,
    pub session_lifetime_hours: i64,
    pub ingredients_file: PathBuf,
}

impl Config {
    /// Reads the configuration from the environment. Call `dotenv` first to pick up a
    /// `.env` file.
    pub fn load() -> Result<Self, ConfigError> {
        let session_lifetime_hours: i64 = try_load("SESSION_LIFETIME_HOURS", "24")?;
        if !(1..=24 * 365).contains(&session_lifetime_hours) {
            return Err(ConfigError::Invalid {
                key: String::from("SESSION_LIFETIME_HOURS"),
                info: String::from("must be between 1 and 8760"),
            });
        }

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "10")?,
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:8000")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
            media_url: try_load("MEDIA_URL", "/media/")?,
            public_url: try_load::<String>("PUBLIC_URL", "http://localhost:8000")?
                .trim_end_matches('/')
                .to_string(),
            jwt_secret: require("JWT_SECRET")?,
            session_lifetime_hours,
            ingredients_file: try_load("INGREDIENTS_FILE", "data/ingredients.json")?,
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            info: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_unset_keys() {
        let port: SocketAddr = try_load("FOODGRAM_TEST_UNSET_ADDR", "127.0.0.1:9000").unwrap();
        assert_eq!(port.port(), 9000);
    }

    #[test]
    fn malformed_values_are_errors() {
        let result: Result<u32, ConfigError> = try_load("FOODGRAM_TEST_UNSET_NUMBER", "many");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn required_keys_must_be_set() {
        assert!(matches!(
            require("FOODGRAM_TEST_UNSET_SECRET"),
            Err(ConfigError::Missing(_))
        ));
    }
}

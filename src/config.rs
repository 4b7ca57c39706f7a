use std::sync::Arc;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use service::{DefaultPasswordPolicy, IdentityConfig, JwtIdentityProvider, PasswordPolicyConfig};
use tracing::{debug, info, warn};

use crate::schemas::AppState;

/// Configuration file looked up in the working directory, any supported extension.
const CONFIG_FILE: &str = "movie-reviews";
const ENV_PREFIX: &str = "MOVIE_REVIEWS";

/// Runtime settings.
///
/// Sources, later ones winning: built-in defaults, an optional
/// `movie-reviews.{toml,yaml,json}` file, then `MOVIE_REVIEWS__*` environment
/// variables (`MOVIE_REVIEWS__IDENTITY__JWT_SECRET` sets `identity.jwt_secret`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub identity: IdentityConfig,
    pub password: PasswordPolicyConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://movie_reviews.db?mode=rwc".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            identity: IdentityConfig::default(),
            password: PasswordPolicyConfig::default(),
        }
    }
}

/// Load settings from `.env`, the optional config file and the environment.
pub fn load_settings() -> Result<Settings> {
    dotenvy::dotenv().ok();

    let settings: Settings = Config::builder()
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;

    if settings.identity.jwt_secret == IdentityConfig::default().jwt_secret {
        warn!("Using the built-in JWT secret; set MOVIE_REVIEWS__IDENTITY__JWT_SECRET in production");
    }
    debug!(
        access_ttl = settings.identity.access_token_ttl_secs,
        refresh_ttl = settings.identity.refresh_token_ttl_secs,
        min_password_length = settings.password.min_length,
        "Configuration loaded"
    );
    Ok(settings)
}

/// Build the handler state around an existing connection.
pub fn build_app_state(db: DatabaseConnection, settings: &Settings) -> Result<AppState> {
    let identity = JwtIdentityProvider::new(&settings.identity).context("Invalid identity configuration")?;
    Ok(AppState {
        db,
        identity: Arc::new(identity),
        password_policy: Arc::new(DefaultPasswordPolicy::new(settings.password.clone())),
    })
}

/// Connect to the configured database and build the handler state.
pub async fn initialize_app_state(settings: &Settings) -> Result<AppState> {
    info!("Connecting to database: {}", settings.database_url);
    let db = Database::connect(&settings.database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", settings.database_url))?;
    build_app_state(db, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bind_address, "0.0.0.0:3000");
        assert_eq!(settings.password.min_length, 8);
        assert_eq!(settings.identity.access_token_ttl_secs, 300);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                "bind_address = \"127.0.0.1:8080\"\n[password]\nmin_length = 12\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.bind_address, "127.0.0.1:8080");
        assert_eq!(settings.password.min_length, 12);
        assert!(settings.password.check_user_attributes);
        assert_eq!(settings.database_url, Settings::default().database_url);
    }
}

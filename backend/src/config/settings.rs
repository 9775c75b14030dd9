use std::env;
use std::path::PathBuf;

/// localStorage-sized budget for the local config store.
pub const DEFAULT_LOCAL_STORE_CAPACITY: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AdminCredentials {
    pub email: String,
    pub password_hash: String,
}

#[derive(Clone, Debug)]
pub struct RemoteConfigSettings {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub jwt_secret: String,
    pub admin: AdminCredentials,
    pub database_url: String,
    pub config_store_dir: PathBuf,
    pub local_store_capacity: usize,
    pub remote_config: Option<RemoteConfigSettings>,
    pub openrouter_api_key: Option<String>,
    pub text_model: String,
    pub bind_addr: String,
    pub frontend_url: Option<String>,
    pub sentry_dsn: Option<String>,
}

fn required(name: &'static str) -> Result<String, SettingsError> {
    optional(name).ok_or(SettingsError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let local_store_capacity = match optional("LOCAL_STORE_CAPACITY_BYTES") {
            Some(value) => value.parse().map_err(|_| SettingsError::Invalid {
                name: "LOCAL_STORE_CAPACITY_BYTES",
                value,
            })?,
            None => DEFAULT_LOCAL_STORE_CAPACITY,
        };

        let remote_config = optional("REMOTE_CONFIG_URL").map(|url| RemoteConfigSettings {
            url,
            api_key: optional("REMOTE_CONFIG_KEY"),
        });

        Ok(Self {
            jwt_secret: required("JWT_SECRET_KEY")?,
            admin: AdminCredentials {
                email: required("ADMIN_EMAIL")?,
                password_hash: required("ADMIN_PASSWORD_HASH")?,
            },
            database_url: optional("DATABASE_URL").unwrap_or_else(|| "database.db".to_string()),
            config_store_dir: PathBuf::from(optional("CONFIG_STORE_DIR").unwrap_or_else(|| "data".to_string())),
            local_store_capacity,
            remote_config,
            openrouter_api_key: optional("OPENROUTER_API_KEY"),
            text_model: optional("TEXT_MODEL").unwrap_or_else(|| "openai/gpt-4o-mini".to_string()),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string()),
            frontend_url: optional("FRONTEND_URL"),
            sentry_dsn: optional("SENTRY_DSN"),
        })
    }
}

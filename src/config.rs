//! Process configuration.
//!
//! Everything the server reads from the environment is parsed here once, at
//! startup, and handed to the rest of the crate as a typed value.

use std::{collections::HashMap, net::SocketAddr, path::PathBuf, time::Duration};

use bcrypt::DEFAULT_COST;
use thiserror::Error;

use crate::db::DbConfig;

/// Password used when neither `ADMIN_PASSWORD_HASH` nor `ADMIN_PASSWORD` is set.
/// Only accepted outside production.
pub const DEV_ADMIN_PASSWORD: &str = "password123";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("{0}")]
    Insecure(String),

    #[error("failed to hash admin password: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    /// bcrypt hash of the admin password.
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl: Duration,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct ObjectStorageConfig {
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    /// Set when the process runs somewhere without a durable local disk.
    pub serverless: bool,
    pub object_storage: Option<ObjectStorageConfig>,
}

#[derive(Debug, Clone)]
pub struct ResumeConfig {
    pub path: PathBuf,
    pub download_name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub database: Option<DbConfig>,
    pub content_file: PathBuf,
    pub seed_on_startup: bool,
    pub admin: AdminConfig,
    pub session: SessionConfig,
    pub login_limit: RateLimitConfig,
    pub contact_limit: RateLimitConfig,
    pub uploads: UploadConfig,
    pub resume: ResumeConfig,
    pub trust_proxy: bool,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("ENVIRONMENT").or_else(|| get("NODE_ENV")).as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        };

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&get, "PORT", 5000)?;
        let bind_addr: SocketAddr =
            format!("{}:{}", host, port)
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    key: "HOST",
                    value: host.clone(),
                })?;

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DbConfig {
                url,
                max_connections: parse_or(&get, "DB_POOL_MAX", 10)?,
                min_connections: parse_or(&get, "DB_POOL_MIN", 2)?,
                connect_timeout_secs: parse_or(&get, "DB_CONNECT_TIMEOUT", 10)?,
                idle_timeout_secs: parse_or(&get, "DB_IDLE_TIMEOUT", 300)?,
            }),
            None => None,
        };

        let serverless = get("VERCEL").is_some() || get("SERVERLESS").is_some();

        let object_storage = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_key)) => Some(ObjectStorageConfig {
                url: url.trim_end_matches('/').to_string(),
                service_key,
                bucket: get("SUPABASE_STORAGE_BUCKET").unwrap_or_else(|| "uploads".to_string()),
            }),
            _ => None,
        };

        let admin = AdminConfig {
            username: get("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            password_hash: admin_password_hash(&get, environment)?,
        };

        let session = SessionConfig {
            cookie_name: get("SESSION_COOKIE_NAME").unwrap_or_else(|| "portfolio.sid".to_string()),
            ttl: duration_from(&get, "SESSION_TTL_HOURS", 24, 3600)?,
            secure_cookie: environment.is_production(),
        };

        let login_limit = RateLimitConfig {
            max_attempts: parse_or(&get, "LOGIN_RATE_LIMIT_MAX", 10)?,
            window: duration_from(&get, "LOGIN_RATE_LIMIT_WINDOW_MINS", 15, 60)?,
        };

        let contact_limit = RateLimitConfig {
            max_attempts: parse_or(&get, "CONTACT_RATE_LIMIT_MAX", 5)?,
            window: duration_from(&get, "CONTACT_RATE_LIMIT_WINDOW_MINS", 60, 60)?,
        };

        let trust_proxy = match get("TRUST_PROXY") {
            Some(value) => parse_bool("TRUST_PROXY", &value)?,
            None => environment.is_production() || serverless,
        };

        let seed_on_startup = match get("SEED_CONTENT") {
            Some(value) => parse_bool("SEED_CONTENT", &value)?,
            None => true,
        };

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .or_else(|| get("FRONTEND_ORIGIN").map(|o| vec![o]))
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:5000".to_string(),
                ]
            });

        Ok(Config {
            environment,
            bind_addr,
            database,
            content_file: get("CONTENT_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/content.json")),
            seed_on_startup,
            admin,
            session,
            login_limit,
            contact_limit,
            uploads: UploadConfig {
                dir: get("UPLOADS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("public/uploads")),
                serverless,
                object_storage,
            },
            resume: ResumeConfig {
                path: get("RESUME_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("attached_assets/resume.pdf")),
                download_name: get("RESUME_DOWNLOAD_NAME")
                    .unwrap_or_else(|| "resume.pdf".to_string()),
            },
            trust_proxy,
            allowed_origins,
        })
    }

    /// Convenience for tests and tools: build from a fixed map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }
}

fn admin_password_hash<F>(get: &F, environment: Environment) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(hash) = get("ADMIN_PASSWORD_HASH") {
        if !hash.starts_with("$2") {
            return Err(ConfigError::Invalid {
                key: "ADMIN_PASSWORD_HASH",
                value: "expected a bcrypt hash (see the hash-password binary)".to_string(),
            });
        }
        return Ok(hash);
    }

    if let Some(plain) = get("ADMIN_PASSWORD") {
        return Ok(bcrypt::hash(plain, DEFAULT_COST)?);
    }

    if environment.is_production() {
        return Err(ConfigError::Insecure(
            "ADMIN_PASSWORD_HASH or ADMIN_PASSWORD must be set in production".to_string(),
        ));
    }

    tracing::warn!(
        "SECURITY: neither ADMIN_PASSWORD_HASH nor ADMIN_PASSWORD is set; \
         using the development default password"
    );
    Ok(bcrypt::hash(DEV_ADMIN_PASSWORD, DEFAULT_COST)?)
}

/// `key` read as a count of `unit_secs`-long units.
fn duration_from(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
    unit_secs: u64,
) -> Result<Duration, ConfigError> {
    let count: u64 = parse_or(get, key, default)?;
    count
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: count.to_string(),
        })
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

// Runtime configuration
// Read once at startup from the process environment (and `.env`, if present)

use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SECRET_KEY: &str = "your-secret-key-change-this-in-production";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "https://mongolian-stocks-frontend.onrender.com",
    "https://stck-frontend.onrender.com",
];

#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database file
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Mixed into stored session token digests. Rotating it logs everyone out.
    pub secret_key: String,
    /// Seeded into `users` with the admin role when missing
    pub admin_username: String,
    pub admin_password: String,
    pub cors_origins: Vec<String>,
    pub pool_size: u32,
    pub session_ttl_hours: i64,
    /// Emit `SameSite=None; Secure` cookies (needed for cross-site frontends over HTTPS)
    pub cookie_secure: bool,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: PathBuf::from("swst_demo.db"),
            host: "0.0.0.0".to_string(),
            port: 5000,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            admin_username: DEFAULT_ADMIN_USERNAME.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            pool_size: 8,
            session_ttl_hours: 24,
            cookie_secure: false,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults for
    /// anything unset. A `.env` file in the working directory is honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let pool_size: u32 = parse_var(&lookup, "DB_POOL_SIZE", defaults.pool_size)?;
        if pool_size == 0 {
            return Err(invalid("DB_POOL_SIZE", "0", "must be at least 1"));
        }

        let session_ttl_hours: i64 =
            parse_var(&lookup, "SESSION_TTL_HOURS", defaults.session_ttl_hours)?;
        if session_ttl_hours < 1 {
            return Err(invalid(
                "SESSION_TTL_HOURS",
                &session_ttl_hours.to_string(),
                "must be at least 1",
            ));
        }

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.cors_origins,
        };

        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
            None => defaults.cookie_secure,
        };

        Ok(Settings {
            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            secret_key: lookup("SECRET_KEY").unwrap_or(defaults.secret_key),
            admin_username: lookup("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_password: lookup("ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
            cors_origins,
            pool_size,
            session_ttl_hours,
            cookie_secure,
            max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }

    /// Names of settings still carrying their insecure out-of-the-box values.
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut found = Vec::new();
        if self.secret_key == DEFAULT_SECRET_KEY {
            found.push("SECRET_KEY");
        }
        if self.admin_password == DEFAULT_ADMIN_PASSWORD {
            found.push("ADMIN_PASSWORD");
        }
        found
    }

    /// Log a warning for every insecure default in use.
    pub fn warn_on_insecure_defaults(&self) {
        for var in self.insecure_defaults() {
            tracing::warn!(var, "Using the built-in default; set it before deploying");
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(var, raw, "expected a boolean")),
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

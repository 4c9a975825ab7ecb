//! Configuration module for clinic-service.

use clinic_core::config as core_config;
use clinic_core::error::AppError;
use secrecy::{ExposeSecret, Secret};
use std::env;

#[derive(Debug, Clone)]
pub struct ClinicConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub login_attempts: u32,
    pub login_window_seconds: u64,
}

/// First admin account, created only while no admin exists.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: Secret<String>,
}

pub const MIN_JWT_SECRET_LEN: usize = 32;

impl ClinicConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("{} is required", key)))
        };
        let parsed = |key: &str, default: &str| -> Result<String, AppError> {
            Ok(lookup(key).unwrap_or_else(|| default.to_string()))
        };

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_EMAIL"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin {
                    email,
                    password: Secret::new(password),
                })
            }
            _ => None,
        };

        let config = Self {
            common,
            service_name: parsed("SERVICE_NAME", "clinic-service")?,
            service_version: parsed("SERVICE_VERSION", env!("CARGO_PKG_VERSION"))?,
            log_level: parsed("LOG_LEVEL", "info")?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            database: DatabaseConfig {
                url: Secret::new(required("DATABASE_URL")?),
                max_connections: parse_num(
                    "DATABASE_MAX_CONNECTIONS",
                    &parsed("DATABASE_MAX_CONNECTIONS", "10")?,
                )?,
                min_connections: parse_num(
                    "DATABASE_MIN_CONNECTIONS",
                    &parsed("DATABASE_MIN_CONNECTIONS", "2")?,
                )?,
                run_migrations: parse_bool(
                    "RUN_MIGRATIONS",
                    &parsed("RUN_MIGRATIONS", "true")?,
                )?,
            },
            jwt: JwtConfig {
                secret: Secret::new(required("JWT_SECRET")?),
                expiry_minutes: parse_num(
                    "JWT_EXPIRY_MINUTES",
                    &parsed("JWT_EXPIRY_MINUTES", "480")?,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: parsed("ALLOWED_ORIGINS", "http://localhost:3000")?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                login_attempts: parse_num(
                    "LOGIN_RATE_LIMIT_ATTEMPTS",
                    &parsed("LOGIN_RATE_LIMIT_ATTEMPTS", "5")?,
                )?,
                login_window_seconds: parse_num(
                    "LOGIN_RATE_LIMIT_WINDOW_SECONDS",
                    &parsed("LOGIN_RATE_LIMIT_WINDOW_SECONDS", "300")?,
                )?,
            },
            bootstrap_admin,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt.secret.expose_secret().len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }

        if self.jwt.expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.database.max_connections == 0
            || self.database.min_connections > self.database.max_connections
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS (and max must be > 0)"
            )));
        }

        if self.security.login_attempts == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LOGIN_RATE_LIMIT_ATTEMPTS must be positive"
            )));
        }

        if let Some(admin) = &self.bootstrap_admin {
            if admin.password.expose_secret().len() < 8 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "BOOTSTRAP_ADMIN_PASSWORD must be at least 8 characters"
                )));
            }
        }

        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value.trim().parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} must be a number, got '{}'", key, value))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be a boolean, got '{}'",
            key,
            value
        ))),
    }
}

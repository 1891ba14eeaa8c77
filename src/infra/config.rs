use std::{env, fmt::Display, str::FromStr};

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

/// Reads the configuration from the process environment.
///
/// | Env Var                    | Required | Default   |
/// |----------------------------|----------|-----------|
/// | `DATABASE_URL`             | yes      |           |
/// | `DATABASE_MAX_CONNECTIONS` | no       | `10`      |
/// | `SERVER_HOST`              | no       | `0.0.0.0` |
/// | `SERVER_PORT`              | no       | `8080`    |
/// | `JWT_SECRET`               | yes      |           |
pub fn load() -> Result<AppConfig> {
    let jwt_secret = required("JWT_SECRET")?;
    if jwt_secret.trim().is_empty() {
        bail!("JWT_SECRET must not be empty");
    }

    Ok(AppConfig {
        server: ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed_or("SERVER_PORT", 8080)?,
        },
        database: DatabaseConfig {
            url: required("DATABASE_URL")?,
            max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10)?,
        },
        auth: AuthConfig { jwt_secret },
    })
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|err| anyhow::anyhow!("{key} is invalid ({raw}): {err}")),
        Err(_) => Ok(default),
    }
}

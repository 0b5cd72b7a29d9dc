use anyhow::Context;
use serde::Deserialize;

const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:5173,http://127.0.0.1:5173,http://localhost:5174,http://127.0.0.1:5174";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Credentials used by the `create-admin` provisioning command.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Process-wide settings. Loaded once at startup and shared read-only via `AppState`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accountd".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "accountd-users".into()),
            ttl_minutes: env_minutes("JWT_TTL_MINUTES", 30),
            refresh_ttl_minutes: env_minutes("JWT_REFRESH_TTL_MINUTES", 60 * 24),
        };

        let mut cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into()),
        );
        if let Ok(frontend) = std::env::var("FRONTEND_URL") {
            if !frontend.trim().is_empty() {
                cors_allowed_origins.push(frontend.trim().to_string());
            }
        }

        Ok(Self {
            database_url,
            jwt,
            cors_allowed_origins,
        })
    }
}

impl AdminConfig {
    /// Read on its own so provisioning does not need the server's JWT settings.
    pub fn from_env() -> Self {
        Self {
            email: std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@test.com".into()),
            password: std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Admin123".into()),
            full_name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin User".into()),
        }
    }
}

fn env_minutes(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

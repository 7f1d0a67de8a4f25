/// Configuration for the API server
///
/// Read from environment variables, with a `.env` file loaded first when
/// present.
///
/// # Environment Variables
///
/// - `API_HOST` (default `0.0.0.0`), `API_PORT` (default `8080`)
/// - `API_PRODUCTION`: enables HSTS (default `false`)
/// - `CORS_ORIGINS`: comma separated, `*` for any (default `*`)
/// - `DATABASE_URL` (required), `DATABASE_MAX_CONNECTIONS` (default `10`)
/// - `JWT_SECRET` (required, at least 32 characters)
/// - `PUBLIC_BASE_URL`: prefix of links in emails (default `http://localhost:8080`)
/// - `MAIL_FROM` (default `no-reply@localhost`)
/// - `SMTP_HOST`: relay host; mail is only logged when unset
/// - `SMTP_PORT` (default depends on `SMTP_SECURITY`), `SMTP_SECURITY`:
///   `tls`, `starttls` or `none` (default `starttls`)
/// - `SMTP_USERNAME`, `SMTP_PASSWORD`: relay credentials, both or neither
/// - `PASSWORD_CHANGE_PER_HOUR`: password-change requests per client IP
///   and hour (default `3`)
/// - `DOCUMENTS_DIR` (default `./var/documents`)
/// - `PROJECT_IMAGES_DIR` (default `./var/projects`)
/// - `MAX_REQUEST_BYTES`: body limit for upload routes (default 50 MiB)
/// - `LOG_FORMAT`: `pretty` or `json` (default `pretty`)
///
/// # Example
///
/// ```no_run
/// use atelier_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use atelier_shared::mail::{SmtpSecurity, SmtpSettings};
use serde::{Deserialize, Serialize};
use std::env;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;

const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    pub mail: MailConfig,

    pub storage: StorageConfig,

    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// Turns on Strict-Transport-Security
    pub production: bool,

    pub cors_origins: Vec<String>,

    /// Body size limit on routes accepting uploads
    pub max_request_bytes: usize,

    /// Password-change requests allowed per client IP and hour
    pub password_change_per_hour: NonZeroU32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing key
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Origin used to build confirmation links
    pub public_base_url: String,

    pub from: String,

    /// Relay used for delivery; `None` logs messages instead
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub documents_dir: PathBuf,

    pub project_images_dir: PathBuf,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let port = var("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a port number")?;

        let production = parse_bool(&var("API_PRODUCTION", "false"))
            .context("API_PRODUCTION must be true or false")?;

        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let max_request_bytes = var("MAX_REQUEST_BYTES", "52428800")
            .parse::<usize>()
            .context("MAX_REQUEST_BYTES must be a byte count")?;

        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a number")?;

        let password_change_per_hour = var("PASSWORD_CHANGE_PER_HOUR", "3")
            .parse::<NonZeroU32>()
            .context("PASSWORD_CHANGE_PER_HOUR must be a positive number")?;

        let smtp = smtp_settings(&lookup)?;

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LEN);
        }

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST", "0.0.0.0"),
                port,
                production,
                cors_origins,
                max_request_bytes,
                password_change_per_hour,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            mail: MailConfig {
                public_base_url: var("PUBLIC_BASE_URL", "http://localhost:8080"),
                from: var("MAIL_FROM", "no-reply@localhost"),
                smtp,
            },
            storage: StorageConfig {
                documents_dir: PathBuf::from(var("DOCUMENTS_DIR", "./var/documents")),
                project_images_dir: PathBuf::from(var("PROJECT_IMAGES_DIR", "./var/projects")),
            },
            log_format: var("LOG_FORMAT", "pretty").parse()?,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// SMTP relay settings, present only when `SMTP_HOST` is set
fn smtp_settings<F>(lookup: &F) -> anyhow::Result<Option<SmtpSettings>>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let Some(host) = non_empty("SMTP_HOST") else {
        return Ok(None);
    };

    let security = match non_empty("SMTP_SECURITY") {
        Some(value) => value.parse::<SmtpSecurity>()?,
        None => SmtpSecurity::StartTls,
    };

    let port = match non_empty("SMTP_PORT") {
        Some(value) => value.parse::<u16>().context("SMTP_PORT must be a port number")?,
        None => security.default_port(),
    };

    let username = non_empty("SMTP_USERNAME");
    let password = non_empty("SMTP_PASSWORD");
    if username.is_some() != password.is_some() {
        anyhow::bail!("SMTP_USERNAME and SMTP_PASSWORD must be set together");
    }

    Ok(Some(SmtpSettings {
        host: host.trim().to_string(),
        port,
        security,
        username,
        password,
    }))
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("not a boolean: '{}'", other),
    }
}

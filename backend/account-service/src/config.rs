//! Configuration management for Account Service
//!
//! Loads settings from environment variables, with a `.env` file picked up
//! in debug builds for local development.
//!
//! # Example
//!
//! ```no_run
//! use account_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("listening on {}:{}", settings.server.host, settings.server.port);
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub tokens: TokenSettings,
    pub otp: OtpSettings,
    pub email: EmailSettings,
    pub account: AccountSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            server: ServerSettings::from_env()?,
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            tokens: TokenSettings::from_env()?,
            otp: OtpSettings::from_env()?,
            email: EmailSettings::from_env()?,
            account: AccountSettings::from_env(),
        })
    }
}

/// HTTP bind settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
    pub statement_timeout_secs: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
            statement_timeout_secs: env::var("DATABASE_STATEMENT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_STATEMENT_TIMEOUT_SECS")?,
        })
    }

    /// Value for the per-session `statement_timeout` parameter
    pub fn statement_timeout(&self) -> String {
        format!("{}s", self.statement_timeout_secs)
    }
}

/// Session cache settings
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
    pub response_timeout_ms: u64,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
            response_timeout_ms: env::var("REDIS_RESPONSE_TIMEOUT_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("Invalid REDIS_RESPONSE_TIMEOUT_MS")?,
        })
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Access/refresh key material (base64-encoded PEM) and lifetimes
#[derive(Clone)]
pub struct TokenSettings {
    pub access_private_key: String,
    pub access_public_key: String,
    pub refresh_private_key: String,
    pub refresh_public_key: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl TokenSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            access_private_key: env::var("ACCESS_TOKEN_PRIVATE_KEY")
                .context("ACCESS_TOKEN_PRIVATE_KEY must be set")?,
            access_public_key: env::var("ACCESS_TOKEN_PUBLIC_KEY")
                .context("ACCESS_TOKEN_PUBLIC_KEY must be set")?,
            refresh_private_key: env::var("REFRESH_TOKEN_PRIVATE_KEY")
                .context("REFRESH_TOKEN_PRIVATE_KEY must be set")?,
            refresh_public_key: env::var("REFRESH_TOKEN_PUBLIC_KEY")
                .context("REFRESH_TOKEN_PUBLIC_KEY must be set")?,
            access_ttl_secs: env::var("ACCESS_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid ACCESS_TOKEN_TTL_SECS")?,
            refresh_ttl_secs: env::var("REFRESH_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .context("Invalid REFRESH_TOKEN_TTL_SECS")?,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Upper bound for OTP expiry and usable window
pub const MAX_OTP_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// One-time code sizing and lifetime
#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub code_length: usize,
    pub reference_length: usize,
    pub expiry_secs: u64,
    pub usable_window_secs: u64,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            code_length: 6,
            reference_length: 20,
            expiry_secs: 24 * 60 * 60,
            usable_window_secs: 24 * 60 * 60,
        }
    }
}

impl OtpSettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            code_length: env::var("OTP_CODE_LENGTH")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .context("Invalid OTP_CODE_LENGTH")?,
            reference_length: env::var("OTP_REFERENCE_LENGTH")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid OTP_REFERENCE_LENGTH")?,
            expiry_secs: env::var("OTP_EXPIRY_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .context("Invalid OTP_EXPIRY_SECS")?,
            usable_window_secs: env::var("OTP_USABLE_WINDOW_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .context("Invalid OTP_USABLE_WINDOW_SECS")?,
        };

        if settings.code_length == 0 || settings.reference_length <= settings.code_length {
            anyhow::bail!("OTP_REFERENCE_LENGTH must be longer than a non-zero OTP_CODE_LENGTH");
        }
        if settings.expiry_secs > MAX_OTP_LIFETIME_SECS
            || settings.usable_window_secs > MAX_OTP_LIFETIME_SECS
        {
            anyhow::bail!(
                "OTP_EXPIRY_SECS and OTP_USABLE_WINDOW_SECS must not exceed {MAX_OTP_LIFETIME_SECS}"
            );
        }

        Ok(settings)
    }
}

/// SMTP delivery settings; an empty host puts the sender in no-op mode
#[derive(Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    pub use_starttls: bool,
    pub send_timeout_secs: u64,
    pub client_origin: String,
}

impl EmailSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .context("Invalid SMTP_PORT")?,
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            smtp_from: env::var("SMTP_FROM").unwrap_or_else(|_| "no-reply@localhost".to_string()),
            use_starttls: env::var("SMTP_STARTTLS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            send_timeout_secs: env::var("EMAIL_SEND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid EMAIL_SEND_TIMEOUT_SECS")?,
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_from", &self.smtp_from)
            .field("use_starttls", &self.use_starttls)
            .field("client_origin", &self.client_origin)
            .finish_non_exhaustive()
    }
}

/// Account policy knobs
#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Usernames granted staff and superuser flags at registration
    pub admin_usernames: Vec<String>,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            admin_usernames: vec!["admin".to_string()],
        }
    }
}

impl AccountSettings {
    fn from_env() -> Self {
        let raw = env::var("ADMIN_USERNAMES").unwrap_or_else(|_| "admin".to_string());
        Self {
            admin_usernames: raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_admin_username(&self, username: &str) -> bool {
        self.admin_usernames.iter().any(|name| name == username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_token_settings_from_env() {
        env::set_var("ACCESS_TOKEN_PRIVATE_KEY", "a-priv");
        env::set_var("ACCESS_TOKEN_PUBLIC_KEY", "a-pub");
        env::set_var("REFRESH_TOKEN_PRIVATE_KEY", "r-priv");
        env::set_var("REFRESH_TOKEN_PUBLIC_KEY", "r-pub");
        env::set_var("ACCESS_TOKEN_TTL_SECS", "60");

        let settings = TokenSettings::from_env().unwrap();

        assert_eq!(settings.access_ttl(), Duration::from_secs(60));
        assert_eq!(settings.refresh_ttl(), Duration::from_secs(604800)); // Default
        assert!(!format!("{:?}", settings).contains("a-priv"));

        env::remove_var("ACCESS_TOKEN_PRIVATE_KEY");
        env::remove_var("ACCESS_TOKEN_PUBLIC_KEY");
        env::remove_var("REFRESH_TOKEN_PRIVATE_KEY");
        env::remove_var("REFRESH_TOKEN_PUBLIC_KEY");
        env::remove_var("ACCESS_TOKEN_TTL_SECS");
    }

    #[test]
    #[serial]
    fn test_token_settings_require_keys() {
        env::remove_var("ACCESS_TOKEN_PRIVATE_KEY");
        assert!(TokenSettings::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_otp_settings_defaults() {
        env::remove_var("OTP_CODE_LENGTH");
        env::remove_var("OTP_REFERENCE_LENGTH");

        let settings = OtpSettings::from_env().unwrap();

        assert_eq!(settings.code_length, 6);
        assert_eq!(settings.reference_length, 20);
        assert_eq!(settings.expiry_secs, 86400);
    }

    #[test]
    #[serial]
    fn test_otp_reference_must_be_wider_than_code() {
        env::set_var("OTP_CODE_LENGTH", "8");
        env::set_var("OTP_REFERENCE_LENGTH", "8");

        assert!(OtpSettings::from_env().is_err());

        env::remove_var("OTP_CODE_LENGTH");
        env::remove_var("OTP_REFERENCE_LENGTH");
    }

    #[test]
    #[serial]
    fn test_database_statement_timeout() {
        env::set_var("DATABASE_URL", "postgres://localhost/accounts");
        env::remove_var("DATABASE_STATEMENT_TIMEOUT_SECS");
        let settings = DatabaseSettings::from_env().unwrap();
        assert_eq!(settings.statement_timeout(), "10s");

        env::set_var("DATABASE_STATEMENT_TIMEOUT_SECS", "3");
        assert_eq!(DatabaseSettings::from_env().unwrap().statement_timeout(), "3s");

        env::set_var("DATABASE_STATEMENT_TIMEOUT_SECS", "soon");
        assert!(DatabaseSettings::from_env().is_err());

        env::remove_var("DATABASE_STATEMENT_TIMEOUT_SECS");
        env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn test_otp_lifetimes_are_bounded() {
        env::set_var("OTP_EXPIRY_SECS", "10000000000000000");
        assert!(OtpSettings::from_env().is_err());
        env::remove_var("OTP_EXPIRY_SECS");

        env::set_var("OTP_USABLE_WINDOW_SECS", (MAX_OTP_LIFETIME_SECS + 1).to_string());
        assert!(OtpSettings::from_env().is_err());

        env::set_var("OTP_USABLE_WINDOW_SECS", MAX_OTP_LIFETIME_SECS.to_string());
        assert!(OtpSettings::from_env().is_ok());
        env::remove_var("OTP_USABLE_WINDOW_SECS");
    }

    #[test]
    #[serial]
    fn test_admin_usernames_are_normalised() {
        env::set_var("ADMIN_USERNAMES", " Admin, root ,,");

        let settings = AccountSettings::from_env();

        assert_eq!(settings.admin_usernames, vec!["admin", "root"]);
        assert!(settings.is_admin_username("root"));
        assert!(!settings.is_admin_username("alice"));

        env::remove_var("ADMIN_USERNAMES");
    }
}

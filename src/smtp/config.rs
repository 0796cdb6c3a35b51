//! Typed SMTP configuration

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::settings::{self, parsed_value, string_value};

pub const DEFAULT_PORT: u16 = 587;
pub const SMTPS_PORT: u16 = 465;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FROM_EMAIL: &str = "noreply@localhost";
pub const DEFAULT_FROM_NAME: &str = "Verification Portal";

/// Transport encryption mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    None,
    /// TLS from the first byte
    Ssl,
    /// STARTTLS upgrade, or implicit TLS on port 465
    #[default]
    Tls,
}

impl FromStr for Encryption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Encryption::None),
            "ssl" => Ok(Encryption::Ssl),
            "tls" | "starttls" => Ok(Encryption::Tls),
            other => Err(format!("unknown encryption mode: {other}")),
        }
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encryption::None => "none",
            Encryption::Ssl => "ssl",
            Encryption::Tls => "tls",
        };
        f.write_str(name)
    }
}

/// Connection and envelope settings for one send
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// May be empty, in which case AUTH is skipped
    pub username: String,
    /// May be empty, in which case AUTH is skipped
    pub password: String,
    pub encryption: Encryption,
    pub from_email: String,
    pub from_name: String,
    /// Deadline for connect and for every read and write
    pub timeout: Duration,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("encryption", &self.encryption)
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            encryption: Encryption::default(),
            from_email: DEFAULT_FROM_EMAIL.to_owned(),
            from_name: DEFAULT_FROM_NAME.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SmtpConfig {
    /// Build the configuration from a settings map, applying defaults for
    /// absent or malformed values
    pub fn from_settings(values: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let encryption = values
            .get(settings::SMTP_ENCRYPTION)
            .map(|mode| mode.parse::<Encryption>().unwrap_or_default())
            .unwrap_or(defaults.encryption);

        let timeout = parsed_value::<u64>(values, settings::SMTP_TIMEOUT_SECS)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            host: string_value(values, settings::SMTP_HOST).unwrap_or_default(),
            port: parsed_value::<u16>(values, settings::SMTP_PORT)
                .filter(|port| *port != 0)
                .unwrap_or(defaults.port),
            username: values
                .get(settings::SMTP_USERNAME)
                .cloned()
                .unwrap_or_default(),
            password: values
                .get(settings::SMTP_PASSWORD)
                .cloned()
                .unwrap_or_default(),
            encryption,
            from_email: string_value(values, settings::SMTP_FROM_EMAIL)
                .unwrap_or(defaults.from_email),
            from_name: string_value(values, settings::SMTP_FROM_NAME)
                .unwrap_or(defaults.from_name),
            timeout,
        }
    }

    /// TLS from the first byte
    pub fn implicit_tls(&self) -> bool {
        match self.encryption {
            Encryption::Ssl => true,
            Encryption::Tls => self.port == SMTPS_PORT,
            Encryption::None => false,
        }
    }

    /// STARTTLS upgrade after the first EHLO
    pub fn wants_starttls(&self) -> bool {
        self.encryption == Encryption::Tls && self.port != SMTPS_PORT
    }

    /// AUTH LOGIN runs only when both credentials are present
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

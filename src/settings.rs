//! Settings sources for the mailer
//!
//! Settings are an opaque string to string mapping looked up by key. The
//! mailer reads them fresh on every send and turns them into typed
//! configuration at its boundary; nothing below that boundary sees a raw
//! key.

use std::collections::HashMap;

pub const SMTP_HOST: &str = "smtp_host";
pub const SMTP_PORT: &str = "smtp_port";
pub const SMTP_USERNAME: &str = "smtp_username";
pub const SMTP_PASSWORD: &str = "smtp_password";
pub const SMTP_ENCRYPTION: &str = "smtp_encryption";
pub const SMTP_FROM_EMAIL: &str = "smtp_from_email";
pub const SMTP_FROM_NAME: &str = "smtp_from_name";
pub const SMTP_TIMEOUT_SECS: &str = "smtp_timeout_secs";
pub const OTP_EMAIL_SUBJECT: &str = "otp_email_subject";
pub const OTP_EMAIL_TEMPLATE: &str = "otp_email_template";
pub const OTP_EXPIRY_MINUTES: &str = "otp_expiry_minutes";
pub const OTP_LENGTH: &str = "otp_length";
pub const SENDMAIL_PATH: &str = "sendmail_path";

/// Every key the mailer consumes
pub const MAIL_KEYS: &[&str] = &[
    SMTP_HOST,
    SMTP_PORT,
    SMTP_USERNAME,
    SMTP_PASSWORD,
    SMTP_ENCRYPTION,
    SMTP_FROM_EMAIL,
    SMTP_FROM_NAME,
    SMTP_TIMEOUT_SECS,
    OTP_EMAIL_SUBJECT,
    OTP_EMAIL_TEMPLATE,
    OTP_EXPIRY_MINUTES,
    OTP_LENGTH,
    SENDMAIL_PATH,
];

/// Read-only source of settings
pub trait SettingsSource: Send + Sync {
    /// Look up a group of keys. Absent keys are simply missing from the
    /// returned map.
    fn get(&self, keys: &[&str]) -> HashMap<String, String>;
}

impl<T: SettingsSource + ?Sized> SettingsSource for Box<T> {
    fn get(&self, keys: &[&str]) -> HashMap<String, String> {
        (**self).get(keys)
    }
}

impl<T: SettingsSource + ?Sized> SettingsSource for std::sync::Arc<T> {
    fn get(&self, keys: &[&str]) -> HashMap<String, String> {
        (**self).get(keys)
    }
}

/// In-memory settings, e.g. loaded from a database table
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, String>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, builder style
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_owned(), value.into());
    }
}

impl FromIterator<(String, String)> for MapSettings {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl SettingsSource for MapSettings {
    fn get(&self, keys: &[&str]) -> HashMap<String, String> {
        keys.iter()
            .filter_map(|key| {
                self.values
                    .get(*key)
                    .map(|value| ((*key).to_owned(), value.clone()))
            })
            .collect()
    }
}

/// Settings taken from the process environment.
///
/// Each key maps to its upper-cased variable (`smtp_host` reads
/// `SMTP_HOST`). Empty variables count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl EnvSettings {
    pub fn new() -> Self {
        Self
    }

    pub fn variable_name(key: &str) -> String {
        key.to_ascii_uppercase()
    }
}

impl SettingsSource for EnvSettings {
    fn get(&self, keys: &[&str]) -> HashMap<String, String> {
        keys.iter()
            .filter_map(|key| {
                std::env::var(Self::variable_name(key))
                    .ok()
                    .filter(|value| !value.is_empty())
                    .map(|value| ((*key).to_owned(), value))
            })
            .collect()
    }
}

/// Non-empty string value for `key`
pub fn string_value(values: &HashMap<String, String>, key: &str) -> Option<String> {
    values
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Parsed value for `key`, `None` when absent or malformed
pub fn parsed_value<T: std::str::FromStr>(
    values: &HashMap<String, String>,
    key: &str,
) -> Option<T> {
    values.get(key).and_then(|value| value.trim().parse().ok())
}

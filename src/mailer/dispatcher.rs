//! OTP email dispatch: settings, rendering, then SMTP or local submission

use std::collections::HashMap;

use tracing::{error, info};

use crate::mailer::composer::{OtpKind, render_body, render_subject};
use crate::mailer::local::{DEFAULT_SENDMAIL_PATH, LocalTransport, Sendmail};
use crate::otp::{DEFAULT_OTP_LENGTH, generate_otp};
use crate::settings::{self, MAIL_KEYS, SettingsSource, parsed_value, string_value};
use crate::smtp::{Message, SendResult, SmtpClient, SmtpConfig};

pub const DEFAULT_EXPIRY_MINUTES: u32 = 10;

/// Message settings read alongside the SMTP configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpMailSettings {
    pub subject_template: Option<String>,
    pub body_template: Option<String>,
    pub expiry_minutes: u32,
    pub otp_length: usize,
    pub sendmail_path: String,
}

impl Default for OtpMailSettings {
    fn default() -> Self {
        Self {
            subject_template: None,
            body_template: None,
            expiry_minutes: DEFAULT_EXPIRY_MINUTES,
            otp_length: DEFAULT_OTP_LENGTH,
            sendmail_path: DEFAULT_SENDMAIL_PATH.to_owned(),
        }
    }
}

impl OtpMailSettings {
    pub fn from_settings(values: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            subject_template: string_value(values, settings::OTP_EMAIL_SUBJECT),
            body_template: values
                .get(settings::OTP_EMAIL_TEMPLATE)
                .filter(|template| !template.trim().is_empty())
                .cloned(),
            expiry_minutes: parsed_value(values, settings::OTP_EXPIRY_MINUTES)
                .unwrap_or(defaults.expiry_minutes),
            otp_length: parsed_value::<usize>(values, settings::OTP_LENGTH)
                .filter(|length| *length > 0)
                .unwrap_or(defaults.otp_length),
            sendmail_path: string_value(values, settings::SENDMAIL_PATH)
                .unwrap_or(defaults.sendmail_path),
        }
    }
}

/// Sends OTP emails using settings read fresh on every call
pub struct MailDispatcher<S> {
    settings: S,
    local: Option<Box<dyn LocalTransport>>,
    helo_name: Option<String>,
}

impl<S: SettingsSource> MailDispatcher<S> {
    pub fn new(settings: S) -> Self {
        Self {
            settings,
            local: None,
            helo_name: None,
        }
    }

    /// Replace the sendmail fallback
    pub fn with_local_transport(mut self, transport: impl LocalTransport + 'static) -> Self {
        self.local = Some(Box::new(transport));
        self
    }

    /// Override the name the SMTP client announces in EHLO
    pub fn with_helo_name(mut self, name: &str) -> Self {
        self.helo_name = Some(name.to_owned());
        self
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// A fresh code of `length` digits, or the configured length
    pub fn generate_otp(&self, length: Option<usize>) -> String {
        let length = length.unwrap_or_else(|| {
            OtpMailSettings::from_settings(&self.settings.get(&[settings::OTP_LENGTH])).otp_length
        });
        generate_otp(length)
    }

    /// Email `otp` to `recipient`. Failures are logged here and reported
    /// only as `false`.
    pub fn send_otp_email(&self, recipient: &str, otp: &str, kind: OtpKind) -> bool {
        let result = self.dispatch(recipient, otp, kind);
        if !result.success {
            error!(recipient = %recipient, reason = %result.error, "failed to send OTP email");
        }
        result.success
    }

    /// Like [`send_otp_email`](Self::send_otp_email), keeping the reason
    pub fn dispatch(&self, recipient: &str, otp: &str, kind: OtpKind) -> SendResult {
        let values = self.settings.get(MAIL_KEYS);
        let config = SmtpConfig::from_settings(&values);
        let mail = OtpMailSettings::from_settings(&values);

        let expiry = mail.expiry_minutes;
        let subject = render_subject(mail.subject_template.as_deref(), otp, kind, expiry);
        let body = render_body(mail.body_template.as_deref(), otp, kind, expiry);
        let message = Message::new(
            recipient,
            subject,
            body,
            config.from_email.clone(),
            config.from_name.clone(),
        );

        if config.host.is_empty() {
            return self.submit_locally(&message, &mail);
        }

        let mut client = SmtpClient::new(config);
        if let Some(name) = &self.helo_name {
            client = client.with_helo_name(name);
        }
        client.send(&message)
    }

    fn submit_locally(&self, message: &Message, mail: &OtpMailSettings) -> SendResult {
        let outcome = match &self.local {
            Some(transport) => transport.submit(message),
            None => Sendmail::new(&mail.sendmail_path).submit(message),
        };
        match outcome {
            Ok(()) => {
                info!(recipient = %message.recipient, "message submitted locally");
                SendResult::ok()
            }
            Err(e) => SendResult::failed(format!("local submission failed: {e}")),
        }
    }
}

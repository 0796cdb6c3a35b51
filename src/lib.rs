//! # otpmail
//!
//! Sends one-time verification codes by email over a hand-rolled SMTP
//! client.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use otpmail::{MailDispatcher, MapSettings, OtpKind};
//!
//! let settings = MapSettings::new()
//!     .with("smtp_host", "smtp.example.com")
//!     .with("smtp_port", "587")
//!     .with("smtp_username", "portal")
//!     .with("smtp_password", "secret")
//!     .with("smtp_from_email", "noreply@example.com");
//!
//! let dispatcher = MailDispatcher::new(settings);
//! let otp = dispatcher.generate_otp(None);
//!
//! if !dispatcher.send_otp_email("user@example.com", &otp, OtpKind::Document) {
//!     // The reason has already been logged
//! }
//! ```
//!
//! ## SMTP dialogue
//!
//! Each send opens one connection and walks a fixed sequence:
//!
//! - greeting (`220`)
//! - `EHLO`
//! - `STARTTLS` and a second `EHLO`, for `tls` mode off port 465
//! - `AUTH LOGIN`, when both username and password are set
//! - `MAIL FROM`, `RCPT TO`, `DATA`, message, `QUIT`
//!
//! Every exit path closes the socket before returning. Failures come back
//! as a [`SendResult`] value naming the step that failed.
//!
//! ## Notes
//!
//! - A refused `STARTTLS` is not fatal: the dialogue continues in
//!   plaintext, including `AUTH LOGIN`.
//! - Exactly one recipient per message, single-part HTML only.
//! - Server certificates are checked against the bundled web PKI roots,
//!   or the store given to [`SmtpClient::with_root_certificates`].
//! - No retries and no connection reuse.
//! - With no `smtp_host` configured, mail is piped into `sendmail -t -i`.
//!
//! ## Timeouts
//!
//! Connect, every read and every write are bounded by `smtp_timeout_secs`
//! (30 seconds by default).

pub mod mailer;
pub mod otp;
pub mod pdf;
pub mod settings;
mod smtp;

pub use mailer::{
    LocalMailError, LocalTransport, MailDispatcher, OtpKind, OtpMailSettings, Sendmail,
};
pub use otp::{DEFAULT_OTP_LENGTH, generate_otp};
pub use pdf::{PageBox, PdfError, PdfScanner};
pub use settings::{EnvSettings, MapSettings, SettingsSource};
pub use smtp::{
    Encryption, Message, SendResult, SmtpClient, SmtpCommand, SmtpConfig, SmtpError, SmtpLimits,
    SmtpResponse, SmtpSession, SmtpState, SocketStats,
};

//! OTP mail composition and dispatch

pub mod composer;
pub mod dispatcher;
pub mod local;

pub use composer::{OtpKind, render_body, render_subject};
pub use dispatcher::{MailDispatcher, OtpMailSettings};
pub use local::{LocalMailError, LocalTransport, Sendmail};

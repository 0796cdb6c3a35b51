//! Error types for the SMTP client

use thiserror::Error;

/// Every way a single send can fail. The `Display` text is the reason
/// reported back to callers in [`SendResult`].
#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("server error: {0}")]
    Greeting(String),

    #[error("authentication failed")]
    Authentication,

    #[error("MAIL FROM rejected")]
    MailFromRejected,

    #[error("RCPT TO rejected")]
    RcptToRejected,

    #[error("DATA command failed")]
    DataRejected,

    #[error("message rejected: {0}")]
    MessageRejected(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("reply line too long (max {max} characters)")]
    ReplyTooLong { max: usize },

    #[error("too many reply lines (max {max})")]
    TooManyReplyLines { max: usize },

    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// SMTP size limits as defined in RFC 821
pub struct SmtpLimits;

impl SmtpLimits {
    /// Maximum length of a reply line including CRLF
    pub const REPLY_LINE_MAX_LENGTH: usize = 512;

    /// Maximum number of lines accepted in one multi-line reply
    pub const REPLY_MAX_LINES: usize = 100;
}

/// Outcome of one send. Always produced, never thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    /// Empty iff `success` is true
    pub error: String,
}

impl SendResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: String::new(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            success: false,
            error: if reason.is_empty() {
                "unknown error".to_owned()
            } else {
                reason
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl From<Result<(), SmtpError>> for SendResult {
    fn from(result: Result<(), SmtpError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_text_names_the_step() {
        assert_eq!(SmtpError::RcptToRejected.to_string(), "RCPT TO rejected");
        assert_eq!(SmtpError::MailFromRejected.to_string(), "MAIL FROM rejected");
        assert_eq!(SmtpError::DataRejected.to_string(), "DATA command failed");
        assert_eq!(
            SmtpError::Authentication.to_string(),
            "authentication failed"
        );
        assert_eq!(
            SmtpError::Greeting("554 go away".to_owned()).to_string(),
            "server error: 554 go away"
        );
    }

    #[test]
    fn test_reply_limits_are_reported_separately() {
        assert_eq!(
            SmtpError::TooManyReplyLines { max: 100 }.to_string(),
            "too many reply lines (max 100)"
        );
        assert_eq!(
            SmtpError::ReplyTooLong { max: 512 }.to_string(),
            "reply line too long (max 512 characters)"
        );
    }

    #[test]
    fn test_send_result_from_result() {
        let ok: SendResult = Ok(()).into();
        assert!(ok.is_success());
        assert!(ok.error.is_empty());

        let failed: SendResult = Err(SmtpError::Connection("refused".to_owned())).into();
        assert!(!failed.is_success());
        assert_eq!(failed.error, "connection failed: refused");
    }

    #[test]
    fn test_failed_result_never_has_empty_reason() {
        let failed = SendResult::failed("");
        assert!(!failed.success);
        assert!(!failed.error.is_empty());
    }
}

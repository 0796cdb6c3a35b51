//! SMTP commands issued by the client

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// One command line sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    StartTls,
    AuthLogin,
    /// A base64 encoded answer to a `334` challenge
    AuthResponse(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    Quit,
}

impl SmtpCommand {
    /// Build the answer to an AUTH LOGIN challenge
    pub fn auth_response(value: &str) -> Self {
        SmtpCommand::AuthResponse(STANDARD.encode(value.as_bytes()))
    }

    /// Format the command for sending over the wire
    pub fn format(&self) -> String {
        let line = match self {
            SmtpCommand::Ehlo(domain) => format!("EHLO {domain}"),
            SmtpCommand::StartTls => "STARTTLS".to_owned(),
            SmtpCommand::AuthLogin => "AUTH LOGIN".to_owned(),
            SmtpCommand::AuthResponse(encoded) => encoded.clone(),
            SmtpCommand::MailFrom(addr) => format!("MAIL FROM:<{}>", strip_line_breaks(addr)),
            SmtpCommand::RcptTo(addr) => format!("RCPT TO:<{}>", strip_line_breaks(addr)),
            SmtpCommand::Data => "DATA".to_owned(),
            SmtpCommand::Quit => "QUIT".to_owned(),
        };
        format!("{line}\r\n")
    }

    /// The command as it may appear in logs. Credentials are masked.
    pub fn redacted(&self) -> String {
        match self {
            SmtpCommand::AuthResponse(_) => "<credentials>".to_owned(),
            other => other.format().trim_end().to_owned(),
        }
    }
}

fn strip_line_breaks(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

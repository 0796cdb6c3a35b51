//! SMTP client session state

use std::fmt;

/// Steps of a one-shot mail transaction, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Opening the socket, TLS-wrapped for implicit TLS
    Connect,
    /// Waiting for the 220 greeting
    Greeting,
    Ehlo,
    /// In-band TLS upgrade, only for `tls` mode off port 465
    StartTls,
    /// AUTH LOGIN, only when credentials are configured
    Auth,
    MailFrom,
    RcptTo,
    Data,
    /// Writing headers, body and the end-of-data marker
    Transmit,
    /// QUIT and close
    Finish,
}

impl fmt::Display for SmtpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmtpState::Connect => "connect",
            SmtpState::Greeting => "greeting",
            SmtpState::Ehlo => "EHLO",
            SmtpState::StartTls => "STARTTLS",
            SmtpState::Auth => "AUTH",
            SmtpState::MailFrom => "MAIL FROM",
            SmtpState::RcptTo => "RCPT TO",
            SmtpState::Data => "DATA",
            SmtpState::Transmit => "transmit",
            SmtpState::Finish => "finish",
        };
        f.write_str(name)
    }
}

/// What happened during one send
#[derive(Debug, Clone)]
pub struct SmtpSession {
    /// The step currently running, or the one that failed
    pub state: SmtpState,
    /// Steps entered so far, in order
    pub visited: Vec<SmtpState>,
    /// Whether the connection was encrypted when the envelope was sent
    pub tls_active: bool,
    pub authenticated: bool,
    /// Extension lines from the last EHLO reply
    pub capabilities: Vec<String>,
}

impl SmtpSession {
    pub fn new() -> Self {
        Self {
            state: SmtpState::Connect,
            visited: vec![SmtpState::Connect],
            tls_active: false,
            authenticated: false,
            capabilities: Vec::new(),
        }
    }

    /// Move to the next step
    pub fn enter(&mut self, state: SmtpState) {
        self.state = state;
        self.visited.push(state);
    }

    pub fn has_visited(&self, state: SmtpState) -> bool {
        self.visited.contains(&state)
    }

    /// Whether the server advertised an extension, e.g. `STARTTLS`
    pub fn supports(&self, extension: &str) -> bool {
        self.capabilities.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|keyword| keyword.eq_ignore_ascii_case(extension))
        })
    }
}

impl Default for SmtpSession {
    fn default() -> Self {
        Self::new()
    }
}

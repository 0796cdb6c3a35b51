//! One-shot SMTP client

use std::sync::Arc;

use chrono::Local;
use rustls::RootCertStore;
use tracing::{debug, info, warn};

use crate::smtp::commands::SmtpCommand;
use crate::smtp::config::SmtpConfig;
use crate::smtp::connection::{Connection, SocketStats, tls_config};
use crate::smtp::error::{SendResult, SmtpError};
use crate::smtp::message::Message;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::{SmtpSession, SmtpState};

/// Sends a single message per call over a fresh connection.
///
/// The dialogue is strictly sequential: greeting, EHLO, optional
/// STARTTLS, optional AUTH LOGIN, MAIL FROM, RCPT TO, DATA, QUIT. There
/// are no retries and no connection reuse; the socket is closed before
/// `send` returns on every path.
#[derive(Debug, Clone)]
pub struct SmtpClient {
    config: SmtpConfig,
    helo_name: String,
    roots: Option<Arc<RootCertStore>>,
    stats: Arc<SocketStats>,
}

impl SmtpClient {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            helo_name: local_hostname(),
            roots: None,
            stats: Arc::new(SocketStats::default()),
        }
    }

    /// Override the name announced in EHLO
    pub fn with_helo_name(mut self, name: &str) -> Self {
        self.helo_name = name.to_owned();
        self
    }

    /// Trust `roots` instead of the bundled web PKI roots
    pub fn with_root_certificates(mut self, roots: RootCertStore) -> Self {
        self.roots = Some(Arc::new(roots));
        self
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    pub fn helo_name(&self) -> &str {
        &self.helo_name
    }

    /// Sockets opened and closed by this client so far
    pub fn socket_stats(&self) -> &SocketStats {
        &self.stats
    }

    /// Deliver `message`. Never panics and never returns an error type:
    /// the outcome is always a [`SendResult`].
    pub fn send(&self, message: &Message) -> SendResult {
        self.send_traced(message).0
    }

    /// Like [`send`](Self::send), also returning the session record
    pub fn send_traced(&self, message: &Message) -> (SendResult, SmtpSession) {
        let mut session = SmtpSession::new();

        let result = match self.connect(&mut session) {
            Ok(mut connection) => {
                let result = self.transact(&mut connection, &mut session, message);
                connection.close();
                result
            }
            Err(e) => Err(e),
        };

        let result = result.map_err(|e| in_state(session.state, e));
        match &result {
            Ok(()) => info!(
                recipient = %message.recipient,
                host = %self.config.host,
                tls = session.tls_active,
                "message accepted"
            ),
            Err(e) => debug!(
                recipient = %message.recipient,
                state = %session.state,
                reason = %e,
                "send failed"
            ),
        }

        (result.into(), session)
    }

    fn connect(&self, session: &mut SmtpSession) -> Result<Connection, SmtpError> {
        let mut connection = Connection::open(
            &self.config.host,
            self.config.port,
            self.config.timeout,
            self.stats.clone(),
        )?;

        if self.config.implicit_tls() {
            let upgraded = tls_config(self.roots.as_ref())
                .and_then(|config| connection.upgrade_to_tls(config));
            if let Err(e) = upgraded {
                connection.close();
                return Err(SmtpError::Connection(e.to_string()));
            }
            session.tls_active = true;
        }

        Ok(connection)
    }

    fn transact(
        &self,
        connection: &mut Connection,
        session: &mut SmtpSession,
        message: &Message,
    ) -> Result<(), SmtpError> {
        session.enter(SmtpState::Greeting);
        let greeting = connection.read_response()?;
        if !greeting.has_code("220") {
            return Err(SmtpError::Greeting(greeting.text()));
        }

        session.enter(SmtpState::Ehlo);
        let ehlo = SmtpCommand::Ehlo(self.helo_name.clone());
        let reply = connection.command(&ehlo)?;
        session.capabilities = capabilities(&reply);

        if self.config.wants_starttls() {
            if !session.supports("STARTTLS") {
                debug!(host = %self.config.host, "STARTTLS not advertised, trying anyway");
            }
            session.enter(SmtpState::StartTls);
            let reply = connection.command(&SmtpCommand::StartTls)?;
            if reply.has_code("220") {
                connection.upgrade_to_tls(tls_config(self.roots.as_ref())?)?;
                session.tls_active = true;
                let reply = connection.command(&ehlo)?;
                session.capabilities = capabilities(&reply);
            } else {
                // Not fatal: the dialogue carries on in plaintext
                warn!(
                    host = %self.config.host,
                    reply = %reply.text(),
                    "STARTTLS refused, continuing unencrypted"
                );
            }
        }

        if self.config.has_credentials() {
            session.enter(SmtpState::Auth);
            self.auth_login(connection)?;
            session.authenticated = true;
        }

        session.enter(SmtpState::MailFrom);
        let reply = connection.command(&SmtpCommand::MailFrom(message.from_email.clone()))?;
        if !reply.has_code("250") {
            return Err(SmtpError::MailFromRejected);
        }

        session.enter(SmtpState::RcptTo);
        let reply = connection.command(&SmtpCommand::RcptTo(message.recipient.clone()))?;
        if !reply.has_code("250") {
            return Err(SmtpError::RcptToRejected);
        }

        session.enter(SmtpState::Data);
        let reply = connection.command(&SmtpCommand::Data)?;
        if !reply.has_code("354") {
            return Err(SmtpError::DataRejected);
        }

        session.enter(SmtpState::Transmit);
        connection.send_data(&message.to_data(Local::now()))?;
        let final_reply = connection.read_response()?;

        session.enter(SmtpState::Finish);
        // The message is already settled; QUIT is a courtesy
        if let Err(e) = connection.command(&SmtpCommand::Quit) {
            debug!(error = %e, "QUIT not acknowledged");
        }

        if final_reply.has_code("250") {
            Ok(())
        } else {
            Err(SmtpError::MessageRejected(final_reply.text()))
        }
    }

    fn auth_login(&self, connection: &mut Connection) -> Result<(), SmtpError> {
        let reply = connection.command(&SmtpCommand::AuthLogin)?;
        if !reply.has_code("334") {
            return Err(SmtpError::Authentication);
        }

        let reply = connection.command(&SmtpCommand::auth_response(&self.config.username))?;
        if !reply.has_code("334") {
            return Err(SmtpError::Authentication);
        }

        let reply = connection.command(&SmtpCommand::auth_response(&self.config.password))?;
        if !reply.has_code("235") {
            return Err(SmtpError::Authentication);
        }
        Ok(())
    }
}

/// Tag transport failures with the step they interrupted
fn in_state(state: SmtpState, error: SmtpError) -> SmtpError {
    match error {
        SmtpError::Io(_)
        | SmtpError::ConnectionClosed
        | SmtpError::ReplyTooLong { .. }
        | SmtpError::TooManyReplyLines { .. }
        | SmtpError::Tls(_) => SmtpError::Connection(format!("{state}: {error}")),
        other => other,
    }
}

/// Extension keywords from an EHLO reply. The first line is the server's
/// own greeting and is skipped.
fn capabilities(reply: &SmtpResponse) -> Vec<String> {
    let mut lines: Vec<String> = reply.multiline.clone().unwrap_or_default();
    lines.push(reply.message.clone());
    lines.into_iter().skip(1).collect()
}

/// Host name announced in EHLO
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_owned())
}

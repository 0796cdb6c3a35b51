//! The socket owned by a single send

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use tracing::debug;

use crate::smtp::commands::SmtpCommand;
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::{SmtpResponse, is_continuation};

/// Counts sockets opened and closed, shared between a client and its
/// connections
#[derive(Debug, Default)]
pub struct SocketStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl SocketStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

enum Stream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Stream {
    fn tcp(&self) -> &TcpStream {
        match self {
            Stream::Plain(tcp) => tcp,
            Stream::Tls(tls) => &tls.sock,
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(tcp) => tcp.read(buf),
            Stream::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(tcp) => tcp.write(buf),
            Stream::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Plain(tcp) => tcp.flush(),
            Stream::Tls(tls) => tls.flush(),
        }
    }
}

/// A line-oriented SMTP connection, plain or TLS.
///
/// Every blocking read and write is bounded by the timeout given at open.
/// The socket is closed exactly once, either by [`Connection::close`] or
/// on drop.
pub struct Connection {
    reader: Option<BufReader<Stream>>,
    host: String,
    closed: bool,
    stats: Arc<SocketStats>,
}

impl Connection {
    /// Open a plain TCP connection to `host:port`
    pub fn open(
        host: &str,
        port: u16,
        timeout: Duration,
        stats: Arc<SocketStats>,
    ) -> Result<Self, SmtpError> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| SmtpError::Connection(format!("{host}:{port}: {e}")))?;

        let mut last_error = None;
        let mut tcp = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    tcp = Some(stream);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }

        let tcp = match (tcp, last_error) {
            (Some(tcp), _) => tcp,
            (None, Some(e)) => return Err(SmtpError::Connection(format!("{host}:{port}: {e}"))),
            (None, None) => {
                return Err(SmtpError::Connection(format!(
                    "{host}:{port}: no addresses resolved"
                )));
            }
        };

        stats.opened.fetch_add(1, Ordering::SeqCst);
        let connection = Self {
            reader: Some(BufReader::new(Stream::Plain(tcp))),
            host: host.to_owned(),
            closed: false,
            stats,
        };

        // Deadlines on every read and write, not only the connect
        let socket = connection.stream()?.tcp();
        socket.set_read_timeout(Some(timeout))?;
        socket.set_write_timeout(Some(timeout))?;
        debug!(host, port, "TCP connection established");

        Ok(connection)
    }

    fn stream(&self) -> Result<&Stream, SmtpError> {
        self.reader
            .as_ref()
            .map(BufReader::get_ref)
            .ok_or(SmtpError::ConnectionClosed)
    }

    fn reader(&mut self) -> Result<&mut BufReader<Stream>, SmtpError> {
        self.reader.as_mut().ok_or(SmtpError::ConnectionClosed)
    }

    /// Switch the connection to TLS client mode and finish the handshake
    pub fn upgrade_to_tls(&mut self, config: Arc<ClientConfig>) -> Result<(), SmtpError> {
        let reader = self.reader.take().ok_or(SmtpError::ConnectionClosed)?;
        let tcp = match reader.into_inner() {
            Stream::Plain(tcp) => tcp,
            Stream::Tls(tls) => {
                self.reader = Some(BufReader::new(Stream::Tls(tls)));
                return Ok(());
            }
        };

        let server_name = ServerName::try_from(self.host.as_str())
            .map_err(|e| SmtpError::Tls(format!("invalid server name {}: {e}", self.host)))?
            .to_owned();
        let tls_connection = ClientConnection::new(config, server_name)
            .map_err(|e| SmtpError::Tls(e.to_string()))?;

        let mut tls = StreamOwned::new(tls_connection, tcp);
        while tls.conn.is_handshaking() {
            tls.conn
                .complete_io(&mut tls.sock)
                .map_err(|e| SmtpError::Tls(format!("handshake failed: {e}")))?;
        }

        debug!(host = %self.host, "TLS established");
        self.reader = Some(BufReader::new(Stream::Tls(Box::new(tls))));
        Ok(())
    }

    /// Send one command line
    pub fn send_command(&mut self, command: &SmtpCommand) -> Result<(), SmtpError> {
        debug!(command = %command.redacted(), "C:");
        let writer = self.reader()?.get_mut();
        writer.write_all(command.format().as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Send the message payload followed by the end-of-data marker
    pub fn send_data(&mut self, data: &str) -> Result<(), SmtpError> {
        debug!(bytes = data.len(), "C: <message data>");
        let writer = self.reader()?.get_mut();
        writer.write_all(data.as_bytes())?;
        if !data.is_empty() && !data.ends_with("\r\n") {
            writer.write_all(b"\r\n")?;
        }
        writer.write_all(b".\r\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Read one raw reply line, CRLF stripped
    pub fn read_line(&mut self) -> Result<String, SmtpError> {
        let max = SmtpLimits::REPLY_LINE_MAX_LENGTH;
        let mut buffer = Vec::new();
        let read = self
            .reader()?
            .take(max as u64 + 1)
            .read_until(b'\n', &mut buffer)?;

        if read == 0 {
            return Err(SmtpError::ConnectionClosed);
        }
        if buffer.len() > max && !buffer.ends_with(b"\n") {
            return Err(SmtpError::ReplyTooLong { max });
        }

        let line = String::from_utf8_lossy(&buffer)
            .trim_end_matches(['\r', '\n'])
            .to_owned();
        debug!(line = %line, "S:");
        Ok(line)
    }

    /// Read a complete reply, following continuation lines
    pub fn read_response(&mut self) -> Result<SmtpResponse, SmtpError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let more = is_continuation(&line);
            lines.push(line);
            if !more {
                break;
            }
            if lines.len() >= SmtpLimits::REPLY_MAX_LINES {
                return Err(SmtpError::TooManyReplyLines {
                    max: SmtpLimits::REPLY_MAX_LINES,
                });
            }
        }
        SmtpResponse::from_lines(&lines).ok_or(SmtpError::ConnectionClosed)
    }

    /// Send a command and read its reply
    pub fn command(&mut self, command: &SmtpCommand) -> Result<SmtpResponse, SmtpError> {
        self.send_command(command)?;
        self.read_response()
    }

    /// Close the socket. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(reader) = self.reader.take() {
            match reader.into_inner() {
                Stream::Plain(tcp) => {
                    let _ = tcp.shutdown(Shutdown::Both);
                }
                Stream::Tls(mut tls) => {
                    tls.conn.send_close_notify();
                    let _ = tls.conn.complete_io(&mut tls.sock);
                    let _ = tls.sock.shutdown(Shutdown::Both);
                }
            }
        }

        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        debug!(host = %self.host, "connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Client TLS settings trusting `roots`, or the bundled web PKI roots
pub fn tls_config(roots: Option<&Arc<RootCertStore>>) -> Result<Arc<ClientConfig>, SmtpError> {
    let roots = match roots {
        Some(roots) => Arc::clone(roots),
        None => Arc::new(RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        }),
    };
    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| SmtpError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();
    Ok(Arc::new(config))
}

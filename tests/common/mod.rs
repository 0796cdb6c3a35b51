//! Scripted SMTP server for client and dispatcher tests

#![allow(dead_code)]

use otpmail::SmtpResponse;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig, ServerConnection, StreamOwned};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

/// Replies the server gives at each step
#[derive(Debug, Clone)]
pub struct Script {
    pub greeting: SmtpResponse,
    pub ehlo: SmtpResponse,
    pub starttls: SmtpResponse,
    /// Replies to AUTH LOGIN, the username and the password
    pub auth: [SmtpResponse; 3],
    pub mail_from: SmtpResponse,
    pub rcpt_to: SmtpResponse,
    pub data: SmtpResponse,
    /// Reply after the end-of-data marker
    pub accepted: SmtpResponse,
    /// Hang up instead of replying to the command with this verb
    pub hang_up_on: Option<&'static str>,
    /// Accept the connection and never say anything
    pub silent: bool,
    /// Server side TLS, used after a 220 reply to STARTTLS
    pub tls: Option<Arc<ServerConfig>>,
    /// Start TLS right after accepting, before the greeting
    pub implicit_tls: bool,
}

pub fn reply(code: &str, message: &str) -> SmtpResponse {
    SmtpResponse::new(code, message)
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: reply("220", "test.local ESMTP ready"),
            ehlo: SmtpResponse::new_multiline(
                "250",
                "AUTH LOGIN PLAIN",
                vec!["test.local Hello".to_owned(), "8BITMIME".to_owned()],
            ),
            starttls: reply("454", "TLS not available"),
            auth: [
                reply("334", "VXNlcm5hbWU6"),
                reply("334", "UGFzc3dvcmQ6"),
                reply("235", "Authentication successful"),
            ],
            mail_from: reply("250", "OK"),
            rcpt_to: reply("250", "OK"),
            data: reply("354", "End data with <CR><LF>.<CR><LF>"),
            accepted: reply("250", "OK queued"),
            hang_up_on: None,
            silent: false,
            tls: None,
            implicit_tls: false,
        }
    }
}

/// Everything the server saw on one connection
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    /// Command lines in order, including AUTH payload lines
    pub commands: Vec<String>,
    /// Raw lines between DATA and the end-of-data marker
    pub data: Vec<String>,
    /// The client closed its side of the socket
    pub client_closed: bool,
    /// Index into `commands` of the first command read over TLS
    pub tls_from: Option<usize>,
}

impl Transcript {
    pub fn verbs(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|c| {
                let upper = c.to_uppercase();
                ["MAIL FROM", "RCPT TO", "AUTH LOGIN"]
                    .iter()
                    .find(|verb| upper.starts_with(*verb))
                    .map(|verb| verb.to_string())
                    .unwrap_or_else(|| upper.split_whitespace().next().unwrap_or("").to_owned())
            })
            .collect()
    }

    pub fn data_text(&self) -> String {
        self.data.join("\n")
    }
}

pub struct ScriptedServer {
    pub port: u16,
    rx: mpsc::Receiver<Transcript>,
}

impl ScriptedServer {
    /// Serve exactly one connection with `script`
    pub fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let transcript = handle_client(stream, &script);
                let _ = tx.send(transcript);
            }
        });

        Self { port, rx }
    }

    /// Wait for the connection to finish
    pub fn transcript(&self) -> Transcript {
        self.rx
            .recv_timeout(Duration::from_secs(10))
            .expect("server saw no connection")
    }

    /// Whether any client connected within `wait`
    pub fn was_contacted(&self, wait: Duration) -> bool {
        self.rx.recv_timeout(wait).is_ok()
    }
}

/// A self-signed certificate for `127.0.0.1`: the server side config and
/// a root store that trusts it
pub fn tls_identity() -> (Arc<ServerConfig>, RootCertStore) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_owned(), "localhost".to_owned()])
            .unwrap();
    let cert_der = CertificateDer::from(cert.der().to_vec());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let mut roots = RootCertStore::empty();
    roots.add(cert_der.clone()).unwrap();

    let config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .unwrap();
    (Arc::new(config), roots)
}

enum ServerStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl ServerStream {
    fn into_tls(self, config: &Arc<ServerConfig>) -> Self {
        match self {
            ServerStream::Plain(tcp) => {
                let connection = ServerConnection::new(Arc::clone(config)).unwrap();
                ServerStream::Tls(Box::new(StreamOwned::new(connection, tcp)))
            }
            tls => tls,
        }
    }

    fn shutdown(&self) {
        let tcp = match self {
            ServerStream::Plain(tcp) => tcp,
            ServerStream::Tls(tls) => &tls.sock,
        };
        let _ = tcp.shutdown(Shutdown::Both);
    }
}

impl Read for ServerStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ServerStream::Plain(tcp) => tcp.read(buf),
            ServerStream::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for ServerStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ServerStream::Plain(tcp) => tcp.write(buf),
            ServerStream::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ServerStream::Plain(tcp) => tcp.flush(),
            ServerStream::Tls(tls) => tls.flush(),
        }
    }
}

fn send(reader: &mut BufReader<ServerStream>, response: &SmtpResponse) {
    let stream = reader.get_mut();
    let _ = stream.write_all(response.format().as_bytes());
    let _ = stream.flush();
}

fn handle_client(tcp: TcpStream, script: &Script) -> Transcript {
    let mut transcript = Transcript::default();
    tcp.set_read_timeout(Some(Duration::from_secs(10))).unwrap();

    let mut stream = ServerStream::Plain(tcp);
    if script.implicit_tls {
        let config = script.tls.as_ref().expect("implicit TLS needs a server config");
        stream = stream.into_tls(config);
        transcript.tls_from = Some(0);
    }
    let mut reader = BufReader::new(stream);

    if script.silent {
        let mut sink = Vec::new();
        let _ = reader.read_to_end(&mut sink);
        transcript.client_closed = true;
        return transcript;
    }

    send(&mut reader, &script.greeting);

    let mut auth_step: Option<usize> = None;
    let mut in_data = false;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                transcript.client_closed = true;
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
        let text = line.trim_end_matches(['\r', '\n']).to_owned();

        if in_data {
            if text == "." {
                in_data = false;
                send(&mut reader, &script.accepted);
            } else {
                transcript.data.push(text);
            }
            continue;
        }

        transcript.commands.push(text.clone());

        if let Some(step) = auth_step {
            send(&mut reader, &script.auth[step]);
            auth_step = if step < 2 && script.auth[step].code == "334" {
                Some(step + 1)
            } else {
                None
            };
            continue;
        }

        let upper = text.to_uppercase();
        if let Some(verb) = script.hang_up_on {
            if upper.starts_with(verb) {
                reader.get_ref().shutdown();
                break;
            }
        }

        if upper.starts_with("EHLO") {
            send(&mut reader, &script.ehlo);
        } else if upper.starts_with("STARTTLS") {
            send(&mut reader, &script.starttls);
            if let (true, Some(config)) = (script.starttls.code == "220", &script.tls) {
                // Nothing may follow STARTTLS before the handshake, so the
                // read buffer is empty here
                let plain = reader.into_inner();
                reader = BufReader::new(plain.into_tls(config));
                transcript.tls_from = Some(transcript.commands.len());
            }
        } else if upper.starts_with("AUTH LOGIN") {
            send(&mut reader, &script.auth[0]);
            if script.auth[0].code == "334" {
                auth_step = Some(1);
            }
        } else if upper.starts_with("MAIL FROM") {
            send(&mut reader, &script.mail_from);
        } else if upper.starts_with("RCPT TO") {
            send(&mut reader, &script.rcpt_to);
        } else if upper.starts_with("DATA") {
            send(&mut reader, &script.data);
            in_data = script.data.code == "354";
        } else if upper.starts_with("QUIT") {
            send(&mut reader, &reply("221", "Bye"));
        } else {
            send(&mut reader, &reply("500", "Syntax error, command unrecognized"));
        }
    }

    transcript
}

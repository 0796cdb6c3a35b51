//! SMTP client implementation

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod response;
pub mod session;

pub use client::SmtpClient;
pub use commands::SmtpCommand;
pub use config::{Encryption, SmtpConfig};
pub use connection::SocketStats;
pub use error::{SendResult, SmtpError, SmtpLimits};
pub use message::Message;
pub use response::SmtpResponse;
pub use session::{SmtpSession, SmtpState};

//! Local mail submission, used when no SMTP host is configured

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

use crate::smtp::Message;

pub const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

#[derive(Error, Debug)]
pub enum LocalMailError {
    #[error("failed to run {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write message: {0}")]
    Write(#[source] std::io::Error),

    #[error("sendmail exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
}

/// The host's own mail submission mechanism
pub trait LocalTransport: Send + Sync {
    fn submit(&self, message: &Message) -> Result<(), LocalMailError>;
}

impl<T: LocalTransport + ?Sized> LocalTransport for Box<T> {
    fn submit(&self, message: &Message) -> Result<(), LocalMailError> {
        (**self).submit(message)
    }
}

/// The minimal header set for local submission
pub fn local_headers(message: &Message) -> Vec<String> {
    vec![
        "MIME-Version: 1.0".to_owned(),
        "Content-Type: text/html; charset=UTF-8".to_owned(),
        format!("From: {}", message.from_header()),
        format!("Reply-To: {}", message.from_email.trim()),
    ]
}

/// Full message text as handed to `sendmail -t`
pub fn render_local(message: &Message) -> String {
    let mut text = format!(
        "To: {}\nSubject: {}\n",
        single_line(&message.recipient),
        single_line(&message.subject)
    );
    for header in local_headers(message) {
        text.push_str(&single_line(&header));
        text.push('\n');
    }
    text.push('\n');
    text.push_str(&message.body.replace("\r\n", "\n"));
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn single_line(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Pipes the message into a sendmail-compatible binary
#[derive(Debug, Clone)]
pub struct Sendmail {
    path: PathBuf,
}

impl Sendmail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for Sendmail {
    fn default() -> Self {
        Self::new(DEFAULT_SENDMAIL_PATH)
    }
}

impl LocalTransport for Sendmail {
    fn submit(&self, message: &Message) -> Result<(), LocalMailError> {
        let path = self.path.display().to_string();
        debug!(path = %path, recipient = %message.recipient, "submitting via sendmail");

        let mut child = Command::new(&self.path)
            .args(["-t", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LocalMailError::Spawn {
                path: path.clone(),
                source,
            })?;

        // The child is always reaped, even after a failed write
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(render_local(message).as_bytes()),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|source| LocalMailError::Spawn { path, source })?;
        written.map_err(LocalMailError::Write)?;

        if output.status.success() {
            Ok(())
        } else {
            Err(LocalMailError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::new(
            "user@example.com",
            "Your code",
            "<p>123456</p>\r\n<p>bye</p>",
            "portal@example.com",
            "Portal",
        )
    }

    #[test]
    fn test_local_headers() {
        let headers = local_headers(&message());
        assert_eq!(
            headers,
            vec![
                "MIME-Version: 1.0",
                "Content-Type: text/html; charset=UTF-8",
                "From: \"Portal\" <portal@example.com>",
                "Reply-To: portal@example.com",
            ]
        );
    }

    #[test]
    fn test_render_local() {
        let text = render_local(&message());
        assert!(text.starts_with("To: user@example.com\nSubject: Your code\n"));
        assert!(text.ends_with("\n\n<p>123456</p>\n<p>bye</p>\n"));
    }

    #[test]
    fn test_missing_binary() {
        let sendmail = Sendmail::new("/nonexistent/sendmail");
        let err = sendmail.submit(&message()).unwrap_err();
        assert!(matches!(err, LocalMailError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_submit_pipes_message() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.eml");
        let script = dir.path().join("sendmail");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > {0}.args\ncat > {0}\n", out.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        Sendmail::new(&script).submit(&message()).unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written, render_local(&message()));
        let args = std::fs::read_to_string(format!("{}.args", out.display())).unwrap();
        assert_eq!(args.trim(), "-t -i");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sendmail");
        std::fs::write(&script, "#!/bin/sh\ncat > /dev/null\necho refused >&2\nexit 75\n")
            .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = Sendmail::new(&script).submit(&message()).unwrap_err();
        match err {
            LocalMailError::Exit { stderr, .. } => assert_eq!(stderr, "refused"),
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Zombie children of this process whose command name is `name`
    #[cfg(target_os = "linux")]
    fn zombie_children(name: &str) -> usize {
        let me = std::process::id().to_string();
        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                let Some((head, tail)) = stat.rsplit_once(") ") else {
                    return false;
                };
                let comm = head.split_once(" (").map(|(_, comm)| comm);
                let mut fields = tail.split_whitespace();
                let state = fields.next();
                let ppid = fields.next();
                comm == Some(name) && state == Some("Z") && ppid == Some(me.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_still_reaps_child() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("early-exit");
        std::fs::write(&script, "#!/bin/sh\nexec 0<&-\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut big = message();
        big.body = "x".repeat(4 * 1024 * 1024);
        let err = Sendmail::new(&script).submit(&big).unwrap_err();
        assert!(matches!(err, LocalMailError::Write(_)), "unexpected error: {err}");
        assert_eq!(zombie_children("early-exit"), 0);
    }
}

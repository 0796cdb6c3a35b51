//! Outgoing email message

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Local};

/// A single-part HTML email to exactly one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub recipient: String,
    pub subject: String,
    /// HTML body
    pub body: String,
    pub from_email: String,
    pub from_name: String,
}

impl Message {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            from_email: from_email.into(),
            from_name: from_name.into(),
        }
    }

    /// `"Name" <address>`, or the bare address when no name is set
    pub fn from_header(&self) -> String {
        let address = header_value(&self.from_email);
        if self.from_name.trim().is_empty() {
            address
        } else {
            format!("{} <{}>", encode_display_name(&self.from_name), address)
        }
    }

    /// Header block, without the separating blank line
    pub fn headers(&self, date: DateTime<Local>) -> Vec<String> {
        vec![
            format!("Date: {}", date.to_rfc2822()),
            format!("From: {}", self.from_header()),
            format!("To: {}", header_value(&self.recipient)),
            format!("Subject: {}", encode_header_text(&self.subject)),
            "MIME-Version: 1.0".to_owned(),
            "Content-Type: text/html; charset=UTF-8".to_owned(),
            "Content-Transfer-Encoding: 8bit".to_owned(),
        ]
    }

    /// The DATA payload: headers, blank line and body, CRLF terminated.
    ///
    /// Body lines starting with `.` are dot-stuffed, so the payload never
    /// contains the end-of-data marker. The marker itself is not included.
    pub fn to_data(&self, date: DateTime<Local>) -> String {
        let mut data = String::new();
        for header in self.headers(date) {
            data.push_str(&header);
            data.push_str("\r\n");
        }
        data.push_str("\r\n");
        for line in normalize_lines(&self.body) {
            if line.starts_with('.') {
                data.push('.');
            }
            data.push_str(line);
            data.push_str("\r\n");
        }
        data
    }
}

/// Split on any line ending (`\r\n`, `\n` or a lone `\r`)
fn normalize_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        lines.extend(line.split('\r'));
    }
    if text.ends_with('\n') {
        lines.pop();
    }
    lines
}

fn header_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .trim()
        .to_owned()
}

/// RFC 2047 encoded-word for non-ASCII header text
fn encode_header_text(value: &str) -> String {
    let value = header_value(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

fn encode_display_name(name: &str) -> String {
    let name = header_value(name);
    if name.is_ascii() {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        encode_header_text(&name)
    }
}

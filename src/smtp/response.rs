//! SMTP reply handling

/// A reply read from the server, possibly spanning several lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    /// The SMTP reply code (e.g., "250", "354", "550"), taken from the
    /// first three characters of the final line
    pub code: String,
    /// Text of the final line, after the code and separator
    pub message: String,
    /// Text of the preceding continuation lines, for EHLO style replies
    pub multiline: Option<Vec<String>>,
}

/// Split a raw reply line into its code, continuation flag and text.
///
/// Only the first three characters are treated as the code. The line
/// continues when the 4th character is a hyphen.
pub fn split_line(line: &str) -> (&str, bool, &str) {
    let line = line.trim_end_matches(['\r', '\n']);
    let code = line.get(..3).unwrap_or(line);
    let continues = line.as_bytes().get(3) == Some(&b'-');
    let text = line.get(4..).unwrap_or("");
    (code, continues, text)
}

/// Whether another line of the same reply follows this one
pub fn is_continuation(line: &str) -> bool {
    split_line(line).1
}

impl SmtpResponse {
    /// Create a new single line reply
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_owned(),
            message: message.to_owned(),
            multiline: None,
        }
    }

    /// Create a new multiline reply
    pub fn new_multiline(code: &str, message: &str, lines: Vec<String>) -> Self {
        Self {
            code: code.to_owned(),
            message: message.to_owned(),
            multiline: Some(lines),
        }
    }

    /// Build a reply from the raw lines read off the wire.
    /// Returns `None` for an empty line list.
    pub fn from_lines(lines: &[String]) -> Option<Self> {
        let (last, rest) = lines.split_last()?;
        let (code, _, message) = split_line(last);
        let mut response = Self::new(code, message);
        if !rest.is_empty() {
            response.multiline = Some(
                rest.iter()
                    .map(|line| split_line(line).2.to_owned())
                    .collect(),
            );
        }
        Some(response)
    }

    /// Check the reply code against an expected one
    pub fn has_code(&self, expected: &str) -> bool {
        self.code == expected
    }

    /// The whole reply as one line, for error reporting
    pub fn text(&self) -> String {
        let text = match &self.multiline {
            Some(lines) if !lines.is_empty() => {
                format!("{} {} {}", self.code, lines.join(" "), self.message)
            }
            _ => format!("{} {}", self.code, self.message),
        };
        text.trim_end().to_owned()
    }

    /// Format the reply the way a server writes it on the wire
    pub fn format(&self) -> String {
        match &self.multiline {
            Some(lines) => {
                let mut result = String::new();
                for line in lines {
                    result.push_str(&format!("{}-{}\r\n", self.code, line));
                }
                result.push_str(&format!("{} {}\r\n", self.code, self.message));
                result
            }
            None => format!("{} {}\r\n", self.code, self.message),
        }
    }
}

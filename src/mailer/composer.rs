//! Email subject and body rendering

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local};

pub const DEFAULT_SUBJECT: &str = "Your {type} verification code";

/// What the code verifies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpKind {
    Document,
    Bill,
}

impl OtpKind {
    pub fn label(&self) -> &'static str {
        match self {
            OtpKind::Document => "Document",
            OtpKind::Bill => "Bill",
        }
    }
}

impl fmt::Display for OtpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OtpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(OtpKind::Document),
            "bill" => Ok(OtpKind::Bill),
            other => Err(format!("unknown verification type: {other}")),
        }
    }
}

/// Replace `{otp}`, `{type}` and `{expiry}` in `template`
pub fn substitute(template: &str, otp: &str, kind: OtpKind, expiry_minutes: u32) -> String {
    template
        .replace("{otp}", otp)
        .replace("{type}", kind.label())
        .replace("{expiry}", &expiry_minutes.to_string())
}

/// Subject line; an empty template falls back to [`DEFAULT_SUBJECT`]
pub fn render_subject(
    template: Option<&str>,
    otp: &str,
    kind: OtpKind,
    expiry_minutes: u32,
) -> String {
    let template = template
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_SUBJECT);
    substitute(template, otp, kind, expiry_minutes)
}

/// HTML body from the caller's template, or the built-in layout
pub fn render_body(
    template: Option<&str>,
    otp: &str,
    kind: OtpKind,
    expiry_minutes: u32,
) -> String {
    render_body_for_year(template, otp, kind, expiry_minutes, Local::now().year())
}

pub fn render_body_for_year(
    template: Option<&str>,
    otp: &str,
    kind: OtpKind,
    expiry_minutes: u32,
    year: i32,
) -> String {
    match template.filter(|t| !t.trim().is_empty()) {
        Some(template) => substitute(template, otp, kind, expiry_minutes),
        None => default_layout(otp, kind, expiry_minutes, year),
    }
}

fn default_layout(otp: &str, kind: OtpKind, expiry_minutes: u32, year: i32) -> String {
    let label = kind.label();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>{label} Verification</title>
</head>
<body style="margin:0;padding:0;background:#f4f6f8;font-family:Arial,Helvetica,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="padding:32px 0;">
<tr><td align="center">
<table width="480" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;padding:32px;">
<tr><td style="font-size:20px;font-weight:bold;color:#1f2933;">{label} Verification</td></tr>
<tr><td style="padding-top:16px;font-size:14px;color:#3e4c59;">Use the code below to verify your {label_lower}.</td></tr>
<tr><td align="center" style="padding:24px 0;">
<span style="display:inline-block;font-size:32px;letter-spacing:8px;font-weight:bold;color:#0b69a3;background:#e6f1fa;padding:12px 24px;border-radius:6px;">{otp}</span>
</td></tr>
<tr><td style="font-size:14px;color:#3e4c59;">This code expires in {expiry_minutes} minutes. If you did not request it, you can ignore this email.</td></tr>
<tr><td style="padding-top:24px;font-size:12px;color:#9aa5b1;">&copy; {year} Verification Portal</td></tr>
</table>
</td></tr>
</table>
</body>
</html>
"#,
        label_lower = label.to_ascii_lowercase(),
    )
}

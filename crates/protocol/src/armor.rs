//! ASCII armor for envelopes
//!
//! ```text
//! Type: kv/secret
//! ModelReference: core/string/v01
//!
//! -----BEGIN CONFIDENTIAL ENVELOPE-----
//! Q0VOVgEA...
//! -----END CONFIDENTIAL ENVELOPE-----
//! ```
//!
//! Headers are informational only. [`dearmor`] skips them and accepts any
//! whitespace (including CRLF) inside the frame.

use crate::envelope::{Envelope, EnvelopeError};
use base64::{engine::general_purpose::STANDARD, Engine};

pub const ARMOR_BEGIN: &str = "-----BEGIN CONFIDENTIAL ENVELOPE-----";
pub const ARMOR_END: &str = "-----END CONFIDENTIAL ENVELOPE-----";
pub const ARMOR_LINE_WIDTH: usize = 64;

/// Armor raw envelope bytes, prefixed with `Key: value` header lines
pub fn armor(envelope: &[u8], headers: &[(String, String)]) -> String {
    let encoded = STANDARD.encode(envelope);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / ARMOR_LINE_WIDTH + 128);

    for (name, value) in headers {
        out.push_str(&single_line(name));
        out.push_str(": ");
        out.push_str(&single_line(value));
        out.push('\n');
    }
    if !headers.is_empty() {
        out.push('\n');
    }

    out.push_str(ARMOR_BEGIN);
    out.push('\n');
    // base64 output is ASCII, so byte chunks are valid UTF-8
    for line in encoded.as_bytes().chunks(ARMOR_LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(ARMOR_END);
    out.push('\n');
    out
}

/// Armor an envelope
pub fn armor_envelope(
    envelope: &Envelope,
    headers: &[(String, String)],
) -> Result<String, EnvelopeError> {
    Ok(armor(&envelope.to_bytes()?, headers))
}

/// Strip the armor and return the raw envelope bytes
pub fn dearmor(text: &str) -> Result<Vec<u8>, EnvelopeError> {
    let begin = text
        .find(ARMOR_BEGIN)
        .ok_or_else(|| EnvelopeError::MalformedArmor("missing BEGIN marker".to_string()))?;
    let body_start = begin + ARMOR_BEGIN.len();
    let body_len = text[body_start..]
        .find(ARMOR_END)
        .ok_or_else(|| EnvelopeError::MalformedArmor("missing END marker".to_string()))?;
    let body = &text[body_start..body_start + body_len];

    let after_end = &text[body_start + body_len + ARMOR_END.len()..];
    if !after_end.trim().is_empty() {
        return Err(EnvelopeError::MalformedArmor(
            "unexpected data after END marker".to_string(),
        ));
    }

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(EnvelopeError::MalformedArmor(
            "armor frame is empty".to_string(),
        ));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| EnvelopeError::MalformedArmor(format!("invalid base64: {}", e)))
}

/// Strip the armor and decode the envelope
pub fn dearmor_envelope(text: &str) -> Result<Envelope, EnvelopeError> {
    Envelope::from_bytes(&dearmor(text)?)
}

/// Read the informational headers in front of the BEGIN marker
///
/// For display only; nothing here is authenticated.
pub fn armor_headers(text: &str) -> Vec<(String, String)> {
    let preamble = match text.find(ARMOR_BEGIN) {
        Some(idx) => &text[..idx],
        None => return Vec::new(),
    };
    preamble
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

//! Drift sentinel written into a resource's ciphertext slot
//!
//! When the remote content no longer matches the decrypted value, the
//! engine replaces the stored armored envelope with this marker so the next
//! plan shows a diff and drives an update.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DRIFT_MESSAGE: Regex =
        Regex::new(r"(?s)^---- DRIFT IN .* CONFIDENTIAL DATA ----$").unwrap();
}

pub fn create_drift_message(tag: &str) -> String {
    format!("---- DRIFT IN {} CONFIDENTIAL DATA ----", tag)
}

pub fn is_drift_message(value: &str) -> bool {
    DRIFT_MESSAGE.is_match(value)
}

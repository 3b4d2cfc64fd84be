//! Lifecycle diagnostics
//!
//! Lifecycle operations never return `Err`. They report through
//! [`Diagnostics`]: a single error stops the call, warnings ride along with a
//! successful result. Details name the offending field and never carry
//! plaintext.

use std::fmt;

pub const SUMMARY_EXPIRED: &str = "Ciphertext has expired";
pub const SUMMARY_EXPIRY_IMMINENT: &str = "Ciphertext will expire soon";
pub const SUMMARY_CREATE_WINDOW_CLOSED: &str = "Ciphertext create window has closed";
pub const SUMMARY_CREATE_WINDOW_IMMINENT: &str = "Ciphertext create window is about to expire";
pub const SUMMARY_IMPLICIT_MOVE: &str = "Implicit object move";
pub const SUMMARY_PROVIDER_CONSTRAINT: &str = "Provider constraint violation";
pub const SUMMARY_USES_EXHAUSTED: &str =
    "Ciphertext has been used all time it was allowed to do so";
pub const SUMMARY_USES_INSECURE: &str = "Insecure use of limited-use ciphertext";
pub const SUMMARY_LAST_USE: &str = "Last use of ciphertext";
pub const SUMMARY_MISSING_READ_ERROR: &str = "Missing read error reason";
pub const SUMMARY_DECRYPT_FAILED: &str = "Cannot decrypt confidential data";
pub const SUMMARY_CONFIGURATION: &str = "Invalid provider configuration";
pub const SUMMARY_CREATE_FAILED: &str = "Error creating object";
pub const SUMMARY_READ_FAILED: &str = "Error reading object";
pub const SUMMARY_UPDATE_FAILED: &str = "Error updating object";
pub const SUMMARY_DELETE_FAILED: &str = "Error deleting object";
pub const SUMMARY_TRACKING_FAILED: &str = "Object tracking failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One user-facing finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            suggestion: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Error diagnostic carrying a failed operation's message and hint
    pub fn from_error(summary: impl Into<String>, err: &crate::ConfidentialError) -> Self {
        let diagnostic = Self::error(summary, err.to_string());
        match err.suggestion() {
            Some(suggestion) => diagnostic.with_suggestion(suggestion),
            None => diagnostic,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}: {}", level, self.summary, self.detail)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::error(summary, detail));
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::warning(summary, detail));
    }

    pub fn has_error(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when some diagnostic's summary contains `needle`
    pub fn contains_summary(&self, needle: &str) -> bool {
        self.0.iter().any(|d| d.summary.contains(needle))
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

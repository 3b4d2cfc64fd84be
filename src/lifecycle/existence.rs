use crate::diagnostics::Diagnostics;

/// Outcome of looking up the remote object behind a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResourceExistence {
    #[default]
    CheckNotAttempted,
    Exists,
    NotFound,
    NotYetCreated,
    CheckError,
    /// Object exists but its content no longer matches the ciphertext
    ConfidentialDataDrift,
}

/// What a `do_read` found
#[derive(Debug)]
pub struct ReadResult<R> {
    pub object: Option<R>,
    pub existence: ResourceExistence,
    pub diagnostics: Diagnostics,
}

impl<R> ReadResult<R> {
    pub fn exists(object: R) -> Self {
        Self {
            object: Some(object),
            existence: ResourceExistence::Exists,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn drift(object: R) -> Self {
        Self {
            object: Some(object),
            existence: ResourceExistence::ConfidentialDataDrift,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn not_found() -> Self {
        Self::without_object(ResourceExistence::NotFound)
    }

    pub fn not_yet_created() -> Self {
        Self::without_object(ResourceExistence::NotYetCreated)
    }

    /// Lookup failed; `diagnostics` should say why
    pub fn check_error(diagnostics: Diagnostics) -> Self {
        Self {
            object: None,
            existence: ResourceExistence::CheckError,
            diagnostics,
        }
    }

    fn without_object(existence: ResourceExistence) -> Self {
        Self {
            object: None,
            existence,
            diagnostics: Diagnostics::new(),
        }
    }
}

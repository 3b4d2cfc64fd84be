//! Confidential Prelude
//!
//! The prelude module provides a convenient way to import commonly used types and traits.
//!
//! # Example
//!
//! ```rust
//! use az_confidential::prelude::*;
//!
//! # fn example(pem: &[u8]) -> Result<(), ConfidentialError> {
//! let helper = ConfidentialDataHelper::<String>::new(ConfidentialObjectType::KeyVaultSecret);
//! let params = ContentWrappingParams::from_public_key_pem(pem)?
//!     .num_uses(3)
//!     .placement_label("az-c-keyvault://vault-a@secrets=db-password");
//! let exported = helper.export(&"hunter2".to_string(), &params)?;
//! println!("{}", exported.armored);
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use crate::config::{ConstraintMode, ProviderConfig};
pub use crate::coordinate::{
    AzKeyVaultObjectCoordinate, AzKeyVaultObjectVersionedCoordinate, ObjectType,
    WrappingKeyCoordinate,
};
pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
pub use crate::envelope::{decrypt_envelope, encrypt_envelope};
pub use crate::factory::{AzClientsFactory, DefaultClientsFactory};
pub use crate::lifecycle::{
    ConfidentialMaterial, ConfidentialResource, ReadResult, ReadUpdate, ResourceExistence,
    ResourceResponse, Specializer,
};
pub use crate::model::{
    ConfidentialDataHeader, ConfidentialDataHelper, ConfidentialObjectType, ConfidentialValue,
    ContentWrappingParams,
};
pub use crate::policy::SecondaryProtectionParameters;
pub use crate::ports::{KeyVaultObjectClient, RsaDecrypter, RsaPrivateKeyDecrypter};
pub use crate::specializers::{
    KeyVaultKeySpecializer, KeyVaultObjectModel, KeyVaultSecretSpecializer,
};
pub use crate::tracking::{InMemoryObjectTracker, ObjectTracker, UseReservation};
pub use crate::ConfidentialError;

// Re-export protocol types
pub use confidential_protocol::{armor_envelope, dearmor_envelope, Envelope};

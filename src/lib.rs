//! Confidential-material envelopes and the resource lifecycle engine built on
//! them.
//!
//! Values are sealed offline against an RSA wrapping key ([`envelope`]),
//! labelled with a typed header ([`model`]) carrying secondary protection
//! ([`policy`]), and unwrapped only when the lifecycle engine ([`lifecycle`])
//! materializes them into Key Vault through the [`ports`].

pub mod config;
pub mod coordinate;
pub mod diagnostics;
pub mod envelope;
mod error;
pub mod factory;
pub mod lifecycle;
pub mod model;
pub mod policy;
pub mod ports;
pub mod prelude;
pub mod specializers;
pub mod tracking;

pub use error::ConfidentialError;

pub use confidential_crypto as crypto;
pub use confidential_protocol as protocol;

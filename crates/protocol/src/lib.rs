//! Confidential Envelope Protocol Types
//!
//! This crate contains the wire format for confidential envelopes:
//! - The versioned binary envelope layout and its strict decoder
//! - The AES parameter record wrapped inside hybrid envelopes
//! - ASCII armor with informational headers
//!
//! This crate contains NO cryptographic operations and NO I/O.
//! It is purely focused on data structures and serialization.

pub mod armor;
pub mod binary;
pub mod envelope;

// Re-export commonly used types
pub use armor::{
    armor, armor_envelope, armor_headers, dearmor, dearmor_envelope, ARMOR_BEGIN, ARMOR_END,
    ARMOR_LINE_WIDTH,
};
pub use binary::{BinaryRead, BinaryWrite};
pub use envelope::{
    AesData, Envelope, EnvelopeError, ENVELOPE_FIXED_SIZE, ENVELOPE_MAGIC, ENVELOPE_VERSION,
    FLAG_HAS_CEK, HYBRID_PREFIX_SIZE,
};

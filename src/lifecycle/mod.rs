//! Create/read/update/delete for confidential remote objects

pub mod drift;
pub mod engine;
pub mod existence;

pub use drift::{create_drift_message, is_drift_message};
pub use engine::{
    ConfidentialMaterial, ConfidentialResource, ImmutableRu, MutableRu, ReadUpdate,
    ResourceResponse, Specializer,
};
pub use existence::{ReadResult, ResourceExistence};

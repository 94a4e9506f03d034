//! Shared ids and the interfaces to external collaborators

pub mod types;
pub mod traits;

//! Domain layer for Revere.
//!
//! Models, collaborator traits and the shared error type used by the
//! session/membership core. Nothing in this crate performs I/O.

pub mod config;
pub mod error;
pub mod identity;
pub mod mode;
pub mod organization;
pub mod state;

// Re-export common error type
pub use error::RevereError;
pub use mode::OperatingMode;

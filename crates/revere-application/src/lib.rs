//! Application layer for Revere.
//!
//! This crate coordinates the domain collaborators into the session and
//! membership bootstrap consumed by every view of the dashboard.

pub mod auth;

pub use auth::{AuthSessionManager, AuthSnapshot};

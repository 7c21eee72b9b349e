//! Identity domain module.
//!
//! - `model`: identity, session and session-change models
//! - `backend`: the identity service collaborator trait

pub mod backend;
pub mod model;

pub use backend::AuthBackend;
pub use model::{AuthEvent, AuthSession, DEMO_ACCESS_TOKEN, DEMO_USER_ID, Identity, SessionChange};

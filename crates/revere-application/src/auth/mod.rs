//! Authentication and organization membership services.
//!
//! # Module Structure
//!
//! - `snapshot`: read model published to the UI (`AuthSnapshot`, `AuthPhase`)
//! - `fetch_guard`: per-user re-entrancy guard for the membership fetch
//! - `manager`: the bootstrap state machine (`AuthSessionManager`)
//!
//! # Usage
//!
//! ```ignore
//! use revere_application::auth::{AuthSessionManager, AuthSnapshot};
//!
//! let manager = AuthSessionManager::new(auth, orgs, store, config.demo).await;
//! manager.activate(OperatingMode::Live).await;
//! let role = manager.snapshot().active_role();
//! ```

mod fetch_guard;
mod manager;
mod snapshot;

#[cfg(test)]
mod manager_test;

// Re-export public API
pub use fetch_guard::{FetchGuard, FetchRefusal, FetchState, FetchTicket};
pub use manager::{AuthSessionManager, FetchOutcome, SkipReason};
pub use snapshot::{AuthPhase, AuthSnapshot, ConnectionStatus};

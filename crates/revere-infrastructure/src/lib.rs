//! Infrastructure adapters: configuration, local state files and the
//! backend HTTP client.

pub mod config_service;
pub mod offline;
pub mod paths;
pub mod state_repository;
pub mod storage;
pub mod supabase;

pub use crate::config_service::ConfigService;
pub use crate::offline::OfflineBackend;
pub use crate::paths::ReverePaths;
pub use crate::state_repository::TomlActiveOrgStore;
pub use crate::supabase::{SupabaseAuthClient, SupabaseRestClient};

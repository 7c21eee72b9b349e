//! Identity backend trait.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::identity::model::{AuthSession, SessionChange};

/// Collaborator interface to the hosted identity service.
///
/// Implementations must map "cannot reach the service" to
/// [`RevereError::Transport`](crate::error::RevereError::Transport) so the
/// session core can tell a disconnected backend from a rejected request.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Returns the current session, or `None` when nobody is signed in.
    async fn get_session(&self) -> Result<Option<AuthSession>>;

    /// Subscribes to session change notifications.
    ///
    /// Each call returns an independent receiver; dropping it unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_out(&self) -> Result<()>;
}

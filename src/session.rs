//! Session gate.
//!
//! Tracks the current authenticated identity and turns provider-pushed auth events
//! into [`IdentityChange`] values for the coordinator. The gate subscribes on
//! construction and unsubscribes when closed or dropped.

use crate::error::AuthError;
use crate::model::Identity;
use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Session as reported by the auth provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl From<Session> for Identity {
    fn from(s: Session) -> Self {
        Identity::new(s.user_id, s.access_token)
    }
}

/// Events pushed by the provider, in emission order.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

/// Live registration with a provider's change feed. Dropping it unsubscribes.
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    pub fn new(rx: broadcast::Receiver<AuthEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the provider is gone.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "auth subscriber lagged; skipping to newest events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// External authentication collaborator.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn get_user(&self) -> Result<Option<Uuid>, AuthError>;
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;
    fn on_auth_state_change(&self) -> AuthSubscription;
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// In-process provider holding a single session, fed from a token on the command
/// line or by tests.
pub struct TokenAuthProvider {
    current: RwLock<Option<Session>>,
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for TokenAuthProvider {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self {
            current: RwLock::new(None),
            tx,
        }
    }
}

impl TokenAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        let (tx, _) = broadcast::channel(32);
        Self {
            current: RwLock::new(Some(session)),
            tx,
        }
    }

    /// Replace the current session and notify subscribers.
    pub async fn sign_in(&self, session: Session) {
        let mut cur = self.current.write().await;
        let refreshed = cur.as_ref().map(|s| s.user_id) == Some(session.user_id);
        *cur = Some(session.clone());
        let ev = if refreshed {
            AuthEvent::TokenRefreshed(session)
        } else {
            AuthEvent::SignedIn(session)
        };
        // No subscribers is fine.
        let _ = self.tx.send(ev);
    }
}

#[async_trait]
impl AuthProvider for TokenAuthProvider {
    async fn get_user(&self) -> Result<Option<Uuid>, AuthError> {
        Ok(self.current.read().await.as_ref().map(|s| s.user_id))
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.current.read().await.clone())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        AuthSubscription::new(self.tx.subscribe())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut cur = self.current.write().await;
        if cur.take().is_some() {
            let _ = self.tx.send(AuthEvent::SignedOut);
        }
        Ok(())
    }
}

/// Result of applying one auth event to the gate.
#[derive(Debug, Clone)]
pub struct IdentityChange {
    pub identity: Option<Identity>,
    /// False when only the credential rotated for the same user.
    pub user_changed: bool,
}

pub struct SessionGate {
    provider: std::sync::Arc<dyn AuthProvider>,
    sub: Option<AuthSubscription>,
    current: Option<Identity>,
}

impl SessionGate {
    /// Subscribe to the provider, then read the initial identity. A failing read
    /// leaves the gate unauthenticated.
    pub async fn connect(provider: std::sync::Arc<dyn AuthProvider>) -> Self {
        let sub = provider.on_auth_state_change();
        let current = match Self::read_identity(provider.as_ref()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "identity lookup failed; showing sign-in");
                None
            }
        };
        Self {
            provider,
            sub: Some(sub),
            current,
        }
    }

    async fn read_identity(provider: &dyn AuthProvider) -> Result<Option<Identity>, AuthError> {
        if provider.get_user().await?.is_none() {
            return Ok(None);
        }
        Ok(provider.get_session().await?.map(Identity::from))
    }

    pub fn current_identity(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    /// Wait for the provider's next event and apply it. `None` once the gate is
    /// closed or the provider dropped its feed.
    pub async fn next_change(&mut self) -> Option<IdentityChange> {
        let ev = self.sub.as_mut()?.recv().await;
        match ev {
            Some(ev) => Some(self.apply(ev)),
            None => {
                self.sub = None;
                None
            }
        }
    }

    /// Apply one event; exposed so callers holding an event can feed it directly.
    pub fn apply(&mut self, ev: AuthEvent) -> IdentityChange {
        let before = self.current.as_ref().map(|i| i.user_id);
        self.current = match ev {
            AuthEvent::SignedIn(s) | AuthEvent::TokenRefreshed(s) => Some(s.into()),
            AuthEvent::SignedOut => None,
        };
        let after = self.current.as_ref().map(|i| i.user_id);
        IdentityChange {
            identity: self.current.clone(),
            user_changed: before != after,
        }
    }

    /// Sign out through the provider and drop the local identity immediately.
    pub async fn sign_out(&mut self) -> Result<IdentityChange, AuthError> {
        self.provider.sign_out().await?;
        Ok(self.apply(AuthEvent::SignedOut))
    }

    pub fn close(&mut self) {
        if let Some(sub) = self.sub.take() {
            sub.unsubscribe();
        }
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        self.close();
    }
}

//! Authenticated identity seam.
//!
//! The sync layer never authenticates anyone; it only reacts to identity
//! presence/absence transitions and the account id they carry. The
//! [`IdentityProvider`] trait is the boundary to whatever auth system the
//! application embeds; [`LocalIdentity`] is the in-process implementation
//! used by the CLI (account taken from config) and by tests.

use tokio::sync::broadcast;

/// Identifier of an authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an account identifier from a string representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this account id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors produced by identity operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The backend rejected the credentials or operation.
    #[error("identity operation rejected: {0}")]
    Rejected(String),
    /// There is no signed-in identity to sign out of.
    #[error("not signed in")]
    NotSignedIn,
}

/// An identity presence/absence transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// An account became active.
    SignedIn(AccountId),
    /// The active account went away.
    SignedOut,
}

/// Source of the authenticated identity.
///
/// Implementations supply the current account (if any) and a broadcast
/// stream of sign-in/sign-out transitions. The sync coordinator consumes
/// only these; the credential flows behind `sign_up`/`sign_in` belong to
/// the embedding application.
pub trait IdentityProvider: Send + Sync {
    /// The currently active account, if signed in.
    fn current(&self) -> Option<AccountId>;

    /// Subscribes to identity transitions.
    fn events(&self) -> broadcast::Receiver<IdentityEvent>;

    /// Creates an account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Rejected`] if the backend refuses the
    /// operation.
    fn sign_up(&self, account: &str, secret: &str) -> Result<(), IdentityError>;

    /// Signs an existing account in.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Rejected`] if the backend refuses the
    /// credentials.
    fn sign_in(&self, account: &str, secret: &str) -> Result<(), IdentityError>;

    /// Signs the active account out.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotSignedIn`] if no account is active.
    fn sign_out(&self) -> Result<(), IdentityError>;
}

/// In-process identity provider.
///
/// Accepts any non-empty account/secret pair — it exists to drive the
/// presence/absence state machine, not to gatekeep. A broadcast channel
/// fans transitions out to every subscriber.
pub struct LocalIdentity {
    current: parking_lot::Mutex<Option<AccountId>>,
    events: broadcast::Sender<IdentityEvent>,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentity {
    /// Creates a provider with no active identity.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current: parking_lot::Mutex::new(None),
            events,
        }
    }

    /// Creates a provider already signed in to `account`.
    #[must_use]
    pub fn signed_in(account: AccountId) -> Self {
        let provider = Self::new();
        *provider.current.lock() = Some(account);
        provider
    }

    fn activate(&self, account: &str) -> Result<(), IdentityError> {
        if account.is_empty() {
            return Err(IdentityError::Rejected("empty account id".to_string()));
        }
        let id = AccountId::new(account);
        *self.current.lock() = Some(id.clone());
        let _ = self.events.send(IdentityEvent::SignedIn(id));
        Ok(())
    }
}

impl IdentityProvider for LocalIdentity {
    fn current(&self) -> Option<AccountId> {
        self.current.lock().clone()
    }

    fn events(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }

    fn sign_up(&self, account: &str, _secret: &str) -> Result<(), IdentityError> {
        self.activate(account)
    }

    fn sign_in(&self, account: &str, _secret: &str) -> Result<(), IdentityError> {
        self.activate(account)
    }

    fn sign_out(&self) -> Result<(), IdentityError> {
        let mut current = self.current.lock();
        if current.take().is_none() {
            return Err(IdentityError::NotSignedIn);
        }
        drop(current);
        let _ = self.events.send(IdentityEvent::SignedOut);
        Ok(())
    }
}

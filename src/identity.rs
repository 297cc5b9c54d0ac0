use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

/// Opaque identity of the current client, produced by an external sign-in
/// bootstrap. The core never inspects it beyond tagging new records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("client identity is already set")]
    AlreadySet,
}

/// Holds the identity once the external bootstrap delivers it.
///
/// Starts empty; operations that need an owner are not issued until a value
/// arrives. The identity changes at most once per process lifetime: a second
/// `set` with the same value is a no-op, a conflicting one is rejected.
#[derive(Debug, Clone)]
pub struct IdentitySlot {
    tx: Arc<watch::Sender<Option<ClientIdentity>>>,
}

impl IdentitySlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, identity: ClientIdentity) -> Result<(), IdentityError> {
        let mut result = Ok(());
        self.tx.send_modify(|current| match current {
            Some(existing) if *existing != identity => result = Err(IdentityError::AlreadySet),
            Some(_) => {}
            None => *current = Some(identity.clone()),
        });
        result
    }

    pub fn get(&self) -> Option<ClientIdentity> {
        self.tx.borrow().clone()
    }

    /// Resolves once an identity is available. Returns immediately if one
    /// already is.
    pub async fn wait(&self) -> ClientIdentity {
        let mut rx = self.tx.subscribe();
        let identity = rx
            .wait_for(Option::is_some)
            .await
            .expect("identity sender kept alive by this slot");
        identity.clone().expect("checked by wait_for")
    }
}

impl Default for IdentitySlot {
    fn default() -> Self {
        Self::new()
    }
}

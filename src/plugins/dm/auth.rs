//! Caller resolution. Authentication itself is someone else's job; the
//! registry only needs to turn a request into a known `User` or refuse it.

use crate::core::error::DmregError;
use crate::core::store::{ThreadStore, User};

/// One request-scoped unit of work. Carries the principal the session layer
/// vouched for, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    principal: Option<String>,
}

impl Request {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn as_user(username: impl Into<String>) -> Self {
        Self {
            principal: Some(username.into()),
        }
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }
}

pub trait AuthGate: Send + Sync {
    /// Resolve the caller. `Unauthenticated` if there is no valid session.
    fn current_user(&self, request: &Request) -> Result<User, DmregError>;
}

/// Trusts the request principal and resolves it against the user directory.
pub struct DirectoryAuth<S> {
    store: S,
}

impl<S: ThreadStore> DirectoryAuth<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: ThreadStore> AuthGate for DirectoryAuth<S> {
    fn current_user(&self, request: &Request) -> Result<User, DmregError> {
        let username = match request.principal().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(DmregError::Unauthenticated(
                    "no session; pass --as <username> or set DMREG_USER".to_string(),
                ));
            }
        };
        self.store.user_by_username(username)?.ok_or_else(|| {
            DmregError::Unauthenticated(format!("session user {username:?} is not registered"))
        })
    }
}

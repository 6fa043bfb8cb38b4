//! Session Module
//!
//! Tracks who is signed in. Every login or logout bumps a generation
//! counter; work started under one generation must not be applied under
//! another.

use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct SessionInner {
    owner_id: Option<String>,
    token: Option<String>,
    generation: u64,
}

// == Session Ticket ==
/// Proof that an operation started for a given owner and generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    owner_id: String,
    generation: u64,
}

impl SessionTicket {
    /// Owner the ticket was issued for.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Session generation the ticket was issued under.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// == Session ==
/// Cloneable handle on the current authentication state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionInner>>,
}

impl Session {
    /// Creates a signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session that is already signed in.
    pub fn signed_in(owner_id: impl Into<String>, token: impl Into<String>) -> Self {
        let session = Self::new();
        session.login(owner_id, token);
        session
    }

    // == Login ==
    /// Switches to `owner_id` and returns the ticket for the new generation.
    pub fn login(&self, owner_id: impl Into<String>, token: impl Into<String>) -> SessionTicket {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.owner_id = Some(owner_id.into());
        inner.token = Some(token.into());
        inner.generation += 1;

        SessionTicket {
            owner_id: inner.owner_id.clone().unwrap_or_default(),
            generation: inner.generation,
        }
    }

    // == Logout ==
    /// Clears the owner and token. Returns the previous owner, if any.
    pub fn logout(&self) -> Option<String> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.token = None;
        inner.generation += 1;
        inner.owner_id.take()
    }

    // == Ticket ==
    /// Ticket for the active owner; None unless both an owner and a token
    /// are present.
    pub fn ticket(&self) -> Option<SessionTicket> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match (&inner.owner_id, &inner.token) {
            (Some(owner_id), Some(_)) => Some(SessionTicket {
                owner_id: owner_id.clone(),
                generation: inner.generation,
            }),
            _ => None,
        }
    }

    /// True if `ticket` still describes the active session.
    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.generation == ticket.generation
            && inner.owner_id.as_deref() == Some(ticket.owner_id.as_str())
            && inner.token.is_some()
    }

    // == Accessors ==
    /// Owner currently signed in, if any.
    pub fn owner_id(&self) -> Option<String> {
        self.read(|inner| inner.owner_id.clone())
    }

    /// Bearer token of the active session, if any.
    pub fn token(&self) -> Option<String> {
        self.read(|inner| inner.token.clone())
    }

    /// True while a token is held.
    pub fn has_auth_token(&self) -> bool {
        self.read(|inner| inner.token.is_some())
    }

    /// Number of logins and logouts so far.
    pub fn generation(&self) -> u64 {
        self.read(|inner| inner.generation)
    }

    fn read<R>(&self, f: impl FnOnce(&SessionInner) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}

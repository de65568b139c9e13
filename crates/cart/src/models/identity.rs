//! Request identity types.
//!
//! Every operation receives an explicit [`RequestIdentity`] value instead of
//! reading ambient request state. The session provider owns token issuance
//! and the memory of "the token from before login"; the engine only consumes
//! both.

use serde::{Deserialize, Serialize};

use verdant_core::{SessionToken, UserId};

use super::CartOwner;

/// The identity attached to one request.
///
/// Carries an anonymous session token and, once the visitor has logged in, an
/// authenticated user id. The user id wins for cart resolution; the session
/// token is ignored for lookup once authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestIdentity {
    /// Authenticated user, if the visitor is logged in.
    pub user: Option<UserId>,
    /// Anonymous session token, if the session provider issued one.
    pub session: Option<SessionToken>,
}

impl RequestIdentity {
    /// Identity for an authenticated user.
    #[must_use]
    pub const fn user(user: UserId) -> Self {
        Self {
            user: Some(user),
            session: None,
        }
    }

    /// Identity for an anonymous visitor.
    #[must_use]
    pub const fn guest(session: SessionToken) -> Self {
        Self {
            user: None,
            session: Some(session),
        }
    }

    /// The cart owner this identity resolves to, user id first.
    ///
    /// Returns `None` when the request carries neither credential; the caller
    /// surfaces that as an identity error.
    #[must_use]
    pub fn owner(&self) -> Option<CartOwner> {
        if let Some(user) = self.user {
            return Some(CartOwner::User(user));
        }
        self.session.clone().map(CartOwner::Guest)
    }
}

/// The session provider's memory of the pre-login anonymous token.
///
/// Remembering "the old session token" across a login event is session
/// bookkeeping with its own lifecycle; the engine consumes it as a capability
/// rather than reimplementing it.
pub trait SessionHandoff: Send + Sync {
    /// The anonymous token the given user held before logging in, if the
    /// session provider still remembers one.
    fn prior_anonymous_token(&self, user: UserId) -> Option<SessionToken>;
}

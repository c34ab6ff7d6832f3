use std::sync::RwLock;

use quizz_core::model::UserId;

/// Supplies the identity of the authenticated user, if any.
///
/// Authentication itself happens outside the engine; score persistence only
/// needs an opaque id to key upserts, and is skipped entirely without one.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Fixed identity, fed from configuration or a test.
pub struct StaticIdentity {
    user: Option<UserId>,
}

impl StaticIdentity {
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }
}

/// Identity slot the surrounding app updates when auth-state changes arrive.
#[derive(Default)]
pub struct SharedIdentity {
    user: RwLock<Option<UserId>>,
}

impl SharedIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: UserId) {
        if let Ok(mut guard) = self.user.write() {
            *guard = Some(user);
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.user.write() {
            *guard = None;
        }
    }
}

impl IdentityProvider for SharedIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().ok().and_then(|guard| guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_identity_reports_configured_user() {
        let signed_in = StaticIdentity::signed_in(UserId::new("user-1"));
        assert_eq!(signed_in.current_user(), Some(UserId::new("user-1")));

        let anonymous = StaticIdentity::anonymous();
        assert_eq!(anonymous.current_user(), None);
    }

    #[test]
    fn shared_identity_tracks_auth_state_changes() {
        let identity = SharedIdentity::new();
        assert_eq!(identity.current_user(), None);

        identity.sign_in(UserId::new("user-2"));
        assert_eq!(identity.current_user(), Some(UserId::new("user-2")));

        identity.sign_out();
        assert_eq!(identity.current_user(), None);
    }
}

//! Session context: who this client is, whether it is elevated, and what it
//! has selected.
//!
//! One [`SessionContext`] is owned by the reconciler and passed by reference
//! to everything that needs identity or scope. Nothing reads it as ambient
//! state.
//!
//! Admin status has two sources:
//!
//! | Source                        | When                         | Wins        |
//! |-------------------------------|------------------------------|-------------|
//! | connect-time credential       | from `connect` until confirm | until below |
//! | `user-info` from the authority| every time it arrives        | always      |

use tackboard_types::{UserId, UserInfo};
use tracing::info;

use crate::scope::{Prompt, ScopeMachine};

/// Decides whether a connect-time credential elevates the channel.
///
/// With no secret configured, nothing elevates.
#[derive(Clone, Default)]
pub struct ElevationPolicy {
    secret: Option<String>,
}

impl std::fmt::Debug for ElevationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevationPolicy")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

impl ElevationPolicy {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn admits(&self, credential: &str) -> bool {
        matches!(&self.secret, Some(secret) if !credential.is_empty() && secret == credential)
    }

    /// The credential to send, if it is admitted.
    pub fn admit(&self, credential: Option<&str>) -> Option<String> {
        credential
            .filter(|c| self.admits(c))
            .map(str::to_string)
    }
}

/// Local identity, as far as this client knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Empty until the authority sends `user-info`.
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub is_admin: bool,
    /// Whether `is_admin` came from the authority.
    pub confirmed: bool,
}

/// Identity plus scope, owned by the reconciler.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    identity: SessionIdentity,
    local_admin: bool,
    scope: ScopeMachine,
}

impl SessionContext {
    /// `elevated`: whether the connect-time credential was admitted.
    pub fn new(elevated: bool, user_name: Option<String>) -> Self {
        Self {
            identity: SessionIdentity {
                user_id: UserId::default(),
                user_name,
                is_admin: elevated,
                confirmed: false,
            },
            local_admin: elevated,
            scope: ScopeMachine::new(),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }

    pub fn user_name(&self) -> Option<&str> {
        self.identity.user_name.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.identity.is_admin
    }

    pub fn scope(&self) -> &ScopeMachine {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut ScopeMachine {
        &mut self.scope
    }

    pub fn prompt(&self) -> Prompt {
        self.scope.prompt(self.is_admin())
    }

    /// Adopt the authority's view of this session. Returns true if admin
    /// status changed.
    pub fn apply_user_info(&mut self, info: &UserInfo) -> bool {
        let changed = self.identity.is_admin != info.is_admin;
        if changed {
            info!(
                user = %info.id,
                was = self.identity.is_admin,
                now = info.is_admin,
                "admin status set by authority"
            );
        }
        self.identity.user_id = info.id.clone();
        if !info.name.trim().is_empty() {
            self.identity.user_name = Some(info.name.clone());
        }
        self.identity.is_admin = info.is_admin;
        self.identity.confirmed = true;
        changed
    }

    /// The channel dropped: the next channel gets a new session id, and
    /// admin status falls back to the credential until confirmed again.
    pub fn reset_to_local(&mut self) {
        self.identity.user_id = UserId::default();
        self.identity.is_admin = self.local_admin;
        self.identity.confirmed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, is_admin: bool) -> UserInfo {
        UserInfo {
            id: id.into(),
            name: String::new(),
            is_admin,
        }
    }

    #[test]
    fn policy_only_admits_matching_secret() {
        let policy = ElevationPolicy::new(Some("hunter2".into()));
        assert!(policy.admits("hunter2"));
        assert!(!policy.admits("hunter3"));
        assert!(!policy.admits(""));
        assert_eq!(policy.admit(Some("hunter2")).as_deref(), Some("hunter2"));
        assert_eq!(policy.admit(Some("nope")), None);
        assert_eq!(policy.admit(None), None);
    }

    #[test]
    fn policy_without_secret_admits_nothing() {
        assert!(!ElevationPolicy::default().admits("anything"));
        assert!(!ElevationPolicy::new(Some(String::new())).admits(""));
    }

    #[test]
    fn policy_debug_hides_secret() {
        let policy = ElevationPolicy::new(Some("hunter2".into()));
        assert!(!format!("{policy:?}").contains("hunter2"));
    }

    #[test]
    fn authority_overrides_local_admin() {
        let mut session = SessionContext::new(true, None);
        assert!(session.is_admin());
        assert!(!session.identity().confirmed);

        assert!(session.apply_user_info(&info("s1", false)));
        assert!(!session.is_admin());
        assert_eq!(session.user_id().as_str(), "s1");
        assert!(!session.apply_user_info(&info("s1", false)));
    }

    #[test]
    fn authority_can_elevate() {
        let mut session = SessionContext::new(false, Some("Kai".into()));
        session.apply_user_info(&info("s2", true));
        assert!(session.is_admin());
        assert_eq!(session.user_name(), Some("Kai"));
    }

    #[test]
    fn reset_falls_back_to_credential() {
        let mut session = SessionContext::new(true, None);
        session.apply_user_info(&info("s1", false));
        session.reset_to_local();
        assert!(session.is_admin());
        assert!(session.user_id().is_empty());
    }

    #[test]
    fn elevated_sessions_skip_subject_prompt() {
        assert_eq!(SessionContext::new(true, None).prompt(), Prompt::None);
        assert_eq!(SessionContext::new(false, None).prompt(), Prompt::ChooseSubject);
    }
}

// asset-gateway/src/legacy.rs
use common::{Role, SessionPayload};

use crate::policy::LegacyPage;

impl LegacyPage {
    /// Authorization predicate for an authenticated session.
    ///
    /// The admin document also admits `mailbox` sessions. That is the
    /// existing policy and is kept as is.
    pub fn admits(&self, payload: &SessionPayload, bootstrap_username: Option<&str>) -> bool {
        match self {
            LegacyPage::AdminDocument => {
                matches!(payload.role, Role::Admin | Role::Guest | Role::Mailbox)
            }
            LegacyPage::SingleMailbox => payload.role == Role::Mailbox,
            LegacyPage::AllMailboxes => match payload.role {
                Role::Guest => true,
                Role::Admin => is_named_admin(&payload.username, bootstrap_username),
                _ => false,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LegacyPage::AdminDocument => "admin-document",
            LegacyPage::SingleMailbox => "single-mailbox",
            LegacyPage::AllMailboxes => "all-mailboxes",
        }
    }
}

// Non-empty and not the bootstrap pseudo-account
fn is_named_admin(username: &str, bootstrap_username: Option<&str>) -> bool {
    !username.is_empty() && bootstrap_username != Some(username)
}

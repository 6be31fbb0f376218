//! Access lists: who currently holds access to an entity.
//!
//! Derived by replaying grant/revoke control events authored by the
//! entity's owner, in log order. Membership is a set; replay is a pure
//! fold with idempotent transitions.

use serde::{Deserialize, Serialize};

use cipherlog_core::AuthorId;

/// The ordered set of recipient identities currently granted access to
/// one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessList {
    users: Vec<AuthorId>,
}

impl AccessList {
    /// Create an empty access list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant: appends if absent, no-op otherwise.
    pub fn grant(&mut self, user: AuthorId) {
        if !self.users.contains(&user) {
            self.users.push(user);
        }
    }

    /// Record a revoke: removes by identity match. Revoking an identity
    /// that was never granted is a no-op.
    pub fn revoke(&mut self, user: &AuthorId) {
        self.users.retain(|existing| existing != user);
    }

    /// Whether an identity is currently granted.
    pub fn contains(&self, user: &AuthorId) -> bool {
        self.users.contains(user)
    }

    /// The distribution set: the granted identities plus the owner.
    ///
    /// The owner's own identity is always included when distributing keys,
    /// even if absent from the explicit list.
    pub fn recipients_with(&self, owner: &AuthorId) -> Vec<AuthorId> {
        let mut recipients = self.users.clone();
        if !recipients.contains(owner) {
            recipients.push(owner.clone());
        }
        recipients
    }

    /// Granted identities in grant order.
    pub fn iter(&self) -> impl Iterator<Item = &AuthorId> {
        self.users.iter()
    }

    /// Number of granted identities.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no identity has been granted.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

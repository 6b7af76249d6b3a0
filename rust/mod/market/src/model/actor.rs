use crate::model::{Account, AccountKind};

/// Who is asking. Passed explicitly into every policy decision and
/// service call; there is no ambient "current user".
///
/// The verified flag lives on the organization variant only, so a
/// verified student cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Student { id: String },
    Organization { id: String, verified: bool },
}

impl Actor {
    /// Build the actor for a freshly loaded account.
    pub fn from_account(account: &Account) -> Self {
        match account.kind {
            AccountKind::Student => Actor::Student {
                id: account.id.clone(),
            },
            AccountKind::Organization => Actor::Organization {
                id: account.id.clone(),
                verified: account.verified,
            },
        }
    }

    /// Account id, or None for anonymous visitors.
    pub fn id(&self) -> Option<&str> {
        match self {
            Actor::Anonymous => None,
            Actor::Student { id } | Actor::Organization { id, .. } => Some(id),
        }
    }

    pub fn kind(&self) -> Option<AccountKind> {
        match self {
            Actor::Anonymous => None,
            Actor::Student { .. } => Some(AccountKind::Student),
            Actor::Organization { .. } => Some(AccountKind::Organization),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Actor::Organization { verified: true, .. })
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Anonymous => f.write_str("anonymous"),
            Actor::Student { id } => write!(f, "student:{}", id),
            Actor::Organization { id, .. } => write!(f, "organization:{}", id),
        }
    }
}

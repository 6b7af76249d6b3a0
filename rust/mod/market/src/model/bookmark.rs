use serde::{Deserialize, Serialize};

/// An opportunity a student saved for later. At most one per
/// (user_id, opportunity_id) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedBookmark {
    pub id: String,
    pub user_id: String,
    pub opportunity_id: String,
    /// RFC 3339 timestamp.
    pub saved_at: String,
}

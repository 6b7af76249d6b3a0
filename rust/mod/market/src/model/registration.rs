use serde::{Deserialize, Serialize};

use crate::model::AccountView;

/// State of a student's registration.
///
/// ```text
/// registered ⇄ completed     (driven by hours_completed > 0)
///      ↘          ↙
///       cancelled            (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    Completed,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(Self::Registered),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Status after logging `hours`: any positive amount counts as completed.
    pub fn for_hours(hours: i64) -> Self {
        if hours > 0 {
            Self::Completed
        } else {
            Self::Registered
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A student's sign-up for one opportunity. At most one per
/// (user_id, opportunity_id) pair, cancelled ones included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub user_id: String,
    pub opportunity_id: String,
    pub registered_at: String,
    pub status: RegistrationStatus,
    pub hours_completed: i64,
}

/// Body for logging hours against a registration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogHours {
    pub hours_completed: i64,
}

/// A registration as seen by the organization running the opportunity.
#[derive(Debug, Clone, Serialize)]
pub struct Volunteer {
    pub registration: Registration,
    pub student: AccountView,
}

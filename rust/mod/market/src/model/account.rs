use serde::{Deserialize, Serialize};

/// Default service-hours goal for a new student.
pub const DEFAULT_SERVICE_HOURS_GOAL: i64 = 100;
pub const MAX_SERVICE_HOURS_GOAL: i64 = 100_000;

/// What kind of party an account represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Student,
    Organization,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Organization => "organization",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered student or organization.
///
/// `verified` is only ever true for organizations, and only an external
/// verifier can change it. `service_hours_goal` and `total_hours_logged`
/// exist for students only; `total_hours_logged` is recomputed by the store
/// from registrations and is never written directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    pub email: String,

    pub kind: AccountKind,

    #[serde(default)]
    pub verified: bool,

    /// Student name or organization name.
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_hours_goal: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_hours_logged: Option<i64>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

impl Account {
    pub fn is_student(&self) -> bool {
        self.kind == AccountKind::Student
    }
}

/// What another actor is allowed to see of an account.
///
/// Contact details and hour counters are only filled in when the viewer
/// is the account itself.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: String,
    pub kind: AccountKind,
    pub verified: bool,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_hours_goal: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_hours_logged: Option<i64>,
}

impl AccountView {
    /// Everything, for the account's own eyes.
    pub fn private(account: &Account) -> Self {
        Self {
            email: Some(account.email.clone()),
            phone: account.phone.clone(),
            address: account.address.clone(),
            service_hours_goal: account.service_hours_goal,
            total_hours_logged: account.total_hours_logged,
            ..Self::public(account)
        }
    }

    /// The publicly visible subset.
    pub fn public(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            kind: account.kind,
            verified: account.verified,
            display_name: account.display_name.clone(),
            city: account.city.clone(),
            website: account.website.clone(),
            bio: account.bio.clone(),
            email: None,
            phone: None,
            address: None,
            service_hours_goal: None,
            total_hours_logged: None,
        }
    }
}

/// Input for creating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub kind: AccountKind,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Students only. Defaults to [`DEFAULT_SERVICE_HOURS_GOAL`].
    #[serde(default)]
    pub service_hours_goal: Option<i64>,
}

/// Credentials for opening a session.
#[derive(Debug, Clone, Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

/// The fields an account may change about itself.
///
/// Absent fields are left alone. For the optional contact fields an empty
/// string clears the value. `verified`, `kind`, `email` and the hour
/// counters are deliberately not part of this set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub service_hours_goal: Option<i64>,
}

impl ProfilePatch {
    /// Keys accepted in a JSON profile patch.
    pub const FIELDS: &'static [&'static str] = &[
        "display_name",
        "phone",
        "address",
        "city",
        "website",
        "bio",
        "service_hours_goal",
    ];

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.website.is_none()
            && self.bio.is_none()
            && self.service_hours_goal.is_none()
    }
}

/// Body of the verifier endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SetVerified {
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> Account {
        Account {
            id: "o1".into(),
            email: "food@bank.org".into(),
            kind: AccountKind::Organization,
            verified: true,
            display_name: "City Food Bank".into(),
            phone: Some("555-0100".into()),
            address: Some("1 Main St".into()),
            city: Some("Springfield".into()),
            website: None,
            bio: None,
            service_hours_goal: None,
            total_hours_logged: None,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [AccountKind::Student, AccountKind::Organization] {
            assert_eq!(AccountKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(AccountKind::from_str("admin"), None);
    }

    #[test]
    fn test_public_view_hides_contact() {
        let view = AccountView::public(&org());
        assert_eq!(view.display_name, "City Food Bank");
        assert_eq!(view.city.as_deref(), Some("Springfield"));
        assert!(view.email.is_none());
        assert!(view.phone.is_none());
        assert!(view.address.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("email").is_none());
    }

    #[test]
    fn test_private_view_keeps_everything() {
        let view = AccountView::private(&org());
        assert_eq!(view.email.as_deref(), Some("food@bank.org"));
        assert_eq!(view.phone.as_deref(), Some("555-0100"));
        assert!(view.verified);
    }

    #[test]
    fn test_empty_patch() {
        assert!(ProfilePatch::default().is_empty());
        let patch = ProfilePatch {
            bio: Some(String::new()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}

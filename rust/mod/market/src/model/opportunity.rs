use serde::{Deserialize, Serialize};

use vhub_core::ListParams;

/// Upper bound on `hours_needed`. Also caps the hours one registration can
/// log, which keeps every student total far from integer overflow.
pub const MAX_HOURS_NEEDED: i64 = 1_000;

/// Upper bound on `max_volunteers`.
pub const MAX_VOLUNTEERS: i64 = 10_000;

// ---------------------------------------------------------------------------
// Category / OpportunityStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "STEM")]
    Stem,
    Environment,
    Health,
    Education,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stem => "STEM",
            Self::Environment => "Environment",
            Self::Health => "Health",
            Self::Education => "Education",
            Self::Other => "Other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STEM" => Some(Self::Stem),
            "Environment" => Some(Self::Environment),
            "Health" => Some(Self::Health),
            "Education" => Some(Self::Education),
            "Other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Lifecycle state of an opportunity.
///
/// Only `active` opportunities are visible to the public and accept
/// registrations. Filling up does not close an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Active,
    Inactive,
    Completed,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A volunteering slot posted by an organization.
///
/// `current_volunteers` is maintained by the store alongside registration
/// rows and always satisfies `0 <= current_volunteers <= max_volunteers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub organization_id: String,

    pub title: String,
    pub description: String,
    pub category: Category,

    pub hours_needed: i64,
    pub max_volunteers: i64,
    pub current_volunteers: i64,
    pub status: OpportunityStatus,

    // --- schedule ---
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM`, 24-hour.
    pub time: String,

    // --- location ---
    pub location: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,

    pub created_at: String,
    pub updated_at: String,
}

impl Opportunity {
    pub fn is_active(&self) -> bool {
        self.status == OpportunityStatus::Active
    }

    pub fn open_slots(&self) -> i64 {
        (self.max_volunteers - self.current_volunteers).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.current_volunteers >= self.max_volunteers
    }
}

/// Input for posting an opportunity.
///
/// `organization_id` defaults to the posting organization; naming a
/// different one is refused.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOpportunity {
    #[serde(default)]
    pub organization_id: Option<String>,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub hours_needed: i64,
    pub max_volunteers: i64,
    pub date: String,
    pub time: String,
    pub location: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default)]
    pub requirements: Option<String>,
}

/// The fields an owning organization may change. Absent fields are left
/// alone; an empty `requirements` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub hours_needed: Option<i64>,
    #[serde(default)]
    pub max_volunteers: Option<i64>,
    #[serde(default)]
    pub status: Option<OpportunityStatus>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
}

impl OpportunityPatch {
    /// Keys accepted in a JSON opportunity patch.
    pub const FIELDS: &'static [&'static str] = &[
        "title",
        "description",
        "category",
        "hours_needed",
        "max_volunteers",
        "status",
        "date",
        "time",
        "location",
        "city",
        "state",
        "zip_code",
        "requirements",
    ];
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunitySort {
    /// Most recently posted first.
    #[default]
    Newest,
    /// Soonest scheduled first.
    Date,
    Title,
}

/// Filter for browsing opportunities. Deserialized from the query string.
#[derive(Debug, Clone, Deserialize)]
pub struct OpportunityQuery {
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub status: Option<OpportunityStatus>,
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Case-insensitive substring match on title, description and city.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub sort: OpportunitySort,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl OpportunityQuery {
    pub fn page(&self) -> ListParams {
        ListParams {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl Default for OpportunityQuery {
    fn default() -> Self {
        Self {
            category: None,
            status: None,
            organization_id: None,
            q: None,
            sort: OpportunitySort::default(),
            limit: default_limit(),
            offset: 0,
        }
    }
}

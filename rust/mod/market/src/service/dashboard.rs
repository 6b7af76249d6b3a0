use serde::Serialize;

use crate::model::{AccountView, Actor};
use crate::policy::{DenyReason, Operation};
use crate::service::{MarketError, MarketService};
use crate::store::{OrganizationStats, StudentStats};

#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
    pub account: AccountView,
    pub service_hours_goal: i64,
    pub total_hours_logged: i64,
    /// Share of the goal reached, capped at 100.
    pub progress_percent: u32,
    pub registrations: StudentStats,
    pub bookmarks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationDashboard {
    pub account: AccountView,
    pub verified: bool,
    pub opportunities: OrganizationStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Dashboard {
    Student(StudentDashboard),
    Organization(OrganizationDashboard),
}

impl MarketService {
    /// The acting account's dashboard, shaped by its kind.
    pub fn dashboard(&self, actor: &Actor) -> Result<Dashboard, MarketError> {
        match actor {
            Actor::Anonymous => Err(MarketError::AuthenticationRequired),
            Actor::Student { .. } => self.student_dashboard(actor).map(Dashboard::Student),
            Actor::Organization { .. } => {
                self.organization_dashboard(actor).map(Dashboard::Organization)
            }
        }
    }

    pub fn student_dashboard(&self, actor: &Actor) -> Result<StudentDashboard, MarketError> {
        self.authorize(actor, Operation::ReadOwnActivity)?;
        let id = actor.id().ok_or(MarketError::AuthenticationRequired)?;

        let account = self.with_retry("dashboard", |s| s.get_account(id))?;
        let registrations = self.with_retry("dashboard", |s| s.student_stats(id))?;
        let bookmarks = self.with_retry("dashboard", |s| s.bookmarks_for_user(id))?.len();

        let goal = account.service_hours_goal.unwrap_or(0);
        let total = account.total_hours_logged.unwrap_or(0);
        Ok(StudentDashboard {
            account: AccountView::private(&account),
            service_hours_goal: goal,
            total_hours_logged: total,
            progress_percent: progress(total, goal),
            registrations,
            bookmarks,
        })
    }

    pub fn organization_dashboard(&self, actor: &Actor) -> Result<OrganizationDashboard, MarketError> {
        let id = match actor {
            Actor::Organization { id, .. } => id,
            Actor::Anonymous => return Err(MarketError::AuthenticationRequired),
            Actor::Student { .. } => return Err(DenyReason::WrongRole.into()),
        };

        let account = self.with_retry("dashboard", |s| s.get_account(id))?;
        let opportunities = self.with_retry("dashboard", |s| s.organization_stats(id))?;
        Ok(OrganizationDashboard {
            verified: account.verified,
            account: AccountView::private(&account),
            opportunities,
        })
    }
}

fn progress(total: i64, goal: i64) -> u32 {
    if goal <= 0 {
        return 0;
    }
    let percent = i128::from(total.max(0)) * 100 / i128::from(goal);
    percent.min(100) as u32
}

//! Access policy for the marketplace.
//!
//! [`can_perform`] is a pure decision: given an explicit [`Actor`] and an
//! [`Operation`] carrying everything the rule needs about its target, it
//! returns [`Decision::Allow`] or [`Decision::Deny`] with a reason. The
//! service consults it before every store call; the store's own
//! constraints and guarded statements remain the final word under races.
//!
//! Checks run in a fixed order: authentication, role, verification (for
//! posting), ownership, duplicate, target status, then capacity or range.

use serde::Serialize;

use crate::model::{Account, AccountView, Actor, Opportunity, Registration, RegistrationStatus};

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DenyReason {
    NotAuthenticated,
    WrongRole,
    NotVerified,
    NotOwner,
    CapacityExceeded,
    DuplicateRegistration,
    InvalidRange,
    InactiveTarget,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "NotAuthenticated",
            Self::WrongRole => "WrongRole",
            Self::NotVerified => "NotVerified",
            Self::NotOwner => "NotOwner",
            Self::CapacityExceeded => "CapacityExceeded",
            Self::DuplicateRegistration => "DuplicateRegistration",
            Self::InvalidRange => "InvalidRange",
            Self::InactiveTarget => "InactiveTarget",
        }
    }

    /// Human-readable explanation, for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "sign in required",
            Self::WrongRole => "not available for this account type",
            Self::NotVerified => "organization is not verified",
            Self::NotOwner => "not the owner of this record",
            Self::CapacityExceeded => "opportunity is full",
            Self::DuplicateRegistration => "already registered for this opportunity",
            Self::InvalidRange => "value out of range",
            Self::InactiveTarget => "target is not active",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

impl From<Result<(), DenyReason>> for Decision {
    fn from(r: Result<(), DenyReason>) -> Self {
        match r {
            Ok(()) => Decision::Allow,
            Err(reason) => Decision::Deny(reason),
        }
    }
}

/// An intended operation together with the target state the rule needs.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    CreateOpportunity {
        organization_id: &'a str,
    },
    UpdateOpportunity {
        opportunity: &'a Opportunity,
    },
    DeleteOpportunity {
        opportunity: &'a Opportunity,
    },
    ReadOpportunity {
        opportunity: &'a Opportunity,
    },
    /// An organization listing the registrations for its opportunity.
    ListVolunteers {
        opportunity: &'a Opportunity,
    },
    CreateRegistration {
        opportunity: &'a Opportunity,
        already_registered: bool,
    },
    UpdateRegistrationHours {
        registration: &'a Registration,
        opportunity: &'a Opportunity,
        hours: i64,
    },
    CancelRegistration {
        registration: &'a Registration,
    },
    CreateBookmark {
        user_id: &'a str,
    },
    DeleteBookmark {
        user_id: &'a str,
    },
    /// A student reading their own registrations or bookmarks.
    ReadOwnActivity,
    UpdateProfile {
        account_id: &'a str,
    },
}

/// Decide whether `actor` may perform `op`.
pub fn can_perform(actor: &Actor, op: &Operation<'_>) -> Decision {
    evaluate(actor, op).into()
}

fn evaluate(actor: &Actor, op: &Operation<'_>) -> Result<(), DenyReason> {
    match *op {
        Operation::CreateOpportunity { organization_id } => {
            let (id, verified) = organization(actor)?;
            if !verified {
                return Err(DenyReason::NotVerified);
            }
            owner(id, organization_id)
        }

        Operation::UpdateOpportunity { opportunity }
        | Operation::DeleteOpportunity { opportunity }
        | Operation::ListVolunteers { opportunity } => {
            let (id, _) = organization(actor)?;
            owner(id, &opportunity.organization_id)
        }

        Operation::ReadOpportunity { opportunity } => {
            if opportunity.is_active() || actor.id() == Some(opportunity.organization_id.as_str())
            {
                Ok(())
            } else {
                Err(DenyReason::InactiveTarget)
            }
        }

        Operation::CreateRegistration {
            opportunity,
            already_registered,
        } => {
            student(actor)?;
            if already_registered {
                return Err(DenyReason::DuplicateRegistration);
            }
            if !opportunity.is_active() {
                return Err(DenyReason::InactiveTarget);
            }
            if opportunity.is_full() {
                return Err(DenyReason::CapacityExceeded);
            }
            Ok(())
        }

        Operation::UpdateRegistrationHours {
            registration,
            opportunity,
            hours,
        } => {
            let id = student(actor)?;
            owner(id, &registration.user_id)?;
            if registration.status == RegistrationStatus::Cancelled {
                return Err(DenyReason::InactiveTarget);
            }
            if !(0..=opportunity.hours_needed).contains(&hours) {
                return Err(DenyReason::InvalidRange);
            }
            Ok(())
        }

        Operation::CancelRegistration { registration } => {
            let id = student(actor)?;
            owner(id, &registration.user_id)?;
            if registration.status == RegistrationStatus::Cancelled {
                return Err(DenyReason::InactiveTarget);
            }
            Ok(())
        }

        Operation::CreateBookmark { user_id } | Operation::DeleteBookmark { user_id } => {
            let id = student(actor)?;
            owner(id, user_id)
        }

        Operation::ReadOwnActivity => student(actor).map(|_| ()),

        Operation::UpdateProfile { account_id } => {
            let id = actor.id().ok_or(DenyReason::NotAuthenticated)?;
            owner(id, account_id)
        }
    }
}

fn student(actor: &Actor) -> Result<&str, DenyReason> {
    match actor {
        Actor::Anonymous => Err(DenyReason::NotAuthenticated),
        Actor::Student { id } => Ok(id),
        Actor::Organization { .. } => Err(DenyReason::WrongRole),
    }
}

fn organization(actor: &Actor) -> Result<(&str, bool), DenyReason> {
    match actor {
        Actor::Anonymous => Err(DenyReason::NotAuthenticated),
        Actor::Student { .. } => Err(DenyReason::WrongRole),
        Actor::Organization { id, verified } => Ok((id, *verified)),
    }
}

fn owner(actor_id: &str, owner_id: &str) -> Result<(), DenyReason> {
    if actor_id == owner_id {
        Ok(())
    } else {
        Err(DenyReason::NotOwner)
    }
}

/// The part of `account` that `actor` may see.
pub fn account_view(actor: &Actor, account: &Account) -> AccountView {
    if actor.id() == Some(account.id.as_str()) {
        AccountView::private(account)
    } else {
        AccountView::public(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, OpportunityStatus};

    fn student_actor(id: &str) -> Actor {
        Actor::Student { id: id.into() }
    }

    fn org_actor(id: &str, verified: bool) -> Actor {
        Actor::Organization {
            id: id.into(),
            verified,
        }
    }

    fn opportunity(org: &str, status: OpportunityStatus, current: i64, max: i64) -> Opportunity {
        Opportunity {
            id: "opp1".into(),
            organization_id: org.into(),
            title: "Food Drive".into(),
            description: "Sort cans".into(),
            category: Category::Health,
            hours_needed: 5,
            max_volunteers: max,
            current_volunteers: current,
            status,
            date: "2026-11-01".into(),
            time: "09:00".into(),
            location: "Warehouse".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip_code: "62701".into(),
            requirements: None,
            created_at: "2026-10-01T00:00:00Z".into(),
            updated_at: "2026-10-01T00:00:00Z".into(),
        }
    }

    fn registration(user: &str, status: RegistrationStatus) -> Registration {
        Registration {
            id: "r1".into(),
            user_id: user.into(),
            opportunity_id: "opp1".into(),
            registered_at: "2026-10-02T00:00:00Z".into(),
            status,
            hours_completed: 0,
        }
    }

    fn deny(actor: &Actor, op: Operation<'_>) -> Option<DenyReason> {
        match can_perform(actor, &op) {
            Decision::Allow => None,
            Decision::Deny(r) => Some(r),
        }
    }

    #[test]
    fn test_create_opportunity_requires_verified_owner() {
        let op = Operation::CreateOpportunity {
            organization_id: "o1",
        };
        assert_eq!(deny(&Actor::Anonymous, op), Some(DenyReason::NotAuthenticated));
        assert_eq!(deny(&student_actor("s1"), op), Some(DenyReason::WrongRole));
        assert_eq!(deny(&org_actor("o1", false), op), Some(DenyReason::NotVerified));
        assert_eq!(deny(&org_actor("o2", true), op), Some(DenyReason::NotOwner));
        assert_eq!(deny(&org_actor("o1", true), op), None);
    }

    #[test]
    fn test_unverified_wins_over_owner_mismatch() {
        let op = Operation::CreateOpportunity {
            organization_id: "someone-else",
        };
        assert_eq!(deny(&org_actor("o1", false), op), Some(DenyReason::NotVerified));
    }

    #[test]
    fn test_update_and_delete_skip_verification() {
        let opp = opportunity("o1", OpportunityStatus::Active, 0, 10);
        for op in [
            Operation::UpdateOpportunity { opportunity: &opp },
            Operation::DeleteOpportunity { opportunity: &opp },
            Operation::ListVolunteers { opportunity: &opp },
        ] {
            assert_eq!(deny(&org_actor("o1", false), op), None);
            assert_eq!(deny(&org_actor("o2", true), op), Some(DenyReason::NotOwner));
            assert_eq!(deny(&student_actor("s1"), op), Some(DenyReason::WrongRole));
            assert_eq!(deny(&Actor::Anonymous, op), Some(DenyReason::NotAuthenticated));
        }
    }

    #[test]
    fn test_read_opportunity() {
        let active = opportunity("o1", OpportunityStatus::Active, 0, 10);
        let hidden = opportunity("o1", OpportunityStatus::Inactive, 0, 10);

        let read_active = Operation::ReadOpportunity { opportunity: &active };
        assert_eq!(deny(&Actor::Anonymous, read_active), None);
        assert_eq!(deny(&student_actor("s1"), read_active), None);

        let read_hidden = Operation::ReadOpportunity { opportunity: &hidden };
        assert_eq!(deny(&Actor::Anonymous, read_hidden), Some(DenyReason::InactiveTarget));
        assert_eq!(deny(&org_actor("o2", true), read_hidden), Some(DenyReason::InactiveTarget));
        assert_eq!(deny(&org_actor("o1", false), read_hidden), None);
    }

    #[test]
    fn test_create_registration_order() {
        let full = opportunity("o1", OpportunityStatus::Active, 10, 10);
        let open = opportunity("o1", OpportunityStatus::Active, 3, 10);
        let closed = opportunity("o1", OpportunityStatus::Completed, 3, 10);
        let s = student_actor("s1");

        let op = |o, dup| Operation::CreateRegistration {
            opportunity: o,
            already_registered: dup,
        };

        assert_eq!(deny(&s, op(&open, false)), None);
        assert_eq!(deny(&s, op(&full, false)), Some(DenyReason::CapacityExceeded));
        assert_eq!(deny(&s, op(&closed, false)), Some(DenyReason::InactiveTarget));
        // Duplicate is reported even when the opportunity is full or closed.
        assert_eq!(deny(&s, op(&full, true)), Some(DenyReason::DuplicateRegistration));
        assert_eq!(deny(&s, op(&closed, true)), Some(DenyReason::DuplicateRegistration));
        assert_eq!(deny(&org_actor("o1", true), op(&open, false)), Some(DenyReason::WrongRole));
        assert_eq!(deny(&Actor::Anonymous, op(&open, false)), Some(DenyReason::NotAuthenticated));
    }

    #[test]
    fn test_hours_range_and_owner() {
        let opp = opportunity("o1", OpportunityStatus::Active, 1, 10);
        let reg = registration("s1", RegistrationStatus::Registered);
        let op = |hours| Operation::UpdateRegistrationHours {
            registration: &reg,
            opportunity: &opp,
            hours,
        };

        assert_eq!(deny(&student_actor("s1"), op(0)), None);
        assert_eq!(deny(&student_actor("s1"), op(5)), None);
        assert_eq!(deny(&student_actor("s1"), op(6)), Some(DenyReason::InvalidRange));
        assert_eq!(deny(&student_actor("s1"), op(-1)), Some(DenyReason::InvalidRange));
        assert_eq!(deny(&student_actor("s2"), op(3)), Some(DenyReason::NotOwner));
        assert_eq!(deny(&org_actor("o1", true), op(3)), Some(DenyReason::WrongRole));
    }

    #[test]
    fn test_cancelled_registration_is_inactive() {
        let opp = opportunity("o1", OpportunityStatus::Active, 1, 10);
        let reg = registration("s1", RegistrationStatus::Cancelled);
        let s = student_actor("s1");

        assert_eq!(
            deny(&s, Operation::CancelRegistration { registration: &reg }),
            Some(DenyReason::InactiveTarget)
        );
        assert_eq!(
            deny(
                &s,
                Operation::UpdateRegistrationHours {
                    registration: &reg,
                    opportunity: &opp,
                    hours: 1,
                }
            ),
            Some(DenyReason::InactiveTarget)
        );
    }

    #[test]
    fn test_bookmarks_are_student_owned() {
        let op = Operation::CreateBookmark { user_id: "s1" };
        assert_eq!(deny(&student_actor("s1"), op), None);
        assert_eq!(deny(&student_actor("s2"), op), Some(DenyReason::NotOwner));
        assert_eq!(deny(&org_actor("s1", true), op), Some(DenyReason::WrongRole));

        let op = Operation::DeleteBookmark { user_id: "s1" };
        assert_eq!(deny(&student_actor("s2"), op), Some(DenyReason::NotOwner));
    }

    #[test]
    fn test_profile_update_is_self_only() {
        let op = Operation::UpdateProfile { account_id: "o1" };
        assert_eq!(deny(&org_actor("o1", false), op), None);
        assert_eq!(deny(&org_actor("o2", true), op), Some(DenyReason::NotOwner));
        assert_eq!(deny(&Actor::Anonymous, op), Some(DenyReason::NotAuthenticated));
    }

    #[test]
    fn test_student_activity() {
        assert_eq!(can_perform(&student_actor("s1"), &Operation::ReadOwnActivity), Decision::Allow);
        assert_eq!(
            deny(&org_actor("o1", true), Operation::ReadOwnActivity),
            Some(DenyReason::WrongRole)
        );
    }

    #[test]
    fn test_decision_into_result() {
        assert_eq!(Decision::Allow.into_result(), Ok(()));
        assert_eq!(
            Decision::Deny(DenyReason::NotOwner).into_result(),
            Err(DenyReason::NotOwner)
        );
    }
}

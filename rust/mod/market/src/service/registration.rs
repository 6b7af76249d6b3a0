use tracing::{info, warn};

use vhub_core::{new_id, now_rfc3339};

use crate::model::{AccountView, Actor, Registration, RegistrationStatus, Volunteer};
use crate::policy::Operation;
use crate::service::{MarketError, MarketService};

/// A registration the policy has allowed but the store has not yet
/// committed.
///
/// Splitting the two steps lets several callers be admitted against the
/// same snapshot and then race at the store, which is where capacity is
/// actually enforced.
#[derive(Debug, Clone)]
pub struct RegistrationTicket {
    registration: Registration,
}

impl RegistrationTicket {
    pub fn registration(&self) -> &Registration {
        &self.registration
    }
}

impl MarketService {
    /// Decide whether `actor` may register for the opportunity.
    pub fn prepare_registration(
        &self,
        actor: &Actor,
        opportunity_id: &str,
    ) -> Result<RegistrationTicket, MarketError> {
        let opp = self.with_retry("register", |s| s.get_opportunity(opportunity_id))?;

        let already_registered = match actor {
            Actor::Student { id } => {
                self.with_retry("register", |s| s.registration_exists(id, &opp.id))?
            }
            _ => false,
        };
        self.authorize(
            actor,
            Operation::CreateRegistration {
                opportunity: &opp,
                already_registered,
            },
        )?;

        let user_id = actor.id().ok_or(MarketError::AuthenticationRequired)?;
        Ok(RegistrationTicket {
            registration: Registration {
                id: new_id(),
                user_id: user_id.to_string(),
                opportunity_id: opp.id,
                registered_at: now_rfc3339(),
                status: RegistrationStatus::Registered,
                hours_completed: 0,
            },
        })
    }

    /// Insert the registration and take a slot in one transaction.
    /// Losing the race for the last slot is a `ConflictFailed`.
    pub fn commit_registration(
        &self,
        ticket: RegistrationTicket,
    ) -> Result<Registration, MarketError> {
        let reg = ticket.registration;
        let now = now_rfc3339();
        if let Err(e) = self.with_retry("register", |s| s.register(&reg, &now)) {
            if let MarketError::ConflictFailed(ref msg) = e {
                warn!(opportunity_id = %reg.opportunity_id, user_id = %reg.user_id, %msg, "registration lost race");
            }
            return Err(e);
        }
        info!(registration_id = %reg.id, opportunity_id = %reg.opportunity_id, user_id = %reg.user_id, "registered");
        self.with_retry("register", |s| s.get_registration(&reg.id))
    }

    /// Register `actor` for an opportunity.
    pub fn register(&self, actor: &Actor, opportunity_id: &str) -> Result<Registration, MarketError> {
        let ticket = self.prepare_registration(actor, opportunity_id)?;
        self.commit_registration(ticket)
    }

    /// Record hours for the actor's own registration. Any positive amount
    /// marks it completed; zero puts it back to registered.
    pub fn log_hours(
        &self,
        actor: &Actor,
        registration_id: &str,
        hours: i64,
    ) -> Result<Registration, MarketError> {
        let reg = self.with_retry("log_hours", |s| s.get_registration(registration_id))?;
        let opp = self.with_retry("log_hours", |s| s.get_opportunity(&reg.opportunity_id))?;
        self.authorize(
            actor,
            Operation::UpdateRegistrationHours {
                registration: &reg,
                opportunity: &opp,
                hours,
            },
        )?;

        let now = now_rfc3339();
        self.with_retry("log_hours", |s| s.log_hours(&reg.id, &reg.user_id, hours, &now))?;
        info!(registration_id = %reg.id, hours, "hours logged");
        self.with_retry("log_hours", |s| s.get_registration(&reg.id))
    }

    /// Cancel the actor's own registration, freeing its slot.
    pub fn cancel_registration(
        &self,
        actor: &Actor,
        registration_id: &str,
    ) -> Result<Registration, MarketError> {
        let reg = self.with_retry("cancel_registration", |s| s.get_registration(registration_id))?;
        self.authorize(actor, Operation::CancelRegistration { registration: &reg })?;

        let now = now_rfc3339();
        self.with_retry("cancel_registration", |s| s.cancel_registration(&reg, &now))?;
        info!(registration_id = %reg.id, "registration cancelled");
        self.with_retry("cancel_registration", |s| s.get_registration(&reg.id))
    }

    /// The acting student's registrations.
    pub fn list_my_registrations(&self, actor: &Actor) -> Result<Vec<Registration>, MarketError> {
        self.authorize(actor, Operation::ReadOwnActivity)?;
        let id = actor.id().ok_or(MarketError::AuthenticationRequired)?;
        self.with_retry("list_registrations", |s| s.registrations_for_user(id))
    }

    /// The students registered for one of the actor's opportunities.
    pub fn list_volunteers(
        &self,
        actor: &Actor,
        opportunity_id: &str,
    ) -> Result<Vec<Volunteer>, MarketError> {
        let opp = self.with_retry("list_volunteers", |s| s.get_opportunity(opportunity_id))?;
        self.authorize(actor, Operation::ListVolunteers { opportunity: &opp })?;

        let regs = self.with_retry("list_volunteers", |s| s.registrations_for_opportunity(&opp.id))?;
        regs.into_iter()
            .map(|registration| {
                let student =
                    self.with_retry("list_volunteers", |s| s.get_account(&registration.user_id))?;
                Ok(Volunteer {
                    student: AccountView::public(&student),
                    registration,
                })
            })
            .collect()
    }
}

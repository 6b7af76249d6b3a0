use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use vhub_core::{new_id, now_rfc3339, ListResult};

use crate::model::{
    Actor, CreateOpportunity, Opportunity, OpportunityPatch, OpportunityQuery, OpportunityStatus,
    MAX_HOURS_NEEDED, MAX_VOLUNTEERS,
};
use crate::policy::Operation;
use crate::service::{parse_patch, require_text, MarketError, MarketService};

impl MarketService {
    /// Post a new opportunity. Only a verified organization may post, and
    /// only for itself.
    pub fn create_opportunity(
        &self,
        actor: &Actor,
        input: CreateOpportunity,
    ) -> Result<Opportunity, MarketError> {
        let organization_id = input
            .organization_id
            .clone()
            .or_else(|| actor.id().map(str::to_string))
            .unwrap_or_default();
        self.authorize(
            actor,
            Operation::CreateOpportunity {
                organization_id: &organization_id,
            },
        )?;

        for (field, value) in [
            ("title", &input.title),
            ("description", &input.description),
            ("location", &input.location),
            ("city", &input.city),
            ("state", &input.state),
            ("zip_code", &input.zip_code),
        ] {
            require_text(field, value)?;
        }
        check_bounded("hours_needed", input.hours_needed, MAX_HOURS_NEEDED)?;
        check_bounded("max_volunteers", input.max_volunteers, MAX_VOLUNTEERS)?;
        check_date(&input.date)?;
        check_time(&input.time)?;

        let now = now_rfc3339();
        let opp = Opportunity {
            id: new_id(),
            organization_id,
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            category: input.category,
            hours_needed: input.hours_needed,
            max_volunteers: input.max_volunteers,
            current_volunteers: 0,
            status: OpportunityStatus::Active,
            date: input.date,
            time: input.time,
            location: input.location.trim().to_string(),
            city: input.city.trim().to_string(),
            state: input.state.trim().to_string(),
            zip_code: input.zip_code.trim().to_string(),
            requirements: input
                .requirements
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            created_at: now.clone(),
            updated_at: now,
        };

        self.with_retry("create_opportunity", |s| s.insert_opportunity(&opp))?;
        info!(opportunity_id = %opp.id, organization_id = %opp.organization_id, "opportunity posted");
        Ok(opp)
    }

    /// Read one opportunity. Inactive and completed ones are visible only
    /// to their organization.
    pub fn get_opportunity(&self, actor: &Actor, id: &str) -> Result<Opportunity, MarketError> {
        let opp = self.with_retry("get_opportunity", |s| s.get_opportunity(id))?;
        self.authorize(actor, Operation::ReadOpportunity { opportunity: &opp })?;
        Ok(opp)
    }

    /// Browse opportunities. Everyone sees active ones; an organization
    /// additionally sees its own in any status.
    pub fn list_opportunities(
        &self,
        actor: &Actor,
        query: &OpportunityQuery,
    ) -> Result<ListResult<Opportunity>, MarketError> {
        self.with_retry("list_opportunities", |s| s.list_opportunities(query, actor.id()))
    }

    /// Apply a JSON patch. Keys outside [`OpportunityPatch::FIELDS`]
    /// (`current_volunteers`, `organization_id` ...) are refused.
    pub fn update_opportunity(
        &self,
        actor: &Actor,
        id: &str,
        body: serde_json::Value,
    ) -> Result<Opportunity, MarketError> {
        let opp = self.with_retry("update_opportunity", |s| s.get_opportunity(id))?;
        self.authorize(actor, Operation::UpdateOpportunity { opportunity: &opp })?;
        let patch: OpportunityPatch = parse_patch(body, OpportunityPatch::FIELDS)?;
        self.patch_checked(&opp, patch)
    }

    /// Typed form of [`update_opportunity`](Self::update_opportunity).
    pub fn apply_opportunity_patch(
        &self,
        actor: &Actor,
        id: &str,
        patch: OpportunityPatch,
    ) -> Result<Opportunity, MarketError> {
        let opp = self.with_retry("update_opportunity", |s| s.get_opportunity(id))?;
        self.authorize(actor, Operation::UpdateOpportunity { opportunity: &opp })?;
        self.patch_checked(&opp, patch)
    }

    fn patch_checked(
        &self,
        opp: &Opportunity,
        patch: OpportunityPatch,
    ) -> Result<Opportunity, MarketError> {
        validate_patch(&patch)?;
        let now = now_rfc3339();
        self.with_retry("update_opportunity", |s| {
            s.update_opportunity(&opp.id, &opp.organization_id, &patch, &now)
        })?;
        info!(opportunity_id = %opp.id, "opportunity updated");
        self.with_retry("update_opportunity", |s| s.get_opportunity(&opp.id))
    }

    /// Delete an opportunity along with its registrations and bookmarks.
    pub fn delete_opportunity(&self, actor: &Actor, id: &str) -> Result<(), MarketError> {
        let opp = self.with_retry("delete_opportunity", |s| s.get_opportunity(id))?;
        self.authorize(actor, Operation::DeleteOpportunity { opportunity: &opp })?;

        let now = now_rfc3339();
        self.with_retry("delete_opportunity", |s| {
            s.delete_opportunity(&opp.id, &opp.organization_id, &now)
        })?;
        info!(opportunity_id = %opp.id, "opportunity deleted");
        Ok(())
    }
}

fn validate_patch(patch: &OpportunityPatch) -> Result<(), MarketError> {
    let mut touched = false;
    for (field, value) in [
        ("title", &patch.title),
        ("description", &patch.description),
        ("location", &patch.location),
        ("city", &patch.city),
        ("state", &patch.state),
        ("zip_code", &patch.zip_code),
    ] {
        if let Some(v) = value {
            require_text(field, v)?;
            touched = true;
        }
    }
    if let Some(hours) = patch.hours_needed {
        check_bounded("hours_needed", hours, MAX_HOURS_NEEDED)?;
        touched = true;
    }
    if let Some(max) = patch.max_volunteers {
        check_bounded("max_volunteers", max, MAX_VOLUNTEERS)?;
        touched = true;
    }
    if let Some(ref date) = patch.date {
        check_date(date)?;
        touched = true;
    }
    if let Some(ref time) = patch.time {
        check_time(time)?;
        touched = true;
    }
    touched |= patch.category.is_some() || patch.status.is_some() || patch.requirements.is_some();

    if !touched {
        return Err(MarketError::invalid("body", "nothing to update"));
    }
    Ok(())
}

fn check_bounded(field: &str, value: i64, max: i64) -> Result<(), MarketError> {
    if !(1..=max).contains(&value) {
        return Err(MarketError::invalid(field, format!("{field} must be between 1 and {max}")));
    }
    Ok(())
}

fn check_date(date: &str) -> Result<(), MarketError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| MarketError::invalid("date", "expected YYYY-MM-DD"))
}

fn check_time(time: &str) -> Result<(), MarketError> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map(|_| ())
        .map_err(|_| MarketError::invalid("time", "expected HH:MM"))
}

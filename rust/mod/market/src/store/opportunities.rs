use serde::Serialize;

use vhub_core::ListResult;
use vhub_sql::{Row, SQLError, Statement, Value};

use crate::model::{
    Category, Opportunity, OpportunityPatch, OpportunityQuery, OpportunitySort, OpportunityStatus,
};
use crate::service::MarketError;

use super::{clearable, count, int, opt_text, text, MarketStore, SetClause};

const OPPORTUNITY_COLUMNS: &str = "id, organization_id, title, description, category, \
     hours_needed, max_volunteers, current_volunteers, status, date, time, location, city, \
     state, zip_code, requirements, created_at, updated_at";

/// Per-organization counters for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationStats {
    pub active: usize,
    pub inactive: usize,
    pub completed: usize,
    /// Sum of `current_volunteers` over all the organization's opportunities.
    pub total_volunteers: i64,
    /// Remaining capacity over active opportunities.
    pub open_slots: i64,
}

impl MarketStore {
    /// Insert a new opportunity.
    pub fn insert_opportunity(&self, opp: &Opportunity) -> Result<(), MarketError> {
        self.db.exec(
            &format!(
                "INSERT INTO opportunities ({OPPORTUNITY_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ),
            &[
                Value::from(opp.id.as_str()),
                Value::from(opp.organization_id.as_str()),
                Value::from(opp.title.as_str()),
                Value::from(opp.description.as_str()),
                Value::from(opp.category.as_str()),
                Value::from(opp.hours_needed),
                Value::from(opp.max_volunteers),
                Value::from(opp.current_volunteers),
                Value::from(opp.status.as_str()),
                Value::from(opp.date.as_str()),
                Value::from(opp.time.as_str()),
                Value::from(opp.location.as_str()),
                Value::from(opp.city.as_str()),
                Value::from(opp.state.as_str()),
                Value::from(opp.zip_code.as_str()),
                Value::from(opp.requirements.clone()),
                Value::from(opp.created_at.as_str()),
                Value::from(opp.updated_at.as_str()),
            ],
        )?;
        Ok(())
    }

    /// Get an opportunity by ID.
    pub fn get_opportunity(&self, id: &str) -> Result<Opportunity, MarketError> {
        let rows = self.db.query(
            &format!("SELECT {OPPORTUNITY_COLUMNS} FROM opportunities WHERE id = ?1"),
            &[Value::from(id)],
        )?;
        let row = rows
            .first()
            .ok_or_else(|| MarketError::NotFound(format!("opportunity {id}")))?;
        row_to_opportunity(row)
    }

    /// List opportunities visible to `viewer`: every active one, plus the
    /// viewer's own in any status.
    pub fn list_opportunities(
        &self,
        query: &OpportunityQuery,
        viewer: Option<&str>,
    ) -> Result<ListResult<Opportunity>, MarketError> {
        let mut where_clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        match viewer {
            Some(id) => {
                params.push(Value::from(id));
                where_clauses.push(format!(
                    "(status = 'active' OR organization_id = ?{})",
                    params.len()
                ));
            }
            None => where_clauses.push("status = 'active'".to_string()),
        }
        if let Some(status) = query.status {
            params.push(Value::from(status.as_str()));
            where_clauses.push(format!("status = ?{}", params.len()));
        }
        if let Some(category) = query.category {
            params.push(Value::from(category.as_str()));
            where_clauses.push(format!("category = ?{}", params.len()));
        }
        if let Some(ref org) = query.organization_id {
            params.push(Value::from(org.as_str()));
            where_clauses.push(format!("organization_id = ?{}", params.len()));
        }
        if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            params.push(Value::from(like_pattern(q)));
            let p = params.len();
            where_clauses.push(format!(
                "(title LIKE ?{p} ESCAPE '\\' OR description LIKE ?{p} ESCAPE '\\' \
                 OR city LIKE ?{p} ESCAPE '\\')"
            ));
        }

        let where_sql = format!("WHERE {}", where_clauses.join(" AND "));

        // Count total
        let count_rows = self.db.query(
            &format!("SELECT COUNT(*) AS cnt FROM opportunities {where_sql}"),
            &params,
        )?;
        let total = count(&count_rows);

        let order = match query.sort {
            OpportunitySort::Newest => "created_at DESC, id ASC",
            OpportunitySort::Date => "date ASC, time ASC, id ASC",
            OpportunitySort::Title => "title COLLATE NOCASE ASC, id ASC",
        };

        // Fetch page
        let page = query.page();
        let select_sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities {where_sql} ORDER BY {order} \
             LIMIT ?{} OFFSET ?{}",
            params.len() + 1,
            params.len() + 2
        );
        params.push(Value::Integer(page.effective_limit() as i64));
        params.push(Value::Integer(page.offset as i64));

        let rows = self.db.query(&select_sql, &params)?;
        let items = rows
            .iter()
            .map(row_to_opportunity)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListResult { items, total })
    }

    /// Apply a patch to an opportunity owned by `organization_id`.
    ///
    /// Lowering `max_volunteers` below the current count, or `hours_needed`
    /// below hours already logged against it, fails with `ConflictFailed`.
    /// The guard runs in the same statement as the write.
    pub fn update_opportunity(
        &self,
        id: &str,
        organization_id: &str,
        patch: &OpportunityPatch,
        now: &str,
    ) -> Result<(), MarketError> {
        let mut set = SetClause::new();
        for (col, value) in [
            ("title", &patch.title),
            ("description", &patch.description),
            ("date", &patch.date),
            ("time", &patch.time),
            ("location", &patch.location),
            ("city", &patch.city),
            ("state", &patch.state),
            ("zip_code", &patch.zip_code),
        ] {
            if let Some(v) = value {
                set.set(col, Value::from(v.as_str()));
            }
        }
        if let Some(category) = patch.category {
            set.set("category", Value::from(category.as_str()));
        }
        if let Some(hours) = patch.hours_needed {
            set.set("hours_needed", Value::from(hours));
        }
        if let Some(max) = patch.max_volunteers {
            set.set("max_volunteers", Value::from(max));
        }
        if let Some(status) = patch.status {
            set.set("status", Value::from(status.as_str()));
        }
        if let Some(ref req) = patch.requirements {
            set.set("requirements", clearable(req));
        }
        set.set("updated_at", Value::from(now));

        let id_param = set.bind(Value::from(id));
        let org_param = set.bind(Value::from(organization_id));
        let mut guards = vec![
            format!("id = {id_param}"),
            format!("organization_id = {org_param}"),
        ];
        if let Some(max) = patch.max_volunteers {
            let p = set.bind(Value::from(max));
            guards.push(format!("current_volunteers <= {p}"));
        }
        if let Some(hours) = patch.hours_needed {
            let p = set.bind(Value::from(hours));
            guards.push(format!(
                "NOT EXISTS (SELECT 1 FROM registrations r \
                 WHERE r.opportunity_id = opportunities.id AND r.hours_completed > {p})"
            ));
        }

        let sql = format!(
            "UPDATE opportunities SET {} WHERE {}",
            set.sql(),
            guards.join(" AND ")
        );
        match self
            .db
            .exec_atomic(&[Statement::new(sql, set.params).expect_rows(1)])
        {
            Ok(_) => Ok(()),
            Err(SQLError::Precondition { .. }) => Err(MarketError::ConflictFailed(format!(
                "opportunity {id} changed or would fall below its current registrations"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an opportunity with its registrations and bookmarks, and
    /// recompute the hour totals of every student who was registered.
    pub fn delete_opportunity(
        &self,
        id: &str,
        organization_id: &str,
        now: &str,
    ) -> Result<(), MarketError> {
        let batch = [
            Statement::new(
                "UPDATE accounts SET total_hours_logged = \
                 (SELECT COALESCE(SUM(r.hours_completed), 0) FROM registrations r \
                  WHERE r.user_id = accounts.id AND r.opportunity_id != ?1), \
                 updated_at = ?2 \
                 WHERE id IN (SELECT user_id FROM registrations WHERE opportunity_id = ?1)",
                vec![Value::from(id), Value::from(now)],
            ),
            Statement::new(
                "DELETE FROM registrations WHERE opportunity_id = ?1",
                vec![Value::from(id)],
            ),
            Statement::new(
                "DELETE FROM bookmarks WHERE opportunity_id = ?1",
                vec![Value::from(id)],
            ),
            Statement::new(
                "DELETE FROM opportunities WHERE id = ?1 AND organization_id = ?2",
                vec![Value::from(id), Value::from(organization_id)],
            )
            .expect_rows(1),
        ];
        match self.db.exec_atomic(&batch) {
            Ok(_) => Ok(()),
            Err(SQLError::Precondition { .. }) => {
                Err(MarketError::NotFound(format!("opportunity {id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Opportunity counters for one organization.
    pub fn organization_stats(&self, organization_id: &str) -> Result<OrganizationStats, MarketError> {
        let rows = self.db.query(
            "SELECT status, COUNT(*) AS cnt, \
             COALESCE(SUM(current_volunteers), 0) AS volunteers, \
             COALESCE(SUM(max_volunteers - current_volunteers), 0) AS open_slots \
             FROM opportunities WHERE organization_id = ?1 GROUP BY status",
            &[Value::from(organization_id)],
        )?;

        let mut stats = OrganizationStats::default();
        for row in &rows {
            let n = int(row, "cnt")?.max(0) as usize;
            stats.total_volunteers += int(row, "volunteers")?;
            match OpportunityStatus::from_str(&text(row, "status")?) {
                Some(OpportunityStatus::Active) => {
                    stats.active = n;
                    stats.open_slots = int(row, "open_slots")?;
                }
                Some(OpportunityStatus::Inactive) => stats.inactive = n,
                Some(OpportunityStatus::Completed) => stats.completed = n,
                None => {}
            }
        }
        Ok(stats)
    }
}

/// `%q%` with LIKE wildcards in `q` escaped by backslash.
fn like_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub(super) fn row_to_opportunity(row: &Row) -> Result<Opportunity, MarketError> {
    let category = text(row, "category")?;
    let status = text(row, "status")?;
    Ok(Opportunity {
        id: text(row, "id")?,
        organization_id: text(row, "organization_id")?,
        title: text(row, "title")?,
        description: text(row, "description")?,
        category: Category::from_str(&category)
            .ok_or_else(|| MarketError::Internal(format!("unknown category {category}")))?,
        hours_needed: int(row, "hours_needed")?,
        max_volunteers: int(row, "max_volunteers")?,
        current_volunteers: int(row, "current_volunteers")?,
        status: OpportunityStatus::from_str(&status)
            .ok_or_else(|| MarketError::Internal(format!("unknown status {status}")))?,
        date: text(row, "date")?,
        time: text(row, "time")?,
        location: text(row, "location")?,
        city: text(row, "city")?,
        state: text(row, "state")?,
        zip_code: text(row, "zip_code")?,
        requirements: opt_text(row, "requirements"),
        created_at: text(row, "created_at")?,
        updated_at: text(row, "updated_at")?,
    })
}

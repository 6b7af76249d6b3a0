use vhub_sql::{Row, Value};

use crate::model::{Account, AccountKind, ProfilePatch};
use crate::service::MarketError;

use super::{clearable, int, opt_text, text, MarketStore, SetClause};

const ACCOUNT_COLUMNS: &str = "id, email, kind, verified, display_name, phone, address, city, \
     website, bio, service_hours_goal, total_hours_logged, created_at, updated_at";

impl MarketStore {
    /// Insert a new account with its password hash. A taken email is a
    /// `ConflictFailed`.
    pub fn insert_account(&self, account: &Account, password_hash: &str) -> Result<(), MarketError> {
        self.db.exec(
            "INSERT INTO accounts (id, email, password_hash, kind, verified, display_name, \
             phone, address, city, website, bio, service_hours_goal, total_hours_logged, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            &[
                Value::from(account.id.as_str()),
                Value::from(account.email.as_str()),
                Value::from(password_hash),
                Value::from(account.kind.as_str()),
                Value::from(account.verified),
                Value::from(account.display_name.as_str()),
                Value::from(account.phone.clone()),
                Value::from(account.address.clone()),
                Value::from(account.city.clone()),
                Value::from(account.website.clone()),
                Value::from(account.bio.clone()),
                Value::from(account.service_hours_goal),
                Value::from(account.total_hours_logged),
                Value::from(account.created_at.as_str()),
                Value::from(account.updated_at.as_str()),
            ],
        )?;
        Ok(())
    }

    /// Get an account by ID.
    pub fn get_account(&self, id: &str) -> Result<Account, MarketError> {
        let rows = self.db.query(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            &[Value::from(id)],
        )?;
        let row = rows
            .first()
            .ok_or_else(|| MarketError::NotFound(format!("account {id}")))?;
        row_to_account(row)
    }

    /// Look up an account and its password hash by email (case-insensitive).
    pub fn account_by_email(&self, email: &str) -> Result<Option<(Account, String)>, MarketError> {
        let rows = self.db.query(
            &format!("SELECT {ACCOUNT_COLUMNS}, password_hash FROM accounts WHERE email = ?1"),
            &[Value::from(email)],
        )?;
        match rows.first() {
            Some(row) => Ok(Some((row_to_account(row)?, text(row, "password_hash")?))),
            None => Ok(None),
        }
    }

    /// Apply a profile patch. An empty string clears an optional field.
    pub fn update_profile(
        &self,
        id: &str,
        patch: &ProfilePatch,
        now: &str,
    ) -> Result<(), MarketError> {
        let mut set = SetClause::new();
        if let Some(ref v) = patch.display_name {
            set.set("display_name", Value::from(v.as_str()));
        }
        for (col, value) in [
            ("phone", &patch.phone),
            ("address", &patch.address),
            ("city", &patch.city),
            ("website", &patch.website),
            ("bio", &patch.bio),
        ] {
            if let Some(v) = value {
                set.set(col, clearable(v));
            }
        }
        if let Some(goal) = patch.service_hours_goal {
            set.set("service_hours_goal", Value::from(goal));
        }
        set.set("updated_at", Value::from(now));

        let id_param = set.bind(Value::from(id));
        let sql = format!("UPDATE accounts SET {} WHERE id = {id_param}", set.sql());
        let affected = self.db.exec(&sql, &set.params)?;
        if affected == 0 {
            return Err(MarketError::NotFound(format!("account {id}")));
        }
        Ok(())
    }

    /// Set an organization's verified flag. Returns false when no
    /// organization has that id.
    pub fn set_verified(&self, id: &str, verified: bool, now: &str) -> Result<bool, MarketError> {
        let affected = self.db.exec(
            "UPDATE accounts SET verified = ?1, updated_at = ?2 \
             WHERE id = ?3 AND kind = 'organization'",
            &[Value::from(verified), Value::from(now), Value::from(id)],
        )?;
        Ok(affected > 0)
    }

    /// The student's recomputed hour total.
    pub fn total_hours_logged(&self, id: &str) -> Result<i64, MarketError> {
        let rows = self.db.query(
            "SELECT COALESCE(total_hours_logged, 0) AS total FROM accounts WHERE id = ?1",
            &[Value::from(id)],
        )?;
        let row = rows
            .first()
            .ok_or_else(|| MarketError::NotFound(format!("account {id}")))?;
        int(row, "total")
    }
}

fn row_to_account(row: &Row) -> Result<Account, MarketError> {
    let kind = text(row, "kind")?;
    Ok(Account {
        id: text(row, "id")?,
        email: text(row, "email")?,
        kind: AccountKind::from_str(&kind)
            .ok_or_else(|| MarketError::Internal(format!("unknown account kind {kind}")))?,
        verified: row.get_bool("verified").unwrap_or(false),
        display_name: text(row, "display_name")?,
        phone: opt_text(row, "phone"),
        address: opt_text(row, "address"),
        city: opt_text(row, "city"),
        website: opt_text(row, "website"),
        bio: opt_text(row, "bio"),
        service_hours_goal: row.get_i64("service_hours_goal"),
        total_hours_logged: row.get_i64("total_hours_logged"),
        created_at: text(row, "created_at")?,
        updated_at: text(row, "updated_at")?,
    })
}

use vhub_sql::{Row, Value};

use crate::model::SavedBookmark;
use crate::service::MarketError;

use super::{text, MarketStore};

impl MarketStore {
    /// Save a bookmark. Saving an existing pair again keeps the original
    /// row and returns it.
    pub fn save_bookmark(
        &self,
        id: &str,
        user_id: &str,
        opportunity_id: &str,
        now: &str,
    ) -> Result<SavedBookmark, MarketError> {
        self.db.exec(
            "INSERT INTO bookmarks (id, user_id, opportunity_id, saved_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (user_id, opportunity_id) DO NOTHING",
            &[
                Value::from(id),
                Value::from(user_id),
                Value::from(opportunity_id),
                Value::from(now),
            ],
        )?;

        let rows = self.db.query(
            "SELECT id, user_id, opportunity_id, saved_at FROM bookmarks \
             WHERE user_id = ?1 AND opportunity_id = ?2",
            &[Value::from(user_id), Value::from(opportunity_id)],
        )?;
        let row = rows
            .first()
            .ok_or_else(|| MarketError::ConflictFailed("bookmark removed concurrently".into()))?;
        row_to_bookmark(row)
    }

    /// Remove a bookmark. Returns false when there was none.
    pub fn remove_bookmark(&self, user_id: &str, opportunity_id: &str) -> Result<bool, MarketError> {
        let affected = self.db.exec(
            "DELETE FROM bookmarks WHERE user_id = ?1 AND opportunity_id = ?2",
            &[Value::from(user_id), Value::from(opportunity_id)],
        )?;
        Ok(affected > 0)
    }

    /// A student's bookmarks, newest first.
    pub fn bookmarks_for_user(&self, user_id: &str) -> Result<Vec<SavedBookmark>, MarketError> {
        let rows = self.db.query(
            "SELECT id, user_id, opportunity_id, saved_at FROM bookmarks \
             WHERE user_id = ?1 ORDER BY saved_at DESC, id ASC",
            &[Value::from(user_id)],
        )?;
        rows.iter().map(row_to_bookmark).collect()
    }
}

fn row_to_bookmark(row: &Row) -> Result<SavedBookmark, MarketError> {
    Ok(SavedBookmark {
        id: text(row, "id")?,
        user_id: text(row, "user_id")?,
        opportunity_id: text(row, "opportunity_id")?,
        saved_at: text(row, "saved_at")?,
    })
}

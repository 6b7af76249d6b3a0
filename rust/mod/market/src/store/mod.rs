//! Persistent storage for marketplace records, backed by `SQLStore`.
//!
//! Reads return owned copies. Every write that touches more than one row
//! (registering, logging hours, cancelling, deleting an opportunity) is a
//! single `exec_atomic` batch whose guarded statements carry the
//! precondition; a failed guard rolls the batch back and surfaces as
//! `MarketError::ConflictFailed`.

mod accounts;
mod bookmarks;
mod opportunities;
mod registrations;
pub mod schema;

use std::sync::Arc;

use vhub_sql::{Row, SQLStore, Value};

use crate::service::MarketError;

pub use opportunities::OrganizationStats;
pub use registrations::StudentStats;

pub struct MarketStore {
    db: Arc<dyn SQLStore>,
}

impl MarketStore {
    /// Create a new MarketStore and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, MarketError> {
        schema::init_schema(db.as_ref())?;
        Ok(Self { db })
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn text(row: &Row, col: &str) -> Result<String, MarketError> {
    row.get_str(col)
        .map(str::to_string)
        .ok_or_else(|| MarketError::Internal(format!("column {col} missing or not text")))
}

fn opt_text(row: &Row, col: &str) -> Option<String> {
    row.get_str(col).map(str::to_string)
}

fn int(row: &Row, col: &str) -> Result<i64, MarketError> {
    row.get_i64(col)
        .ok_or_else(|| MarketError::Internal(format!("column {col} missing or not integer")))
}

fn count(rows: &[Row]) -> usize {
    rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0).max(0) as usize
}

/// An optional text patch value: empty clears the column.
fn clearable(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::Text(value.to_string())
    }
}

/// Accumulates `col = ?n` assignments for a partial UPDATE.
struct SetClause {
    parts: Vec<String>,
    params: Vec<Value>,
}

impl SetClause {
    fn new() -> Self {
        Self {
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    fn set(&mut self, col: &str, value: Value) {
        self.params.push(value);
        self.parts.push(format!("{col} = ?{}", self.params.len()));
    }

    /// Bind a value for use in the WHERE clause, returning its placeholder.
    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    fn sql(&self) -> String {
        self.parts.join(", ")
    }
}

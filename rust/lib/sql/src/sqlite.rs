use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::{ToSql, ValueRef};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use tracing::debug;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Statement, Value};

/// How long a writer waits on a locked database before giving up with
/// [`SQLError::Busy`].
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path).map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL for concurrent readers; foreign keys are off by default in SQLite.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SQLError> {
        self.conn
            .lock()
            .map_err(|e| SQLError::Connection(format!("connection mutex poisoned: {}", e)))
    }
}

fn to_sql(value: &Value) -> &dyn ToSql {
    match value {
        Value::Null => &rusqlite::types::Null,
        Value::Integer(i) => i,
        Value::Real(f) => f,
        Value::Text(s) => s,
        Value::Blob(b) => b,
    }
}

fn bind_params(params: &[Value]) -> Vec<&dyn ToSql> {
    params.iter().map(to_sql).collect()
}

/// Sort rusqlite failures into constraint, busy, or the given fallback kind.
fn classify(err: rusqlite::Error, fallback: fn(String) -> SQLError) -> SQLError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        match failure.code {
            ErrorCode::ConstraintViolation => return SQLError::Constraint(err.to_string()),
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return SQLError::Busy(err.to_string())
            }
            _ => {}
        }
    }
    fallback(err.to_string())
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(sql).map_err(|e| classify(e, SQLError::Query))?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();

        let rows = stmt
            .query_map(bind_params(params).as_slice(), |row| {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    columns.push((name.clone(), row_value_at(row, i)?));
                }
                Ok(Row { columns })
            })
            .map_err(|e| classify(e, SQLError::Query))?;

        // Bound to a local so the iterator borrowing `stmt` ends here.
        let result = rows
            .map(|row| row.map_err(|e| classify(e, SQLError::Query)))
            .collect();
        result
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self.lock()?;
        let affected = conn
            .execute(sql, bind_params(params).as_slice())
            .map_err(|e| classify(e, SQLError::Execution))?;
        Ok(affected as u64)
    }

    fn exec_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, SQLError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front so the guarded reads
        // inside the batch see no interleaved writer.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| classify(e, SQLError::Execution))?;

        let mut counts = Vec::with_capacity(statements.len());
        for (index, stmt) in statements.iter().enumerate() {
            let affected = tx
                .execute(&stmt.sql, bind_params(&stmt.params).as_slice())
                .map_err(|e| classify(e, SQLError::Execution))? as u64;

            if let Some(expected) = stmt.expect {
                if affected != expected {
                    debug!(index, expected, affected, "atomic batch precondition failed, rolling back");
                    // Dropping `tx` rolls the transaction back.
                    return Err(SQLError::Precondition {
                        index,
                        expected,
                        affected,
                    });
                }
            }
            counts.push(affected);
        }

        tx.commit().map_err(|e| classify(e, SQLError::Execution))?;
        Ok(counts)
    }
}

/// Extract a Value from a rusqlite row by its storage class.
fn row_value_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

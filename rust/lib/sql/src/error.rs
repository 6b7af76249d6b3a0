use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A UNIQUE, CHECK or FOREIGN KEY constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The database was busy or locked; the same call may succeed later.
    #[error("database busy: {0}")]
    Busy(String),

    /// A statement inside an atomic batch affected an unexpected number of
    /// rows. The whole batch was rolled back.
    #[error("precondition failed at statement {index}: expected {expected} row(s), affected {affected}")]
    Precondition {
        index: usize,
        expected: u64,
        affected: u64,
    },
}

impl SQLError {
    /// Whether retrying the same call unchanged can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SQLError::Busy(_) | SQLError::Connection(_))
    }
}

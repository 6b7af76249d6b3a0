use thiserror::Error;

#[derive(Error, Debug)]
pub enum KVError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<redb::Error> for KVError {
    fn from(e: redb::Error) -> Self {
        KVError::Storage(e.to_string())
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema migration failed: {0}")]
    SchemaMigration(String),

    #[error("operation invalid in state {0:?}")]
    BadState(crate::LibraryState),

    #[error("device {0} is not present")]
    DeviceAbsent(String),

    #[error("no filesystem factory for mrl '{0}'")]
    UnsupportedMrl(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Error {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::ConstraintViolation(
                    msg.clone().unwrap_or_else(|| e.to_string()),
                )
            }
            _ => Error::Database(err),
        }
    }
}

impl Error {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::ConstraintViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

use shared_database::DbError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification not found: {0}")]
    NotFound(String),

    #[error("Notification sink rejected the record: {0}")]
    Sink(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<rusqlite::Error> for NotificationError {
    fn from(err: rusqlite::Error) -> Self {
        NotificationError::Database(DbError::from(err))
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(_) => AppError::NotFound(err.to_string()),
            NotificationError::Sink(msg) => AppError::Internal(msg),
            NotificationError::Database(db) => db.into(),
        }
    }
}

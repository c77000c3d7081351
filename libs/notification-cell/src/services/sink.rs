use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::NotificationError;
use crate::models::NewNotification;
use crate::services::store::NotificationStore;

/// Downstream collaborator that accepts a notification and returns its id.
///
/// Implementations write through the caller's connection so the record lands
/// in the same unit of work as the transition that produced it.
pub trait NotificationSink: Send + Sync {
    fn record(
        &self,
        conn: &Connection,
        notification: &NewNotification,
    ) -> Result<Uuid, NotificationError>;
}

/// Stores notifications in the `notifications` table for later delivery.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteNotificationSink;

impl NotificationSink for SqliteNotificationSink {
    fn record(
        &self,
        conn: &Connection,
        notification: &NewNotification,
    ) -> Result<Uuid, NotificationError> {
        NotificationStore::insert(conn, notification, Utc::now())
    }
}

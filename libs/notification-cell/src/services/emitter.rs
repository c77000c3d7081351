use std::sync::Arc;

use rusqlite::Connection;
use tracing::{error, info};
use uuid::Uuid;

use shared_database::with_savepoint;

use crate::models::{AppointmentEvent, AppointmentNotice, NewNotification};
use crate::services::sink::{NotificationSink, SqliteNotificationSink};

/// Best-effort producer of patient notifications for appointment transitions.
///
/// Each record is written inside a savepoint of the caller's transaction. A
/// failing sink rolls back only its own partial work and is logged; the
/// caller's appointment change is never affected.
#[derive(Clone)]
pub struct NotificationEmitter {
    sink: Arc<dyn NotificationSink>,
}

impl Default for NotificationEmitter {
    fn default() -> Self {
        Self::new(Arc::new(SqliteNotificationSink))
    }
}

impl NotificationEmitter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub fn emit(
        &self,
        conn: &Connection,
        notice: &AppointmentNotice,
        event: AppointmentEvent,
    ) -> Option<Uuid> {
        let notification = NewNotification::for_event(notice, event);

        let recorded = with_savepoint(conn, "notification_emit", |conn| {
            self.sink.record(conn, &notification)
        });

        match recorded {
            Ok(id) => {
                info!(
                    "Recorded {} notification {} for appointment {}",
                    notification.notification_type.as_str(),
                    id,
                    notice.appointment_id
                );
                Some(id)
            }
            Err(err) => {
                error!(
                    "Failed to record {:?} notification for appointment {}: {}",
                    event, notice.appointment_id, err
                );
                None
            }
        }
    }
}

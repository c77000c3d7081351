use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use shared_database::time::encode_timestamp;
use shared_models::auth::{Actor, Role};

use crate::error::NotificationError;
use crate::models::{NewNotification, Notification, NotificationQuery, NotificationRow};

const COLUMNS: &str = "id, appointment_id, patient_id, notification_type, channel, title, \
                       message, sent_at, read_at, created_at";

fn notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        patient_id: row.get(2)?,
        notification_type: row.get(3)?,
        channel: row.get(4)?,
        title: row.get(5)?,
        message: row.get(6)?,
        sent_at: row.get(7)?,
        read_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn collect(rows: Vec<NotificationRow>) -> Result<Vec<Notification>, NotificationError> {
    Ok(rows
        .into_iter()
        .map(Notification::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}

/// Patient actors only ever see their own records; `None` means unrestricted.
/// A patient without a linked profile sees nothing.
fn patient_scope(actor: &Actor) -> Option<String> {
    match actor.role {
        Role::Patient => Some(
            actor
                .profile_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ),
        Role::Professional | Role::Admin => None,
    }
}

pub struct NotificationStore;

impl NotificationStore {
    pub fn insert(
        conn: &Connection,
        notification: &NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Uuid, NotificationError> {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO notifications
                (id, appointment_id, patient_id, notification_type, channel, title, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.to_string(),
                notification.appointment_id.map(|a| a.to_string()),
                notification.patient_id.to_string(),
                notification.notification_type.as_str(),
                notification.channel.as_str(),
                notification.title,
                notification.message,
                encode_timestamp(&now),
            ],
        )?;
        Ok(id)
    }

    pub fn list_for_actor(
        conn: &Connection,
        actor: &Actor,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, NotificationError> {
        let sql = format!(
            "SELECT {} FROM notifications
             WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 = 0 OR read_at IS NULL)
             ORDER BY created_at DESC",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![patient_scope(actor), query.unread_only], notification_row)?
            .collect::<Result<Vec<_>, _>>()?;
        collect(rows)
    }

    pub fn list_for_appointment(
        conn: &Connection,
        appointment_id: Uuid,
    ) -> Result<Vec<Notification>, NotificationError> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE appointment_id = ?1 ORDER BY created_at",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([appointment_id.to_string()], notification_row)?
            .collect::<Result<Vec<_>, _>>()?;
        collect(rows)
    }

    /// Records outside the actor's scope are reported as missing.
    pub fn get(
        conn: &Connection,
        actor: &Actor,
        notification_id: Uuid,
    ) -> Result<Notification, NotificationError> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE id = ?1 AND (?2 IS NULL OR patient_id = ?2)",
            COLUMNS
        );
        let row = conn
            .query_row(
                &sql,
                params![notification_id.to_string(), patient_scope(actor)],
                notification_row,
            )
            .optional()?
            .ok_or_else(|| NotificationError::NotFound(notification_id.to_string()))?;
        Ok(Notification::try_from(row)?)
    }

    /// The first read receipt wins.
    pub fn mark_read(
        conn: &Connection,
        actor: &Actor,
        notification_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Notification, NotificationError> {
        Self::get(conn, actor, notification_id)?;
        conn.execute(
            "UPDATE notifications SET read_at = COALESCE(read_at, ?2) WHERE id = ?1",
            params![notification_id.to_string(), encode_timestamp(&now)],
        )?;
        Self::get(conn, actor, notification_id)
    }

    pub fn mark_all_read(
        conn: &Connection,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<usize, NotificationError> {
        let updated = conn.execute(
            "UPDATE notifications SET read_at = ?2
             WHERE read_at IS NULL AND (?1 IS NULL OR patient_id = ?1)",
            params![patient_scope(actor), encode_timestamp(&now)],
        )?;
        debug!("Marked {} notifications as read for {}", updated, actor.user_id);
        Ok(updated)
    }

    /// Delivery receipt from the external dispatcher.
    pub fn mark_sent(
        conn: &Connection,
        actor: &Actor,
        notification_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Notification, NotificationError> {
        let updated = conn.execute(
            "UPDATE notifications SET sent_at = COALESCE(sent_at, ?2) WHERE id = ?1",
            params![notification_id.to_string(), encode_timestamp(&now)],
        )?;
        if updated == 0 {
            return Err(NotificationError::NotFound(notification_id.to_string()));
        }
        Self::get(conn, actor, notification_id)
    }
}

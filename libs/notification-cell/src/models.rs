use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{
    parse_uuid,
    time::{decode_optional_timestamp, decode_timestamp},
    DbError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    AppointmentReminder,
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentModified,
    BudgetReady,
    InvoiceIssued,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::AppointmentReminder => "APPOINTMENT_REMINDER",
            NotificationType::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            NotificationType::AppointmentCancelled => "APPOINTMENT_CANCELLED",
            NotificationType::AppointmentModified => "APPOINTMENT_MODIFIED",
            NotificationType::BudgetReady => "BUDGET_READY",
            NotificationType::InvoiceIssued => "INVOICE_ISSUED",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPOINTMENT_REMINDER" => Ok(NotificationType::AppointmentReminder),
            "APPOINTMENT_CONFIRMED" => Ok(NotificationType::AppointmentConfirmed),
            "APPOINTMENT_CANCELLED" => Ok(NotificationType::AppointmentCancelled),
            "APPOINTMENT_MODIFIED" => Ok(NotificationType::AppointmentModified),
            "BUDGET_READY" => Ok(NotificationType::BudgetReady),
            "INVOICE_ISSUED" => Ok(NotificationType::InvoiceIssued),
            other => Err(format!("unknown notification type {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    #[default]
    InApp,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "EMAIL",
            NotificationChannel::Sms => "SMS",
            NotificationChannel::Push => "PUSH",
            NotificationChannel::InApp => "IN_APP",
        }
    }
}

impl FromStr for NotificationChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMAIL" => Ok(NotificationChannel::Email),
            "SMS" => Ok(NotificationChannel::Sms),
            "PUSH" => Ok(NotificationChannel::Push),
            "IN_APP" => Ok(NotificationChannel::InApp),
            other => Err(format!("unknown notification channel {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: NotificationChannel,
    pub title: String,
    pub message: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

pub(crate) struct NotificationRow {
    pub id: String,
    pub appointment_id: Option<String>,
    pub patient_id: String,
    pub notification_type: String,
    pub channel: String,
    pub title: String,
    pub message: String,
    pub sent_at: Option<String>,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DbError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: parse_uuid(&row.id)?,
            appointment_id: row.appointment_id.as_deref().map(parse_uuid).transpose()?,
            patient_id: parse_uuid(&row.patient_id)?,
            notification_type: row.notification_type.parse().map_err(DbError::Malformed)?,
            channel: row.channel.parse().map_err(DbError::Malformed)?,
            title: row.title,
            message: row.message,
            sent_at: decode_optional_timestamp(row.sent_at)?,
            read_at: decode_optional_timestamp(row.read_at)?,
            created_at: decode_timestamp(&row.created_at)?,
        })
    }
}

/// What a producer hands to a [`crate::NotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: NotificationChannel,
    pub title: String,
    pub message: String,
}

/// Appointment transitions that produce a patient-facing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
    Requested,
    Confirmed,
    Cancelled,
    Modified,
}

/// The slice of an appointment the emitter needs to phrase a message.
#[derive(Debug, Clone)]
pub struct AppointmentNotice {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub treatment_type: String,
    pub start_time: DateTime<Utc>,
}

impl NewNotification {
    pub fn for_event(notice: &AppointmentNotice, event: AppointmentEvent) -> Self {
        let when = notice.start_time.format("%d/%m/%Y %H:%M");
        let treatment = &notice.treatment_type;

        let (notification_type, title, message) = match event {
            AppointmentEvent::Requested => (
                NotificationType::AppointmentReminder,
                "Cita solicitada",
                format!(
                    "Su cita para {} ha sido solicitada y está pendiente de aprobación.",
                    treatment
                ),
            ),
            AppointmentEvent::Confirmed => (
                NotificationType::AppointmentConfirmed,
                "Cita confirmada",
                format!("Su cita para {} el {} ha sido confirmada.", treatment, when),
            ),
            AppointmentEvent::Cancelled => (
                NotificationType::AppointmentCancelled,
                "Cita cancelada",
                format!("Su cita para {} ha sido cancelada.", treatment),
            ),
            AppointmentEvent::Modified => (
                NotificationType::AppointmentModified,
                "Cita modificada",
                format!(
                    "Su cita para {} ha sido modificada. Nueva fecha: {}.",
                    treatment, when
                ),
            ),
        };

        Self {
            appointment_id: Some(notice.appointment_id),
            patient_id: notice.patient_id,
            notification_type,
            channel: NotificationChannel::default(),
            title: title.to_string(),
            message,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn notice() -> AppointmentNotice {
        AppointmentNotice {
            appointment_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            treatment_type: "Fisioterapia".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 3, 7, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_messages_per_event() {
        let notice = notice();

        let requested = NewNotification::for_event(&notice, AppointmentEvent::Requested);
        assert_eq!(requested.notification_type, NotificationType::AppointmentReminder);
        assert_eq!(requested.title, "Cita solicitada");
        assert_eq!(requested.channel, NotificationChannel::InApp);

        let confirmed = NewNotification::for_event(&notice, AppointmentEvent::Confirmed);
        assert_eq!(confirmed.title, "Cita confirmada");
        assert!(confirmed.message.contains("07/03/2025 09:30"));

        let cancelled = NewNotification::for_event(&notice, AppointmentEvent::Cancelled);
        assert_eq!(cancelled.notification_type, NotificationType::AppointmentCancelled);
        assert_eq!(cancelled.appointment_id, Some(notice.appointment_id));
        assert_eq!(cancelled.patient_id, notice.patient_id);
    }

    #[test]
    fn test_type_wire_names() {
        assert_eq!(
            serde_json::to_value(NotificationType::AppointmentCancelled).unwrap(),
            "APPOINTMENT_CANCELLED"
        );
        assert_eq!(
            "INVOICE_ISSUED".parse::<NotificationType>(),
            Ok(NotificationType::InvoiceIssued)
        );
        assert!("SOMETHING".parse::<NotificationChannel>().is_err());
    }
}

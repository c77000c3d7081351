//! SQLite schema definition.

/// Complete database schema for the clinic backend.
///
/// Timestamps are fixed-width UTC RFC 3339 strings (see [`crate::time`]) so
/// that text comparison in range predicates matches chronological order.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Registered profiles (identity lives upstream; these are the domain anchors)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patient_profiles (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS professional_profiles (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    specialty TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Resources
-- ============================================================================

CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'AVAILABLE'
        CHECK (status IN ('AVAILABLE', 'OCCUPIED', 'MAINTENANCE')),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS equipment (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    room_id TEXT REFERENCES rooms(id) ON DELETE SET NULL,
    status TEXT NOT NULL DEFAULT 'AVAILABLE'
        CHECK (status IN ('AVAILABLE', 'MAINTENANCE', 'OUT_OF_SERVICE')),
    serial_number TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_equipment_room ON equipment(room_id);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patient_profiles(id) ON DELETE CASCADE,
    professional_id TEXT NOT NULL REFERENCES professional_profiles(id) ON DELETE CASCADE,
    room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE RESTRICT,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING'
        CHECK (status IN ('PENDING', 'CONFIRMED', 'COMPLETED', 'CANCELLED')),
    treatment_type TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    created_by TEXT,
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (end_time > start_time)
);

CREATE INDEX IF NOT EXISTS idx_appointments_professional_window
    ON appointments(professional_id, start_time, end_time);
CREATE INDEX IF NOT EXISTS idx_appointments_room_window
    ON appointments(room_id, start_time, end_time);
CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);
CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status);

-- Equipment membership is owned by the appointment
CREATE TABLE IF NOT EXISTS appointment_equipment (
    appointment_id TEXT NOT NULL REFERENCES appointments(id) ON DELETE CASCADE,
    equipment_id TEXT NOT NULL REFERENCES equipment(id) ON DELETE CASCADE,
    PRIMARY KEY (appointment_id, equipment_id)
);

-- ============================================================================
-- Notifications (created only as a side effect of state transitions)
-- ============================================================================

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    appointment_id TEXT REFERENCES appointments(id) ON DELETE CASCADE,
    patient_id TEXT NOT NULL REFERENCES patient_profiles(id) ON DELETE CASCADE,
    notification_type TEXT NOT NULL CHECK (notification_type IN (
        'APPOINTMENT_REMINDER', 'APPOINTMENT_CONFIRMED', 'APPOINTMENT_CANCELLED',
        'APPOINTMENT_MODIFIED', 'BUDGET_READY', 'INVOICE_ISSUED'
    )),
    channel TEXT NOT NULL DEFAULT 'IN_APP'
        CHECK (channel IN ('EMAIL', 'SMS', 'PUSH', 'IN_APP')),
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    sent_at TEXT,
    read_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_patient ON notifications(patient_id, created_at);
CREATE INDEX IF NOT EXISTS idx_notifications_appointment ON notifications(appointment_id);
"#;

//! v001 -- Initial schema creation.
//!
//! Creates the two core tables: `users` and `donations`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    display_name    TEXT NOT NULL,
    role            TEXT NOT NULL,              -- 'donor' | 'rescuer'
    credential_hash TEXT,                       -- opaque, owned by the auth layer
    verified        INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    lat             REAL,                       -- nullable home position
    lng             REAL,
    created_at      TEXT NOT NULL               -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Donations
-- ----------------------------------------------------------------
-- donor_id and claimed_by reference users(id) but are deliberately not
-- declared as foreign keys: user records are reference targets, not owners,
-- and the engine must accept donations whose users it never sees.
CREATE TABLE IF NOT EXISTS donations (
    id                 TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    donor_id           TEXT NOT NULL,              -- users(id)
    title              TEXT NOT NULL,
    description        TEXT NOT NULL,
    quantity_kg        REAL NOT NULL,
    food_type          TEXT NOT NULL,
    lat                REAL NOT NULL,
    lng                REAL NOT NULL,
    created_at         TEXT NOT NULL,              -- ISO-8601
    freshness_deadline TEXT NOT NULL,              -- ISO-8601, immutable
    state              TEXT NOT NULL,              -- 'open' | 'claimed' | 'expired' | 'cancelled'
    claimed_by         TEXT,                       -- set iff state = 'claimed'
    claimed_at         TEXT                        -- set iff claimed_by is set
);

CREATE INDEX IF NOT EXISTS idx_donations_state
    ON donations(state, created_at DESC);

-- Reaper scan: open donations past their deadline.
CREATE INDEX IF NOT EXISTS idx_donations_state_deadline
    ON donations(state, freshness_deadline);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

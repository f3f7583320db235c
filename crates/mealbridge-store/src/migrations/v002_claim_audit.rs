//! v002 -- Claim-attempt audit trail.
//!
//! Every resolved claim attempt is appended here, keyed by donation, so
//! contested pickups can be reconstructed after the fact.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS claim_attempts (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    donation_id  TEXT NOT NULL,               -- donations(id)
    rescuer_id   TEXT NOT NULL,               -- users(id)
    outcome      TEXT NOT NULL,               -- 'won' | 'lost' | 'already_terminal'
    attempted_at TEXT NOT NULL                -- ISO-8601
);

CREATE INDEX IF NOT EXISTS idx_claim_attempts_donation
    ON claim_attempts(donation_id, seq);
"#;

/// Apply the audit-trail migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

//! Claim-attempt audit trail.
//!
//! Append-only: rows are written when a claim attempt resolves and read back
//! when a contested pickup needs to be reconstructed.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use mealbridge_shared::{ClaimOutcome, DonationId, UserId};

use crate::database::Database;
use crate::error::Result;
use crate::models::ClaimAttempt;

impl Database {
    /// Append one resolved claim attempt.
    pub fn record_claim_attempt(
        &self,
        donation_id: DonationId,
        rescuer_id: UserId,
        outcome: ClaimOutcome,
        attempted_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO claim_attempts (donation_id, rescuer_id, outcome, attempted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                donation_id.to_string(),
                rescuer_id.to_string(),
                outcome.as_str(),
                attempted_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All recorded attempts for a donation, in resolution order.
    pub fn claim_attempts_for(&self, donation_id: DonationId) -> Result<Vec<ClaimAttempt>> {
        let mut stmt = self.conn().prepare(
            "SELECT seq, donation_id, rescuer_id, outcome, attempted_at
             FROM claim_attempts
             WHERE donation_id = ?1
             ORDER BY seq",
        )?;

        let rows = stmt.query_map(params![donation_id.to_string()], row_to_attempt)?;

        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row?);
        }
        Ok(attempts)
    }
}

fn row_to_attempt(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClaimAttempt> {
    let donation_str: String = row.get(1)?;
    let rescuer_str: String = row.get(2)?;
    let outcome_str: String = row.get(3)?;
    let ts_str: String = row.get(4)?;

    let donation_id = Uuid::parse_str(&donation_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let rescuer_id = Uuid::parse_str(&rescuer_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let outcome = ClaimOutcome::parse(&outcome_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown claim outcome '{outcome_str}'").into(),
        )
    })?;

    let attempted_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ClaimAttempt {
        seq: row.get(0)?,
        donation_id: DonationId(donation_id),
        rescuer_id: UserId(rescuer_id),
        outcome,
        attempted_at,
    })
}

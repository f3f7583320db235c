//! CRUD and state transitions for [`Donation`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use mealbridge_shared::{Coordinate, DonationId, DonationState, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Donation;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new donation row. The caller has already validated the
    /// payload; the store persists whatever state the record carries.
    pub fn insert_donation(&self, donation: &Donation) -> Result<()> {
        self.conn().execute(
            "INSERT INTO donations
                 (id, donor_id, title, description, quantity_kg, food_type,
                  lat, lng, created_at, freshness_deadline, state, claimed_by, claimed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                donation.id.to_string(),
                donation.donor_id.to_string(),
                donation.title,
                donation.description,
                donation.quantity_kg,
                donation.food_type,
                donation.coordinate.lat,
                donation.coordinate.lng,
                donation.created_at.to_rfc3339(),
                donation.freshness_deadline.to_rfc3339(),
                donation.state.as_str(),
                donation.claimed_by.map(|u| u.to_string()),
                donation.claimed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single donation by id.
    pub fn get_donation(&self, id: DonationId) -> Result<Donation> {
        self.conn()
            .query_row(
                &format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1"),
                params![id.to_string()],
                row_to_donation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List open donations, newest first.
    pub fn list_open_donations(&self, limit: u32) -> Result<Vec<Donation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations
             WHERE state = 'open'
             ORDER BY created_at DESC
             LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit], row_to_donation)?;

        let mut donations = Vec::new();
        for row in rows {
            donations.push(row?);
        }
        Ok(donations)
    }

    /// Every open donation, in no particular order. Used to rebuild the
    /// spatial projection on startup.
    pub fn open_donations(&self) -> Result<Vec<Donation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE state = 'open'"
        ))?;

        let rows = stmt.query_map([], row_to_donation)?;

        let mut donations = Vec::new();
        for row in rows {
            donations.push(row?);
        }
        Ok(donations)
    }

    /// Ids of open donations whose freshness deadline has passed.
    ///
    /// RFC 3339 timestamps with a fixed UTC offset compare correctly as
    /// text, so the scan runs against the (state, deadline) index.
    pub fn expired_candidates(&self, now: DateTime<Utc>) -> Result<Vec<DonationId>> {
        let mut stmt = self.conn().prepare(
            "SELECT id FROM donations
             WHERE state = 'open' AND freshness_deadline <= ?1",
        )?;

        let rows = stmt.query_map(params![now.to_rfc3339()], |row| {
            let id_str: String = row.get(0)?;
            parse_uuid_col(0, &id_str)
        })?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(DonationId(row?));
        }
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Conditional transition (the compare-and-swap primitive)
    // ------------------------------------------------------------------

    /// Transition a donation out of `expected` into `next`, atomically.
    ///
    /// The update applies only while the persisted state still equals
    /// `expected`. If the row exists but the state has moved on, the call
    /// fails with [`StoreError::StaleState`] carrying the observed state;
    /// an unknown id fails with [`StoreError::NotFound`]. At most one of
    /// any set of concurrent transitions out of `Open` can succeed.
    pub fn transition_donation(
        &self,
        id: DonationId,
        expected: DonationState,
        next: DonationState,
        claimed_by: Option<UserId>,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE donations
             SET state = ?1, claimed_by = ?2, claimed_at = ?3
             WHERE id = ?4 AND state = ?5",
            params![
                next.as_str(),
                claimed_by.map(|u| u.to_string()),
                claimed_at.map(|t| t.to_rfc3339()),
                id.to_string(),
                expected.as_str(),
            ],
        )?;

        if affected == 0 {
            // Distinguish "already handled" from "no such donation".
            let actual = self.get_donation(id)?.state;
            return Err(StoreError::StaleState { actual });
        }

        Ok(())
    }
}

const DONATION_COLUMNS: &str = "id, donor_id, title, description, quantity_kg, food_type, \
     lat, lng, created_at, freshness_deadline, state, claimed_by, claimed_at";

fn row_to_donation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Donation> {
    let id_str: String = row.get(0)?;
    let donor_str: String = row.get(1)?;
    let state_str: String = row.get(10)?;
    let claimed_by_str: Option<String> = row.get(11)?;
    let claimed_at_str: Option<String> = row.get(12)?;

    let state = DonationState::parse(&state_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            rusqlite::types::Type::Text,
            format!("unknown donation state '{state_str}'").into(),
        )
    })?;

    let claimed_by = match claimed_by_str {
        Some(s) => Some(UserId(parse_uuid_col(11, &s)?)),
        None => None,
    };
    let claimed_at = match claimed_at_str {
        Some(s) => Some(parse_ts_col(12, &s)?),
        None => None,
    };

    Ok(Donation {
        id: DonationId(parse_uuid_col(0, &id_str)?),
        donor_id: UserId(parse_uuid_col(1, &donor_str)?),
        title: row.get(2)?,
        description: row.get(3)?,
        quantity_kg: row.get(4)?,
        food_type: row.get(5)?,
        coordinate: Coordinate::new(row.get(6)?, row.get(7)?),
        created_at: parse_ts_col(8, &row.get::<_, String>(8)?)?,
        freshness_deadline: parse_ts_col(9, &row.get::<_, String>(9)?)?,
        state,
        claimed_by,
        claimed_at,
    })
}

fn parse_uuid_col(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_ts_col(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

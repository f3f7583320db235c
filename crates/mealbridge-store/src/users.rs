//! CRUD operations for [`User`] records.
//!
//! Users are reference targets for the donation engine; registration and
//! credentials belong to the upstream auth layer.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use mealbridge_shared::{Coordinate, Role, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert a new user.
    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users
                 (id, display_name, role, credential_hash, verified, lat, lng, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.to_string(),
                user.display_name,
                user.role.as_str(),
                user.credential_hash,
                user.verified,
                user.location.map(|c| c.lat),
                user.location.map(|c| c.lng),
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single user by id.
    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, display_name, role, credential_hash, verified, lat, lng, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let role_str: String = row.get(2)?;
    let lat: Option<f64> = row.get(5)?;
    let lng: Option<f64> = row.get(6)?;
    let ts_str: String = row.get(7)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let role = Role::parse(&role_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown role '{role_str}'").into(),
        )
    })?;

    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
        _ => None,
    };

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: UserId(id),
        display_name: row.get(1)?,
        role,
        credential_hash: row.get(3)?,
        verified: row.get(4)?,
        location,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn insert_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();

        let user = User {
            id: UserId::new(),
            display_name: "Save Lives NGO".into(),
            role: Role::Rescuer,
            credential_hash: Some("argon2:opaque".into()),
            verified: true,
            location: Some(Coordinate::new(6.1, 3.1)),
            created_at: Utc::now(),
        };
        db.insert_user(&user).unwrap();

        let loaded = db.get_user(user.id).unwrap();
        assert_eq!(loaded.display_name, user.display_name);
        assert_eq!(loaded.role, Role::Rescuer);
        assert!(loaded.verified);
        assert_eq!(loaded.location, user.location);
    }

    #[test]
    fn unknown_user_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();

        match db.get_user(UserId::new()) {
            Err(StoreError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}

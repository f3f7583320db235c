//! Thin user directory.
//!
//! The engine only needs users as reference targets: the server checks role
//! and verification before letting a request near the donation core.
//! Registration flows, credentials and verification decisions live upstream.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use mealbridge_shared::{Coordinate, Role, UserId};
use mealbridge_store::{Database, User};

use crate::error::Result;

/// A provisioning payload from the trusted upstream layer.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: String,
    pub role: Role,
    /// Opaque; stored for the auth layer, never inspected here.
    pub credential_hash: Option<String>,
    pub verified: bool,
    pub location: Option<Coordinate>,
}

/// Lookup and provisioning of user records.
pub struct UserDirectory {
    db: Arc<Mutex<Database>>,
}

impl UserDirectory {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    pub async fn register(&self, new: NewUser) -> Result<User> {
        if let Some(location) = &new.location {
            location.validate()?;
        }

        let user = User {
            id: UserId::new(),
            display_name: new.display_name,
            role: new.role,
            credential_hash: new.credential_hash,
            verified: new.verified,
            location: new.location,
            created_at: Utc::now(),
        };

        self.db.lock().await.insert_user(&user)?;
        debug!(id = %user.id, role = user.role.as_str(), "user registered");
        Ok(user)
    }

    pub async fn get(&self, id: UserId) -> Result<User> {
        Ok(self.db.lock().await.get_user(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineError;
    use mealbridge_shared::ValidationError;

    fn test_db(dir: &tempfile::TempDir) -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(
            Database::open_at(&dir.path().join("users.db")).unwrap(),
        ))
    }

    #[tokio::test]
    async fn register_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let directory = UserDirectory::new(test_db(&dir));

        let user = directory
            .register(NewUser {
                display_name: "Pro Kitchen".into(),
                role: Role::Donor,
                credential_hash: None,
                verified: true,
                location: Some(Coordinate::new(6.0, 3.0)),
            })
            .await
            .unwrap();

        let loaded = directory.get(user.id).await.unwrap();
        assert_eq!(loaded.role, Role::Donor);
        assert!(loaded.verified);
    }

    #[tokio::test]
    async fn bad_home_location_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let directory = UserDirectory::new(test_db(&dir));

        let result = directory
            .register(NewUser {
                display_name: "Nowhere".into(),
                role: Role::Rescuer,
                credential_hash: None,
                verified: false,
                location: Some(Coordinate::new(0.0, 200.0)),
            })
            .await;

        assert!(matches!(
            result,
            Err(EngineError::Validation(ValidationError::InvalidLongitude(_)))
        ));
    }
}

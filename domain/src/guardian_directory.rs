use async_trait::async_trait;
use entity_api::guardian;
use events::Id;
use notification::enqueuer::{GuardianDevice, GuardianDirectory};
use notification::error::{Error, NotificationErrorKind};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Resolves guardian devices from the school's parent and device-token records.
pub struct PgGuardianDirectory {
    db: Arc<DatabaseConnection>,
}

impl PgGuardianDirectory {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GuardianDirectory for PgGuardianDirectory {
    async fn guardian_devices(&self, student_id: Id) -> Result<Vec<GuardianDevice>, Error> {
        let tokens = guardian::find_active_devices_for_student(&self.db, student_id)
            .await
            .map_err(directory_error)?;

        Ok(tokens
            .into_iter()
            .map(|token| GuardianDevice {
                user_id: token.user_id,
                target_ref: token.token,
            })
            .collect())
    }

    async fn deactivate_target(&self, target_ref: &str) -> Result<(), Error> {
        guardian::deactivate_device_token(&self.db, target_ref)
            .await
            .map_err(directory_error)?;
        Ok(())
    }
}

fn directory_error(err: entity_api::error::Error) -> Error {
    Error::new(NotificationErrorKind::Directory, crate::error::Error::from(err))
}

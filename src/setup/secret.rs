use crate::consts::JWT_SECRET_KEY;
use crate::db::PropertyRepo;
use crate::error::AppResult;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{error, warn};
use uuid::Uuid;

/// Result of making sure the session signing secret exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretStatus {
    /// A new secret was generated in this run
    Created,
    /// A secret was already stored and left untouched
    Existing,
}

/// Store a freshly generated signing secret unless one already exists.
///
/// An existing secret is never rotated.
pub async fn ensure_secret(conn: &mut SqliteConnection) -> AppResult<SecretStatus> {
    if PropertyRepo::get(&mut *conn, JWT_SECRET_KEY).await?.is_some() {
        return Ok(SecretStatus::Existing);
    }

    warn!("Creating JWT secret, used for encrypting UI sessions");
    let secret = Uuid::new_v4().to_string();
    if let Err(e) = PropertyRepo::put(&mut *conn, JWT_SECRET_KEY, &secret).await {
        error!("Could not save JWT secret in DB: {}", e);
        return Err(e);
    }

    Ok(SecretStatus::Created)
}

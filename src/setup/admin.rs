use crate::consts::{DEV_INITIAL_NAME, DEV_INITIAL_USER_NAME};
use crate::db::{NewUser, UserRepo};
use crate::error::{AppError, AppResult};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{error, warn};

/// Result of the bootstrap admin step.
///
/// A failed write is an advisory outcome, not an error: setup still completes
/// and the operator has to create the account another way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminSeed {
    /// No bootstrap password configured
    NotConfigured,
    /// The admin account was written
    Created { user_id: String },
    /// Accounts already exist, nothing written
    Skipped { existing_users: i64 },
    /// The account could not be written
    Failed { reason: String },
}

/// Create the development admin account if, and only if, the store has no users.
///
/// Fails only when the user table cannot be counted, which means the store is
/// broken; write failures come back as [`AdminSeed::Failed`].
pub async fn ensure_admin(conn: &mut SqliteConnection, password: &str) -> AppResult<AdminSeed> {
    if password.is_empty() {
        return Ok(AdminSeed::NotConfigured);
    }

    let existing_users = UserRepo::count_all(&mut *conn)
        .await
        .map_err(|e| AppError::store_invariant(format!("Could not access User table: {}", e)))?;

    if existing_users > 0 {
        return Ok(AdminSeed::Skipped { existing_users });
    }

    let user = NewUser {
        id: NewUser::generate_id(),
        user_name: DEV_INITIAL_USER_NAME.to_string(),
        name: DEV_INITIAL_NAME.to_string(),
        email: String::new(),
        new_password: password.to_string(),
        is_admin: true,
    };
    warn!(
        user = %user.user_name,
        id = %user.id,
        "Creating initial admin user. This should only be used for development purposes!!"
    );

    match UserRepo::put(&mut *conn, &user).await {
        Ok(()) => Ok(AdminSeed::Created { user_id: user.id }),
        Err(e) => {
            error!(user = ?user, "Could not create initial admin user: {}", e);
            Ok(AdminSeed::Failed {
                reason: e.to_string(),
            })
        }
    }
}

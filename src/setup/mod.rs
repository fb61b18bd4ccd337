//! One-time store bootstrap.
//!
//! On every start the server calls [`run_initial_setup`]. The first run
//! against a store creates the session signing secret, optionally seeds a
//! development admin account, and writes the completion marker, all inside one
//! transaction. Every later run sees the marker and does nothing.
//!
//! ## Failure policy
//!
//! - Secret creation failure rolls everything back and is returned as an error.
//! - Admin write failure is recorded as [`AdminSeed::Failed`]; the marker is
//!   still committed.
//! - A user table that cannot be counted is [`AppError::StoreInvariant`](crate::error::AppError::StoreInvariant);
//!   the caller must stop the process.

pub mod admin;
pub mod secret;

pub use admin::{ensure_admin, AdminSeed};
pub use secret::{ensure_secret, SecretStatus};

use crate::config::AppConfig;
use crate::consts::{INITIAL_SETUP_FLAG_KEY, JWT_SECRET_KEY};
use crate::db::queries::begin_immediate;
use crate::db::{DbPool, PropertyRepo};
use crate::error::AppResult;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};

/// What a call to [`run_initial_setup`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SetupOutcome {
    /// The completion marker was already present; nothing was touched
    AlreadyComplete,
    /// Bootstrap ran and was committed
    Completed { secret: SecretStatus, admin: AdminSeed },
}

impl SetupOutcome {
    /// Whether bootstrap committed without the requested admin account.
    pub fn admin_failed(&self) -> bool {
        matches!(
            self,
            Self::Completed {
                admin: AdminSeed::Failed { .. },
                ..
            }
        )
    }
}

/// Bootstrap progress as observed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
    /// Neither secret nor marker exist
    NotStarted,
    /// The secret exists but setup was never marked complete
    SecretReady,
    /// The completion marker exists
    Complete,
}

impl std::fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::SecretReady => "secret ready",
            Self::Complete => "complete",
        };
        write!(f, "{}", s)
    }
}

/// Read the bootstrap state from the reserved properties.
pub async fn bootstrap_state(pool: &DbPool) -> AppResult<BootstrapState> {
    if PropertyRepo::get(pool, INITIAL_SETUP_FLAG_KEY).await?.is_some() {
        return Ok(BootstrapState::Complete);
    }
    if PropertyRepo::get(pool, JWT_SECRET_KEY).await?.is_some() {
        return Ok(BootstrapState::SecretReady);
    }
    Ok(BootstrapState::NotStarted)
}

/// Run the initial setup unless the store is already marked as set up.
pub async fn run_initial_setup(pool: &DbPool, config: &AppConfig) -> AppResult<SetupOutcome> {
    let mut tx = begin_immediate(pool).await?;

    // Any failure reading the marker is handled like a missing marker.
    match PropertyRepo::get(&mut *tx, INITIAL_SETUP_FLAG_KEY).await {
        Ok(Some(marker)) => {
            debug!(completed_at = %marker.value, "Initial setup already done");
            tx.rollback().await?;
            return Ok(SetupOutcome::AlreadyComplete);
        }
        Ok(None) => {}
        Err(e) => debug!("Could not read initial setup flag: {}", e),
    }

    match bootstrap(&mut *tx, config).await {
        Ok(outcome) => {
            tx.commit().await?;
            info!("Initial setup complete");
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("Could not roll back initial setup: {}", rollback_err);
            }
            Err(e)
        }
    }
}

async fn bootstrap(conn: &mut SqliteConnection, config: &AppConfig) -> AppResult<SetupOutcome> {
    warn!("Running initial setup");

    let secret = ensure_secret(&mut *conn).await?;

    let admin = match config.bootstrap_admin_password() {
        Some(password) => ensure_admin(&mut *conn, password).await?,
        None => AdminSeed::NotConfigured,
    };
    if let AdminSeed::Failed { reason } = &admin {
        // Setup is still marked complete; the admin will not be retried.
        warn!("Marking initial setup complete without the bootstrap admin: {}", reason);
    }

    PropertyRepo::put(&mut *conn, INITIAL_SETUP_FLAG_KEY, &Utc::now().to_rfc3339())
        .await
        .map_err(|e| {
            error!("Could not save initial setup flag: {}", e);
            e
        })?;

    Ok(SetupOutcome::Completed { secret, admin })
}

/// Surface the outcome in the log. Fatal errors never reach here.
pub fn report(outcome: &SetupOutcome) {
    match outcome {
        SetupOutcome::AlreadyComplete => debug!("Store already bootstrapped"),
        SetupOutcome::Completed { secret, admin } => {
            info!(?secret, "Signing secret ready");
            match admin {
                AdminSeed::NotConfigured => {}
                AdminSeed::Created { user_id } => info!(%user_id, "Bootstrap admin created"),
                AdminSeed::Skipped { existing_users } => {
                    info!(existing_users, "Users already exist, bootstrap admin not created")
                }
                AdminSeed::Failed { reason } => {
                    warn!("Bootstrap admin missing, create one manually: {}", reason)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DEV_INITIAL_USER_NAME;
    use crate::db::queries::setup_test_db;
    use crate::db::{Property, User, UserRepo};
    use crate::error::AppError;

    fn config_with_password(password: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.dev.auto_create_admin_password = password.to_string();
        config
    }

    async fn snapshot(pool: &DbPool) -> (Vec<Property>, Vec<(String, String, bool)>) {
        let properties = sqlx::query_as::<_, Property>("SELECT id, value FROM properties ORDER BY id")
            .fetch_all(pool)
            .await
            .unwrap();
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(pool)
            .await
            .unwrap()
            .into_iter()
            .map(|u| (u.id, u.user_name, u.is_admin))
            .collect();
        (properties, users)
    }

    #[tokio::test]
    async fn test_first_run_creates_everything() {
        let pool = setup_test_db().await;
        assert_eq!(bootstrap_state(&pool).await.unwrap(), BootstrapState::NotStarted);

        let outcome = run_initial_setup(&pool, &config_with_password("dev123"))
            .await
            .unwrap();
        match &outcome {
            SetupOutcome::Completed {
                secret: SecretStatus::Created,
                admin: AdminSeed::Created { .. },
            } => {}
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!outcome.admin_failed());

        let secret = PropertyRepo::get(&pool, JWT_SECRET_KEY).await.unwrap().unwrap();
        assert!(!secret.value.is_empty());
        let marker = PropertyRepo::get(&pool, INITIAL_SETUP_FLAG_KEY)
            .await
            .unwrap()
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&marker.value).is_ok());

        assert_eq!(UserRepo::count_all(&pool).await.unwrap(), 1);
        let admin = UserRepo::authenticate(&pool, DEV_INITIAL_USER_NAME, "dev123")
            .await
            .unwrap()
            .expect("admin should authenticate");
        assert!(admin.is_admin);
        assert_eq!(bootstrap_state(&pool).await.unwrap(), BootstrapState::Complete);
    }

    #[tokio::test]
    async fn test_second_run_changes_nothing() {
        let pool = setup_test_db().await;
        run_initial_setup(&pool, &config_with_password("dev123"))
            .await
            .unwrap();
        let before = snapshot(&pool).await;

        let outcome = run_initial_setup(&pool, &config_with_password("different"))
            .await
            .unwrap();
        assert_eq!(outcome, SetupOutcome::AlreadyComplete);
        assert_eq!(snapshot(&pool).await, before);

        assert_eq!(UserRepo::count_all(&pool).await.unwrap(), 1);
        assert!(UserRepo::authenticate(&pool, DEV_INITIAL_USER_NAME, "different")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_no_password_creates_no_user() {
        let pool = setup_test_db().await;
        let outcome = run_initial_setup(&pool, &AppConfig::default()).await.unwrap();
        assert_eq!(
            outcome,
            SetupOutcome::Completed {
                secret: SecretStatus::Created,
                admin: AdminSeed::NotConfigured,
            }
        );
        assert_eq!(UserRepo::count_all(&pool).await.unwrap(), 0);
        assert_eq!(bootstrap_state(&pool).await.unwrap(), BootstrapState::Complete);
    }

    #[tokio::test]
    async fn test_existing_user_blocks_admin() {
        let pool = setup_test_db().await;
        UserRepo::put(
            &pool,
            &crate::db::NewUser {
                id: crate::db::NewUser::generate_id(),
                user_name: "listener".to_string(),
                name: "Listener".to_string(),
                email: String::new(),
                new_password: "pw".to_string(),
                is_admin: false,
            },
        )
        .await
        .unwrap();

        let outcome = run_initial_setup(&pool, &config_with_password("dev123"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SetupOutcome::Completed {
                secret: SecretStatus::Created,
                admin: AdminSeed::Skipped { existing_users: 1 },
            }
        );
        assert_eq!(UserRepo::count_all(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_secret_failure_commits_nothing() {
        let pool = setup_test_db().await;
        sqlx::query(
            "CREATE TRIGGER reject_secret BEFORE INSERT ON properties \
             WHEN NEW.id = 'JWTSecret' \
             BEGIN SELECT RAISE(ABORT, 'secret storage unavailable'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let result = run_initial_setup(&pool, &config_with_password("dev123")).await;
        assert!(result.is_err());
        assert!(!result.unwrap_err().is_fatal_invariant());

        assert!(PropertyRepo::get(&pool, INITIAL_SETUP_FLAG_KEY)
            .await
            .unwrap()
            .is_none());
        assert!(PropertyRepo::get(&pool, JWT_SECRET_KEY).await.unwrap().is_none());
        assert_eq!(UserRepo::count_all(&pool).await.unwrap(), 0);
        assert_eq!(bootstrap_state(&pool).await.unwrap(), BootstrapState::NotStarted);
    }

    #[tokio::test]
    async fn test_admin_failure_still_marks_complete() {
        let pool = setup_test_db().await;
        sqlx::query(
            "CREATE TRIGGER reject_users BEFORE INSERT ON users \
             BEGIN SELECT RAISE(ABORT, 'users are read-only'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let outcome = run_initial_setup(&pool, &config_with_password("dev123"))
            .await
            .unwrap();
        assert!(outcome.admin_failed());

        assert!(PropertyRepo::get(&pool, INITIAL_SETUP_FLAG_KEY)
            .await
            .unwrap()
            .is_some());
        assert!(PropertyRepo::get(&pool, JWT_SECRET_KEY).await.unwrap().is_some());
        assert_eq!(UserRepo::count_all(&pool).await.unwrap(), 0);

        // The marker now blocks any retry through this path.
        sqlx::query("DROP TRIGGER reject_users")
            .execute(&pool)
            .await
            .unwrap();
        let retry = run_initial_setup(&pool, &config_with_password("dev123"))
            .await
            .unwrap();
        assert_eq!(retry, SetupOutcome::AlreadyComplete);
        assert_eq!(UserRepo::count_all(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_broken_user_table_is_fatal_and_rolls_back() {
        let pool = setup_test_db().await;
        sqlx::query("DROP TABLE users").execute(&pool).await.unwrap();

        let err = run_initial_setup(&pool, &config_with_password("dev123"))
            .await
            .unwrap_err();
        assert!(err.is_fatal_invariant());
        assert!(matches!(err, AppError::StoreInvariant(_)));
        assert_eq!(bootstrap_state(&pool).await.unwrap(), BootstrapState::NotStarted);
    }

    #[tokio::test]
    async fn test_resumes_from_secret_ready() {
        let pool = setup_test_db().await;
        PropertyRepo::put(&pool, JWT_SECRET_KEY, "kept").await.unwrap();
        assert_eq!(bootstrap_state(&pool).await.unwrap(), BootstrapState::SecretReady);

        let outcome = run_initial_setup(&pool, &AppConfig::default()).await.unwrap();
        assert_eq!(
            outcome,
            SetupOutcome::Completed {
                secret: SecretStatus::Existing,
                admin: AdminSeed::NotConfigured,
            }
        );
        let secret = PropertyRepo::get(&pool, JWT_SECRET_KEY).await.unwrap().unwrap();
        assert_eq!(secret.value, "kept");
    }

    #[tokio::test]
    async fn test_unreadable_marker_reruns_setup() {
        let pool = setup_test_db().await;
        sqlx::query("INSERT INTO properties (id, value) VALUES ('InitialSetup', CAST(x'ff' AS BLOB))")
            .execute(&pool)
            .await
            .unwrap();
        assert!(PropertyRepo::get(&pool, INITIAL_SETUP_FLAG_KEY).await.is_err());

        let outcome = run_initial_setup(&pool, &AppConfig::default()).await.unwrap();
        assert_eq!(
            outcome,
            SetupOutcome::Completed {
                secret: SecretStatus::Created,
                admin: AdminSeed::NotConfigured,
            }
        );

        let marker = PropertyRepo::get(&pool, INITIAL_SETUP_FLAG_KEY)
            .await
            .unwrap()
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&marker.value).is_ok());
        assert_eq!(bootstrap_state(&pool).await.unwrap(), BootstrapState::Complete);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = SetupOutcome::Completed {
            secret: SecretStatus::Created,
            admin: AdminSeed::Skipped { existing_users: 2 },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "completed");
        assert_eq!(json["secret"], "created");
        assert_eq!(json["admin"]["status"], "skipped");
        assert_eq!(json["admin"]["existing_users"], 2);
    }

    #[test]
    fn test_bootstrap_state_display() {
        assert_eq!(BootstrapState::NotStarted.to_string(), "not started");
        assert_eq!(BootstrapState::Complete.to_string(), "complete");
    }
}

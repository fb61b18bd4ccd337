use crate::config::DatabaseConfig;
use crate::db::models::*;
use crate::db::password::{hash_password, verify_password};
use crate::error::AppResult;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, Pool, Sqlite, Transaction};
use std::time::Duration;
use tracing::info;

pub type DbPool = Pool<Sqlite>;

/// Open the SQLite pool, creating the database file if needed.
pub async fn connect(config: &DatabaseConfig) -> AppResult<DbPool> {
    let options = config
        .url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Begin a transaction that holds the SQLite write lock from its first
/// statement, so concurrent bootstraps queue up instead of failing on a
/// read-to-write lock upgrade.
pub async fn begin_immediate(pool: &DbPool) -> AppResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Database operations for server properties
pub struct PropertyRepo;

impl PropertyRepo {
    /// Get a property by key
    pub async fn get<'e, E>(executor: E, key: &str) -> AppResult<Option<Property>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let property = sqlx::query_as::<_, Property>("SELECT id, value FROM properties WHERE id = ?")
            .bind(key)
            .fetch_optional(executor)
            .await?;

        Ok(property)
    }

    /// Create or replace a property
    pub async fn put<'e, E>(executor: E, key: &str, value: &str) -> AppResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO properties (id, value)
            VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET
                value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(executor)
        .await?;

        Ok(())
    }
}

/// Database operations for user accounts
pub struct UserRepo;

impl UserRepo {
    /// Count all users
    pub async fn count_all<'e, E>(executor: E) -> AppResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    /// Create or update a user, hashing `new_password` on the way in
    pub async fn put<'e, E>(executor: E, user: &NewUser) -> AppResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let password_hash = hash_password(&user.new_password)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, user_name, name, email, password, is_admin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_name = excluded.user_name,
                name = excluded.name,
                email = excluded.email,
                password = excluded.password,
                is_admin = excluded.is_admin,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.user_name)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&password_hash)
        .bind(user.is_admin)
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Get user by username
    pub async fn get_by_user_name<'e, E>(executor: E, user_name: &str) -> AppResult<Option<User>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_name = ?")
            .bind(user_name)
            .fetch_optional(executor)
            .await?;

        Ok(user)
    }

    /// Return the user if `password` matches the stored hash
    pub async fn authenticate<'e, E>(
        executor: E,
        user_name: &str,
        password: &str,
    ) -> AppResult<Option<User>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let Some(user) = Self::get_by_user_name(executor, user_name).await? else {
            return Ok(None);
        };

        if verify_password(password, &user.password)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
pub async fn setup_test_db() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_db(&pool).await.expect("Failed to init database");
    pool
}

/// Initialize database schema
pub async fn init_db(pool: &DbPool) -> AppResult<()> {
    info!("Running database migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS properties (
            id TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY NOT NULL,
            user_name TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            password TEXT NOT NULL,
            is_admin BOOLEAN NOT NULL DEFAULT false,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_user_name ON users(user_name)")
        .execute(pool)
        .await?;

    info!("Database migrations complete");
    Ok(())
}

use thiserror::Error;

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// The store answered in a way that should be impossible (e.g. the user
    /// table cannot be counted). Startup must not continue.
    #[error("Store invariant violated: {0}")]
    StoreInvariant(String),
}

impl AppError {
    pub fn store_invariant<S: Into<String>>(msg: S) -> Self {
        Self::StoreInvariant(msg.into())
    }

    /// Whether this error means the store is in an unknown state and the
    /// process should terminate rather than serve requests.
    pub fn is_fatal_invariant(&self) -> bool {
        matches!(self, Self::StoreInvariant(_))
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::PasswordHash(err.to_string())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

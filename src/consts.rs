//! Reserved identifiers persisted in the store.
//!
//! These values are read back on every start to decide whether bootstrap has
//! already happened. They must never change between releases.

/// Property key whose presence marks the initial setup as done.
pub const INITIAL_SETUP_FLAG_KEY: &str = "InitialSetup";

/// Property key holding the secret used to sign UI session tokens.
pub const JWT_SECRET_KEY: &str = "JWTSecret";

/// Username of the development bootstrap administrator.
pub const DEV_INITIAL_USER_NAME: &str = "admin";

/// Display name of the development bootstrap administrator.
pub const DEV_INITIAL_NAME: &str = "Dev Admin";

/// Transcoder executable looked up on the search path.
pub const FFMPEG_BINARY: &str = "ffmpeg";

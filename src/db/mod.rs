//! SQLite-backed store: schema, records, and repositories used at bootstrap.

pub mod models;
pub mod password;
pub mod queries;

pub use models::{NewUser, Property, User};
pub use queries::{connect, init_db, DbPool, PropertyRepo, UserRepo};

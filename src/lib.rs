pub mod config;
pub mod consts;
pub mod db;
pub mod error;
pub mod probe;
pub mod setup;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use setup::{run_initial_setup, SetupOutcome};

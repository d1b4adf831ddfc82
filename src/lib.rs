//! AIRO admin glue
//!
//! Session handling for the admin-only web UI and a persistence gateway that
//! stores bot trades, snapshots, balance state and logs in a hosted backend.

pub mod auth;
pub mod config;
pub mod persistence;
pub mod secrets;
pub mod telemetry;

pub use auth::{SessionManager, SessionRecord};
pub use config::AppConfig;
pub use persistence::{gateway, PersistenceGateway};

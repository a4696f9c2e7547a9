//! Workshop backend
//!
//! User accounts and virtual economy for the map workshop platform:
//! registration/login with invite referrals, a daily check-in reward, a
//! dual-currency ledger (drops + lightning) with level progression, and
//! avatar blob storage.
//!
//! All balance mutations flow through [`ledger::Ledger`], which commits the
//! balance change, the level recompute and the append-only ledger entry in
//! one database transaction.

pub mod auth;
pub mod checkin;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod password;
pub mod progression;
pub mod security;
pub mod storage;
pub mod system_config;
pub mod user;

pub use config::Config;
pub use errors::{Result, WorkshopError};

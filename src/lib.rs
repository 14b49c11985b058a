//! Seatpool - license lifecycle and assignment engine for company seat pools
//!
//! This library owns a company's pool of purchased seats: it tracks each
//! license's state, enforces who may hold a seat, and executes single and
//! bulk assignment/revocation with explicit partial-failure behavior.
//! Dashboards and admin UIs are external collaborators that consume the
//! command/query HTTP interface in `handlers`.

pub mod bulk;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod export;
pub mod handlers;
pub mod id;
pub mod models;
pub mod pagination;
pub mod pool;
pub mod usage;
pub mod watchdog;

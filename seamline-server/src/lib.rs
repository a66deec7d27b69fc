//! # Seamline Server
//!
//! Real-time scan ingestion and dashboard fan-out for a factory
//! production-tracking system.
//!
//! ## Overview
//!
//! - **Ingestion**: RFID readers hold a WebSocket open on `/rfid-ws` and
//!   submit scan events; each accepted scan is persisted exactly once and
//!   acknowledged on the same connection.
//! - **Peer broadcast**: every successful write is pushed directly to the
//!   other connected readers.
//! - **Dashboard fan-out**: a change-feed watcher re-queries the full
//!   record set on every store mutation and publishes the snapshot to all
//!   dashboard clients on `/dashboard-ws`, regardless of where the write
//!   originated.
//!
//! ## Architecture
//!
//! The server is built on Axum and uses PostgreSQL (LISTEN/NOTIFY) for
//! persistent storage and the change-notification feed.

pub mod broadcast;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;

//! # Buchwald Backend Library
//!
//! Buchwald is a small library-management backend: it keeps a book catalog, a
//! user directory and the circulation ledger of borrow/return transactions,
//! including due dates and overdue fines.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: Modern web framework for HTTP server and routing
//! - **SQLx**: Asynchronous database operations with SQLite
//! - **Tokio**: Async runtime for concurrent operations
//! - **Serde**: Serialization/deserialization for JSON APIs
//!
//! ## Core Components
//!
//! - [`config`]: Application configuration management
//! - [`db`]: Database schema initialization and migrations
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`ledger`]: Circulation ledger: loan creation, overdue detection, fines,
//!   return settlement and the availability bookkeeping on book records
//! - [`metrics`]: Application usage metrics
//! - [`middleware`]: HTTP middleware for security headers and rate limiting
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: Shared application state
//! - [`types`]: Data transfer objects and shared type definitions

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;

//! HTTP route handlers for the Buchwald API.
//!
//! One sub-module per resource:
//!
//! - `auth`: registration, login and the mock face-recognition flow
//! - `books`: book catalog CRUD
//! - `borrow`: circulation (loans, returns, current/history/admin listings)
//! - `health`: health check and system status endpoints
//! - `stats`: aggregate dashboard statistics
//! - `users`: user directory CRUD

pub mod auth;
pub mod books;
pub mod borrow;
pub mod health;
pub mod stats;
pub mod users;

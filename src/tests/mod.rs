//! Integration and unit tests for the Buchwald application.
//!
//! ## Test Modules
//!
//! - **ledger_tests**: Circulation ledger behavior against a real SQLite database
//! - **api_tests**: HTTP endpoint tests via `tower::ServiceExt::oneshot`
//! - **error_tests**: Error handling and validation tests
//! - **config_tests**: Configuration loading and validation tests
//! - **db_tests**: Database schema and constraint tests

pub mod api_tests;
pub mod config_tests;
pub mod error_tests;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::EndpointRateLimiter;

/// The shared application state.
///
/// Holds the resources every handler needs: the SQLite pool, the immutable
/// configuration, usage metrics and the per-endpoint rate limiter. Cloneable
/// for use with Axum's request extraction system.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// The application metrics.
    pub metrics: Metrics,
    /// The per-endpoint rate limiter.
    pub rate_limiter: EndpointRateLimiter,
}

impl AppState {
    /// Creates a new `AppState` with initialized components.
    ///
    /// Default per-endpoint limits:
    /// - 120 loan operations per minute
    /// - 30 logins per minute
    /// - 10 face logins per minute
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let rate_limiter = EndpointRateLimiter::new().with_limits(vec![
            ("/borrow", 120, 60),         // 120 loan operations per minute
            ("/auth/login", 30, 60),      // 30 logins per minute
            ("/auth/face-login", 10, 60), // 10 face logins per minute
        ]);

        Self { db, config: Arc::new(config), metrics: Metrics::new(), rate_limiter }
    }
}

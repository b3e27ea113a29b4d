//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns layered onto the router: client identification,
//! rate limiting and security headers.

pub mod ip;
pub mod rate_limit;
pub mod security_headers;

pub use rate_limit::EndpointRateLimiter;

//! Caller identity.

mod middleware;

pub use middleware::*;

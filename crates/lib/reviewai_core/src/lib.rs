//! # reviewai_core
//!
//! Core domain logic for the ReviewAI gateway: device tokens, the
//! fixed-window throttle, upstream dispatch and the region-pinned
//! generative-AI unit.

pub mod auth;
pub mod models;
pub mod pin;
pub mod ratelimit;
pub mod upstream;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}

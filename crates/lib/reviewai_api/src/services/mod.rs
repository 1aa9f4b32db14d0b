//! Business logic used by the handlers.

pub mod auth;

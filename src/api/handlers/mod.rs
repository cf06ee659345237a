//! Route handlers for the HTTP surface.
//!
//! Each handler takes the shared [`AuthService`](crate::auth::AuthService)
//! via an `Extension` and maps domain errors to wire responses in one place.

pub mod auth;
pub mod health;
pub mod types;

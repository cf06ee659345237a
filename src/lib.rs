//! Email one-time-password authentication service.
//!
//! A small web service where the only credential is a short-lived OTP sent
//! out of band: `/signup` creates or refreshes a challenge, `/login` redeems
//! it for a signed session token and `/me` resolves that token back into the
//! identity. Every request body and query string passes through a recursive
//! sanitizer before any handler runs.

pub mod api;
pub mod auth;
pub mod cli;
pub mod sanitize;

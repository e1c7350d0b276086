//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the caller from a Bearer identity token.

pub mod auth;

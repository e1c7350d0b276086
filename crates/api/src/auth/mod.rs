//! Identity token verification.
//!
//! - [`jwt`] -- HS256 validation of identity-provider access tokens.

pub mod jwt;

//! # SecureWrap Shared Library
//!
//! Credential handling and persistence used by the SecureWrap API server.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, verification codes, tokens, and guards
//! - `captcha`: reCAPTCHA verification
//! - `db`: connection pool and migrations
//! - `mail`: verification email delivery
//! - `models`: users and audit entries

pub mod auth;
pub mod captcha;
pub mod db;
pub mod mail;
pub mod models;

/// Current version of the SecureWrap shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// API route handlers
///
/// - `health`: liveness and database probes
/// - `auth`: signup, verification, sign-in, logout
/// - `users`: current user and admin user listing
/// - `activities`: audit log listing
/// - `recaptcha`: captcha token verification

pub mod activities;
pub mod auth;
pub mod health;
pub mod recaptcha;
pub mod users;

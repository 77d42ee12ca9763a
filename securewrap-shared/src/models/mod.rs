/// Database models
///
/// - `user`: accounts, credentials, and verification state
/// - `audit_log`: append-only record of account actions

pub mod audit_log;
pub mod user;

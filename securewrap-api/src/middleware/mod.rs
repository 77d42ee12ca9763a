/// HTTP middleware
///
/// - `security`: security response headers
/// - `guard`: session and admin checks for protected routes

pub mod guard;
pub mod security;

/// Request extractors
///
/// [`ApiJson`] behaves like [`axum::Json`] but rejects bodies with an
/// [`ApiError`], so malformed or mistyped JSON gets the same
/// `{ "error", "message" }` shape as every other failure:
///
/// - body does not parse: `400 bad_request`
/// - missing `Content-Type: application/json`: `400 bad_request`
/// - parses but misses a field or has a wrong type: `422 validation_error`
///   on field `body`

use crate::error::ApiError;
use axum::extract::FromRequest;

/// JSON body extractor with API-shaped rejections
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

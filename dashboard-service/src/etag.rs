use axum::http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::ApiError;

/// Strong validator over the serialized body.
pub fn etag_for(body: &[u8]) -> String {
    format!("\"{}\"", blake3::hash(body).to_hex())
}

fn matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|candidate| candidate == etag || candidate == "*")
}

/// JSON response carrying an `ETag`; `304 Not Modified` when the client
/// already holds this body.
pub fn conditional_json<T: Serialize>(
    headers: &HeaderMap,
    value: &T,
) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value)
        .map_err(|e| ApiError::internal(format!("response serialization failed: {e}")))?;
    let etag = etag_for(&body);
    let etag_header = HeaderValue::from_str(&etag)
        .map_err(|e| ApiError::internal(format!("invalid etag header: {e}")))?;

    if matches(headers, &etag) {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(ETAG, etag_header), (CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        )
            .into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (ETAG, etag_header),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
        ],
        body,
    )
        .into_response())
}

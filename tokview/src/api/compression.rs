//! Gzip response compression middleware for Axum
//!
//! Compresses a response when the client accepts gzip, the response is not
//! already encoded, its content type is text-like (or unset), and the body
//! is larger than [`MIN_COMPRESS_BYTES`]. The body is buffered and
//! compressed in one pass at the highest level.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use flate2::{write::GzEncoder, Compression};
use std::io::Write;
use tracing::{debug, warn};

/// Bodies of this size or smaller are sent as-is
pub const MIN_COMPRESS_BYTES: usize = 1024;

/// Content types worth compressing (matched as substrings)
pub const COMPRESSIBLE_TYPES: &[&str] = &[
    "text/html",
    "text/plain",
    "text/css",
    "text/javascript",
    "application/javascript",
    "application/json",
    "application/xml",
    "text/xml",
];

/// Middleware that gzips eligible responses
pub async fn gzip_response(request: Request, next: Next) -> Response {
    let accepts_gzip = accepts_gzip(request.headers());
    let response = next.run(request).await;

    if !accepts_gzip || !is_compressible(response.headers()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if bytes.len() <= MIN_COMPRESS_BYTES {
        return Response::from_parts(parts, Body::from(bytes));
    }

    match gzip(&bytes) {
        Ok(compressed) => {
            debug!(
                original = bytes.len(),
                compressed = compressed.len(),
                "Compressed response"
            );
            parts
                .headers
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(compressed.len()));
            parts
                .headers
                .insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
            Response::from_parts(parts, Body::from(compressed))
        }
        Err(e) => {
            warn!(error = %e, "Gzip compression failed, sending uncompressed body");
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("gzip"))
        .unwrap_or(false)
}

fn is_compressible(headers: &HeaderMap) -> bool {
    if headers.contains_key(header::CONTENT_ENCODING) {
        return false;
    }

    match headers.get(header::CONTENT_TYPE) {
        // Untyped responses are usually HTML
        None => true,
        Some(value) => value
            .to_str()
            .map(|ct| ct.is_empty() || COMPRESSIBLE_TYPES.iter().any(|t| ct.contains(t)))
            .unwrap_or(false),
    }
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()
}

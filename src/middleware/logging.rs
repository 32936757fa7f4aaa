use axum::{
    body::{to_bytes, Body, Bytes},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const MAX_LOGGED_CHARS: usize = 2000;

/// Middleware that logs request and response bodies.
///
/// Runs inside `SetRequestIdLayer`, so every request already carries `x-request-id`.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let (parts, body) = request.into_parts();

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read request body: {}", e);
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    let request_body = String::from_utf8_lossy(&bytes);
    let truncated_request = truncate_body(&request_body, MAX_LOGGED_CHARS);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        body = %truncated_request,
        "→ Request"
    );

    // Reconstruct the request with the body
    let request = Request::from_parts(parts, Body::from(bytes));

    // Call the next middleware/handler
    let response = next.run(request).await;

    // Extract response status before consuming body
    let status = response.status();
    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read response body: {}", e);
            Bytes::new()
        }
    };

    let response_body = String::from_utf8_lossy(&bytes);
    let truncated_response = truncate_body(&response_body, MAX_LOGGED_CHARS);
    let latency = start.elapsed();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        body = %truncated_response,
        "← Response"
    );

    // Reconstruct the response with the body
    Response::from_parts(parts, Body::from(bytes))
}

/// Truncate body for logging on a char boundary
fn truncate_body(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max_chars) {
        None => body.to_string(),
        Some((cut, _)) => format!(
            "{}...[truncated, {} bytes total]",
            &body[..cut],
            body.len()
        ),
    }
}

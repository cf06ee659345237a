//! Request payload sanitization.
//!
//! Every inbound request passes through [`sanitize_request`] before a handler
//! runs: string leaves in the JSON body and query string values are rewritten
//! with HTML entities so markup/script content is neutral by the time any
//! handler sees it. Non-string scalars, keys, and container shape are left
//! untouched, and responses are never sanitized.
//!
//! Encoding is idempotent: an `&` that already starts one of the entities we
//! emit is kept verbatim, so sanitizing twice yields the same string.

use axum::{
    body::{self, Body},
    extract::Request,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        uri::{PathAndQuery, Uri},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use thiserror::Error;
use tracing::error;
use url::form_urlencoded;

/// Maximum nesting a payload may have before traversal fails fast.
pub const MAX_DEPTH: usize = 32;

/// Largest request body the middleware will buffer.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("payload nesting exceeds {MAX_DEPTH} levels")]
    PayloadTooDeep,
}

/// Encode markup-significant characters in a string leaf.
///
/// `< > " '` always become entities. `&` becomes `&amp;` unless it already
/// starts an entity this function emits, which keeps the encoding idempotent.
#[must_use]
pub fn sanitize_str(input: &str) -> String {
    const EMITTED: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&#x27;"];

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(ch) = rest.chars().next() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '&' => {
                if EMITTED.iter().any(|entity| rest.starts_with(entity)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            other => out.push(other),
        }
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Rewrite every string leaf of a JSON value in place.
///
/// Iterative worklist traversal; nesting past [`MAX_DEPTH`] returns
/// [`SanitizeError::PayloadTooDeep`] instead of recursing unboundedly.
///
/// # Errors
/// Returns `PayloadTooDeep` when the payload nests deeper than [`MAX_DEPTH`].
pub fn sanitize_value(root: &mut Value) -> Result<(), SanitizeError> {
    let mut stack: Vec<(&mut Value, usize)> = vec![(root, 0)];

    while let Some((value, depth)) = stack.pop() {
        if depth > MAX_DEPTH {
            return Err(SanitizeError::PayloadTooDeep);
        }
        match value {
            Value::String(leaf) => {
                *leaf = sanitize_str(leaf);
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    stack.push((item, depth + 1));
                }
            }
            Value::Object(map) => {
                for entry in map.values_mut() {
                    stack.push((entry, depth + 1));
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }

    Ok(())
}

/// Sanitize the values of a query string, preserving key order.
#[must_use]
pub fn sanitize_query(query: &str) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        serializer.append_pair(&key, &sanitize_str(&value));
    }
    serializer.finish()
}

/// Axum middleware applying sanitization to the request body and query string.
pub async fn sanitize_request(request: Request, next: Next) -> Response {
    match apply(request).await {
        Ok(request) => next.run(request).await,
        Err(response) => response,
    }
}

async fn apply(request: Request) -> Result<Request, Response> {
    let (mut parts, body) = request.into_parts();

    if let Some(query) = parts.uri.query() {
        let sanitized = sanitize_query(query);
        if sanitized != query {
            parts.uri = rewrite_query(&parts.uri, &sanitized).map_err(|err| {
                error!("Failed to rewrite sanitized query: {err}");
                (StatusCode::BAD_REQUEST, "Invalid query string".to_string()).into_response()
            })?;
        }
    }

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if !is_json {
        return Ok(Request::from_parts(parts, body));
    }

    let bytes = body::to_bytes(body, MAX_BODY_BYTES).await.map_err(|_| {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large".to_string(),
        )
            .into_response()
    })?;

    // A body that does not parse as JSON passes through untouched; the
    // handler's own extractor rejects it with the right status.
    let Ok(mut value) = serde_json::from_slice::<Value>(&bytes) else {
        return Ok(Request::from_parts(parts, Body::from(bytes)));
    };

    if let Err(err) = sanitize_value(&mut value) {
        return Err((StatusCode::BAD_REQUEST, err.to_string()).into_response());
    }

    let sanitized = serde_json::to_vec(&value).map_err(|err| {
        error!("Failed to serialize sanitized body: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Sanitization failed".to_string(),
        )
            .into_response()
    })?;

    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(sanitized.len()));

    Ok(Request::from_parts(parts, Body::from(sanitized)))
}

fn rewrite_query(uri: &Uri, query: &str) -> anyhow::Result<Uri> {
    let path = uri.path();
    let path_and_query = if query.is_empty() {
        PathAndQuery::try_from(path)?
    } else {
        PathAndQuery::try_from(format!("{path}?{query}"))?
    };
    let mut uri_parts = uri.clone().into_parts();
    uri_parts.path_and_query = Some(path_and_query);
    Ok(Uri::from_parts(uri_parts)?)
}

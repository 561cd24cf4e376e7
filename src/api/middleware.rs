//! API Middleware
//!
//! Trace-id propagation and actor-context resolution. Authentication itself
//! happens up-stack; by the time a request reaches this service a gateway
//! has verified the session and forwarded the identity headers.

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::domain::{DomainError, RequestContext, Role};
use crate::error::ApiError;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLES_HEADER: &str = "X-Actor-Roles";

/// Request-scoped correlation id, minted when the caller sent none.
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

/// Read or mint the trace id, stash it in request extensions, and echo it
/// on the response.
pub async fn trace_middleware(mut request: Request<Body>, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(TraceId(trace_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-trace-id"), value);
    }

    response
}

/// Resolve the pre-authenticated actor identity into a [`RequestContext`].
/// Requests without an actor id are answered 401.
pub async fn context_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let trace_id = request
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let Some(actor_id) = actor_id_from(request.headers()) else {
        return Err(
            ApiError::new(DomainError::Unauthenticated, trace_id).into_response()
        );
    };

    let roles = roles_from(request.headers());

    request
        .extensions_mut()
        .insert(RequestContext::new(actor_id, roles, trace_id));

    Ok(next.run(request).await)
}

/// Request logging with latency and trace correlation.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let trace_id = request
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis() as u64,
        trace_id = %trace_id,
        "request completed"
    );

    response
}

fn actor_id_from(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(ACTOR_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
}

/// Parse the comma-separated role list. Role membership is advisory input
/// to the policy; unknown names are skipped with a warning.
fn roles_from(headers: &HeaderMap) -> Vec<Role> {
    let Some(raw) = headers.get(ACTOR_ROLES_HEADER).and_then(|v| v.to_str().ok()) else {
        return Vec::new();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::warn!(role = s, "ignoring unknown role");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_actor_id_parsing() {
        assert_eq!(actor_id_from(&headers(&[("x-actor-id", "10")])), Some(10));
        assert_eq!(actor_id_from(&headers(&[("x-actor-id", " 7 ")])), Some(7));
        assert_eq!(actor_id_from(&headers(&[("x-actor-id", "abc")])), None);
        assert_eq!(actor_id_from(&headers(&[])), None);
    }

    #[test]
    fn test_roles_parsing() {
        let roles = roles_from(&headers(&[(
            "x-actor-roles",
            "ROLE_APPLICANT, ROLE_APPROVER",
        )]));
        assert_eq!(roles, vec![Role::Applicant, Role::Approver]);
    }

    #[test]
    fn test_roles_skip_unknown_and_empty() {
        let roles = roles_from(&headers(&[("x-actor-roles", "ROLE_WIZARD,,ROLE_ADMIN, ")]));
        assert_eq!(roles, vec![Role::Admin]);

        assert!(roles_from(&headers(&[])).is_empty());
    }
}

//! Per-request identifiers propagated through a task-local so that error
//! responses and response metadata can reference the request they belong to.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use http::HeaderValue;
use uuid::Uuid;

/// Header carrying the request id in and out of the service.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Opaque request identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(format!("req-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

tokio::task_local! {
    static REQUEST_ID: RequestId;
}

/// Returns the request id of the currently executing request, if any.
pub fn current_request_id() -> Option<RequestId> {
    REQUEST_ID.try_with(|rid| rid.clone()).ok()
}

/// Runs a future with the given request id installed in the task-local scope.
pub async fn scope_request_id<F>(rid: RequestId, fut: F) -> F::Output
where
    F: std::future::Future,
{
    REQUEST_ID.scope(rid, fut).await
}

/// Middleware that honors an inbound `x-request-id` header or generates one,
/// scopes it for the rest of the request, and echoes it on the response.
pub async fn request_id_middleware(request: Request<Body>, next: Next) -> Response {
    let rid = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(RequestId::new)
        .unwrap_or_else(RequestId::generate);

    let mut response = REQUEST_ID.scope(rid.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(rid.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_id_is_visible() {
        let observed = scope_request_id(RequestId::new("req-42"), async {
            current_request_id().map(|rid| rid.as_str().to_string())
        })
        .await;
        assert_eq!(observed.as_deref(), Some("req-42"));
    }

    #[tokio::test]
    async fn unscoped_id_is_absent() {
        assert!(current_request_id().is_none());
    }
}

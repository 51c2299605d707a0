//! Axum extractor for the authenticated principal.
//!
//! Token verification happens upstream (gateway or auth proxy); this service
//! receives the already-authenticated account id in the `x-user-id` header
//! and passes it explicitly into the service layer as a [`Principal`].

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::Principal;
use crate::errors::ApiError;

/// Header set by the upstream authentication layer.
pub const PRINCIPAL_HEADER: &str = "x-user-id";

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let user_id = Uuid::parse_str(raw.trim()).map_err(|_| ApiError::Unauthorized)?;
        Ok(Principal::new(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn extracts_valid_principal() {
        let user_id = Uuid::new_v4();
        let request = Request::builder()
            .header(PRINCIPAL_HEADER, user_id.to_string())
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let principal = Principal::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(principal.user_id, user_id);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let result = Principal::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn malformed_header_is_unauthorized() {
        let request = Request::builder()
            .header(PRINCIPAL_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let result = Principal::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }
}

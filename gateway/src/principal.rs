//! The authenticated caller. This service sits behind an edge proxy that
//! terminates auth and forwards the verified identity as headers; there is
//! no token validation here, only extraction. A request with no `X-User-Sub`
//! header has no principal and is rejected with 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts.extensions.get::<Uuid>().copied().unwrap_or_else(Uuid::new_v4);

        let user_id = parts
            .headers
            .get("x-user-sub")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized(request_id))?
            .to_string();

        let email = parts
            .headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Principal { user_id, email })
    }
}

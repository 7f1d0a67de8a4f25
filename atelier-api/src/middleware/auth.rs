/// Bearer-token authentication and the admin guard
///
/// `jwt_auth_layer` validates the access token and stores an [`AuthContext`]
/// in the request extensions. `admin_guard` runs after it on admin routes
/// and rejects any caller whose token does not carry the admin role.

use crate::{app::AppState, error::ApiError};
use atelier_shared::auth::{
    authorization::require_admin,
    middleware::{authenticate, AuthContext},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Requires a valid access token
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(req.headers(), state.jwt_secret())?;

    tracing::trace!(user_id = %auth.user_id, role = auth.role.as_str(), "request authenticated");

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}

/// Requires the admin role; must be layered inside `jwt_auth_layer`
pub async fn admin_guard(req: Request, next: Next) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("Missing credentials".to_string()))?;

    if let Err(err) = require_admin(auth) {
        tracing::warn!(user_id = %auth.user_id, path = %req.uri().path(), "admin route refused");
        return Err(err.into());
    }

    Ok(next.run(req).await)
}

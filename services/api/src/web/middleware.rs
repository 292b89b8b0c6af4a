//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use shop_core::ports::PortError;
use shop_core::{Principal, PrincipalKind};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::web::extract::bearer_token;
use crate::web::state::AppState;

/// Resolves the bearer token, if any, into a `Principal`.
///
/// Never rejects on its own: a missing or unknown token leaves the request
/// anonymous, and the guards below decide what that means for a route.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(req.headers()).map(str::to_string) else {
        return Ok(next.run(req).await);
    };

    match state.tokens.verify_token(&token).await {
        Ok(principal) => {
            debug!(principal_id = principal.id, kind = principal.kind.as_str(), "Authenticated request");
            req.extensions_mut().insert(principal);
        }
        Err(PortError::Unauthorized) | Err(PortError::NotFound(_)) => {
            warn!("Rejected bearer token; continuing anonymously");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(next.run(req).await)
}

fn require_kind(req: &Request, kind: PrincipalKind) -> Result<(), ApiError> {
    match req.extensions().get::<Principal>() {
        None => Err(ApiError::Unauthorized("Unauthenticated.".to_string())),
        Some(principal) if principal.kind != kind => {
            Err(ApiError::Forbidden("Unauthorized access".to_string()))
        }
        Some(_) => Ok(()),
    }
}

/// Lets only authenticated users through: 401 when anonymous, 403 for admins.
pub async fn require_user(req: Request, next: Next) -> Result<Response, ApiError> {
    require_kind(&req, PrincipalKind::User)?;
    Ok(next.run(req).await)
}

/// Lets only authenticated admins through: 401 when anonymous, 403 for users.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    require_kind(&req, PrincipalKind::Admin)?;
    Ok(next.run(req).await)
}

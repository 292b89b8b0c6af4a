//! services/api/src/web/auth.rs
//!
//! Registration, login, and logout for both users and admins. A user's
//! successful register or login also adopts the guest cart presented in the
//! `guest_token` cookie.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::{Deserialize, Serialize};
use shop_core::ports::PortError;
use shop_core::{GuestToken, Principal, PrincipalKind};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;
use crate::web::extract::{bearer_token, clear_guest_cookie, guest_cookie, MaybePrincipal, ValidatedJson};
use crate::web::response::{send, send_empty, with_cookie};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "The name field must be between 1 and 255 characters."))]
    pub name: String,
    #[validate(email(message = "The email field must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, max = 255, message = "The password field must be between 8 and 255 characters."))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "The email field must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "The password field is required."))]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthPayload {
    pub token: String,
    pub name: String,
    pub email: String,
}

//=========================================================================================
// Shared Flow
//=========================================================================================

fn label(kind: PrincipalKind) -> &'static str {
    match kind {
        PrincipalKind::User => "User",
        PrincipalKind::Admin => "Admin",
    }
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

fn password_matches(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Stored password hash is unreadable".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

const RETRY_REQUEST: &str = "Could not transfer the guest cart, please retry";
const RETRY_BY_LOGGING_IN: &str =
    "Your account was created but the guest cart could not be transferred, please log in to retry";

/// Moves the presented guest cart into the user's cart.
///
/// Returns the cookie that retires the guest token, or `None` when the request
/// carried no usable token. Any line left behind fails the whole request so the
/// client keeps its cookie and can retry.
async fn adopt_guest_cart(
    state: &AppState,
    headers: &HeaderMap,
    principal: &Principal,
    retry_hint: &'static str,
) -> Result<Option<String>, ApiError> {
    if principal.kind != PrincipalKind::User {
        return Ok(None);
    }
    let Some(token) = guest_cookie(headers).and_then(|raw| GuestToken::from_str(raw).ok()) else {
        return Ok(None);
    };

    let report = state.reconciler.reconcile(token, principal.id).await?;
    if !report.is_complete() {
        return Err(ApiError::StorageFailure {
            detail: format!(
                "{} of the guest cart lines for user {} were not moved",
                report.failed, principal.id
            ),
            retry_hint,
        });
    }
    Ok(Some(clear_guest_cookie()))
}

async fn signed_in(
    state: &AppState,
    headers: &HeaderMap,
    principal: Principal,
    status: StatusCode,
    message: String,
    retry_hint: &'static str,
) -> Result<Response, ApiError> {
    // Credentials are settled by now; only then does the guest cart move.
    let cookie = adopt_guest_cart(state, headers, &principal, retry_hint).await?;
    let token = state.tokens.issue_token(&principal).await?;
    let payload = AuthPayload {
        token,
        name: principal.name,
        email: principal.email,
    };
    Ok(with_cookie(send(status, message, Some(payload)), cookie))
}

async fn register(
    state: &AppState,
    headers: &HeaderMap,
    kind: PrincipalKind,
    req: RegisterRequest,
) -> Result<Response, ApiError> {
    let password_hash = hash_password(&req.password)?;
    let email = req.email.trim().to_lowercase();
    let principal = state
        .principals
        .create_principal(kind, req.name.trim(), &email, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => ApiError::Conflict("The email has already been taken.".to_string()),
            other => other.into(),
        })?;
    info!(principal_id = principal.id, kind = kind.as_str(), "Registered new account");

    let message = format!("{} Created Successfully", label(kind));
    // The account already exists, so a retry has to go through login.
    signed_in(state, headers, principal, StatusCode::CREATED, message, RETRY_BY_LOGGING_IN).await
}

async fn login(
    state: &AppState,
    headers: &HeaderMap,
    kind: PrincipalKind,
    req: LoginRequest,
) -> Result<Response, ApiError> {
    let rejected = || ApiError::Unauthorized(format!("{} Credentials do not exist", label(kind)));

    let credentials = match state.principals.get_credentials_by_email(kind, req.email.trim()).await {
        Ok(credentials) => credentials,
        Err(PortError::NotFound(_)) => {
            warn!(kind = kind.as_str(), "Login attempt for unknown email");
            return Err(rejected());
        }
        Err(e) => return Err(e.into()),
    };
    if !password_matches(&req.password, &credentials.hashed_password)? {
        warn!(principal_id = credentials.principal.id, "Login attempt with a wrong password");
        return Err(rejected());
    }

    let message = format!("{} Logged In Successfully", label(kind));
    signed_in(state, headers, credentials.principal, StatusCode::OK, message, RETRY_REQUEST).await
}

async fn logout(
    state: &AppState,
    headers: &HeaderMap,
    principal: Option<Principal>,
    kind: PrincipalKind,
) -> Result<Response, ApiError> {
    let token = bearer_token(headers);
    match (principal, token) {
        (Some(principal), Some(token)) if principal.kind == kind => {
            state.tokens.revoke_token(token).await?;
            info!(principal_id = principal.id, kind = kind.as_str(), "Logged out");
            Ok(send_empty(StatusCode::OK, "Logged Out Successfully"))
        }
        _ => Err(ApiError::Unauthorized("Unauthorized".to_string())),
    }
}

//=========================================================================================
// User Handlers
//=========================================================================================

/// POST /register - Create a user account and adopt the guest cart.
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = AuthPayload),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Guest cart could not be moved; retry")
    )
)]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    register(&state, &headers, PrincipalKind::User, req).await
}

/// POST /login - Log a user in and adopt the guest cart.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthPayload),
        (status = 401, description = "Invalid credentials"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, ApiError> {
    login(&state, &headers, PrincipalKind::User, req).await
}

/// POST /logout - Revoke the presented user token.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "No valid user token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_user(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    logout(&state, &headers, principal, PrincipalKind::User).await
}

//=========================================================================================
// Admin Handlers
//=========================================================================================

/// POST /admin/register - Create an admin account.
#[utoipa::path(
    post,
    path = "/admin/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Admin created", body = AuthPayload),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn register_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    register(&state, &headers, PrincipalKind::Admin, req).await
}

/// POST /admin/login
#[utoipa::path(
    post,
    path = "/admin/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthPayload),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, ApiError> {
    login(&state, &headers, PrincipalKind::Admin, req).await
}

/// POST /admin/logout - Revoke the presented admin token; any other token is 401.
#[utoipa::path(
    post,
    path = "/admin/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "No valid admin token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_admin(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    logout(&state, &headers, principal, PrincipalKind::Admin).await
}

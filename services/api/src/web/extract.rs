//! services/api/src/web/extract.rs
//!
//! Request extractors and header helpers shared by the handlers.

use crate::error::{ApiError, FieldErrors};
use axum::{
    extract::{
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use shop_core::identity::GUEST_TOKEN_COOKIE;
use shop_core::{GuestToken, Principal};
use std::convert::Infallible;
use tracing::debug;
use utoipa::IntoParams;
use validator::{Validate, ValidationErrors};

//=========================================================================================
// Validated JSON Bodies
//=========================================================================================

/// A JSON body that has passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        value.validate().map_err(|e| ApiError::Validation(field_errors(&e)))?;
        Ok(Self(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::field("body", rejection.body_text())
}

/// Flattens `validator` output into field → messages.
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, failures)| {
            let messages = failures
                .iter()
                .map(|failure| match &failure.message {
                    Some(message) => message.to_string(),
                    None => invalid_field_message(&field),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

//=========================================================================================
// Query Strings and Path Segments
//=========================================================================================

/// `Query<T>` whose failures are reported as 422 field errors.
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(query_rejection)?;
        Ok(Self(value))
    }
}

fn query_rejection(rejection: QueryRejection) -> ApiError {
    let text = rejection.body_text();
    debug!(error = %text, "Rejected query string");
    // "Failed to deserialize query string: <field>: <reason>"
    let field = text
        .split(": ")
        .nth(1)
        .filter(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or("query");
    ApiError::field(field, invalid_field_message(field))
}

/// `Path<T>` whose failures are reported as 422 field errors.
pub struct ValidatedPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(path_rejection)?;
        Ok(Self(value))
    }
}

fn path_rejection(rejection: PathRejection) -> ApiError {
    let error = match rejection {
        PathRejection::FailedToDeserializePathParams(error) => error,
        other => return ApiError::Internal(other.body_text()),
    };
    if error.status().is_server_error() {
        return ApiError::Internal(error.body_text());
    }
    debug!(error = %error.body_text(), "Rejected path segment");
    // Every route here has a single `{id}` segment, so an unnamed value is the id.
    let field = match error.kind() {
        ErrorKind::ParseErrorAtKey { key, .. } | ErrorKind::InvalidUtf8InPathParam { key } => key.as_str(),
        _ => "id",
    };
    ApiError::field(field, invalid_field_message(field))
}

fn invalid_field_message(field: &str) -> String {
    format!("The {} field is invalid.", field.replace('_', " "))
}


#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }
}

//=========================================================================================
// Principal Extraction
//=========================================================================================

/// The principal put in the request extensions by the `authenticate` middleware, if any.
pub struct MaybePrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for MaybePrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

//=========================================================================================
// Guest Cookie
//=========================================================================================

/// The raw `guest_token` cookie value, if the client sent one.
pub fn guest_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == GUEST_TOKEN_COOKIE).then_some(value)
        })
}

pub fn set_guest_cookie(token: GuestToken, max_age_minutes: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        GUEST_TOKEN_COOKIE,
        token,
        max_age_minutes * 60
    )
}

pub fn clear_guest_cookie() -> String {
    format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", GUEST_TOKEN_COOKIE)
}

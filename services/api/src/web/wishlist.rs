//! services/api/src/web/wishlist.rs
//!
//! Wishlist endpoints. Only reachable by authenticated users.

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Extension,
};
use serde::{Deserialize, Serialize};
use shop_core::ports::PortError;
use shop_core::{Page, PageRequest, Principal, WishlistToggle};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;
use crate::web::extract::{PageQuery, ValidatedJson, ValidatedQuery};
use crate::web::response::{listing, send, send_empty};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct WishlistRequest {
    #[validate(required(message = "The product id field is required."))]
    pub product_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct WishlistItem {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
}

fn product_id(req: &WishlistRequest) -> Result<i64, ApiError> {
    req.product_id
        .ok_or_else(|| ApiError::field("product_id", "The product id field is required."))
}

/// POST /wishlist/toggle-wishlist - Adds the product, or removes it if already listed.
#[utoipa::path(
    post,
    path = "/wishlist/toggle-wishlist",
    tag = "wishlist",
    request_body = WishlistRequest,
    responses(
        (status = 201, description = "Product added to the wishlist", body = i64),
        (status = 200, description = "Product removed from the wishlist"),
        (status = 422, description = "Unknown product or missing id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<Principal>,
    ValidatedJson(req): ValidatedJson<WishlistRequest>,
) -> Result<Response, ApiError> {
    let product_id = product_id(&req)?;
    if !state.catalog.product_exists(product_id).await? {
        return Err(ApiError::field("product_id", "The selected product id is invalid."));
    }

    match state.wishlist.toggle(user.id, product_id).await {
        Ok(WishlistToggle::Added) => Ok(send(StatusCode::CREATED, "Product added to wishlist", Some(product_id))),
        Ok(WishlistToggle::Removed) => Ok(send_empty(StatusCode::OK, "Product removed from wishlist")),
        // The product was deleted between the check and the insert.
        Err(PortError::NotFound(_)) => Err(ApiError::field("product_id", "The selected product id is invalid.")),
        Err(e) => Err(e.into()),
    }
}

/// GET /wishlist/view-wishlist
#[utoipa::path(
    get,
    path = "/wishlist/view-wishlist",
    tag = "wishlist",
    params(PageQuery),
    responses((status = 200, description = "Wishlist, or a null payload when it is empty", body = [WishlistItem])),
    security(("bearer_auth" = []))
)]
pub async fn view(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<Principal>,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Response, ApiError> {
    let request = PageRequest::new(query.page(), state.config.page_size);
    let (entries, total) = state.wishlist.list(user.id, request).await?;
    let page = Page::new(entries, request, total);
    if page.is_empty() {
        return Ok(send_empty(StatusCode::OK, "No Products found in your wishlist."));
    }
    let body = listing(
        page.map(|e| WishlistItem {
            id: e.id,
            product_id: e.product_id,
            product_name: e.product_name,
        }),
        &state.url("/wishlist/view-wishlist"),
    );
    Ok(send(StatusCode::OK, "Wishlist retrieved successfully", Some(body)))
}

/// POST /wishlist/remove-from-wishlist
#[utoipa::path(
    post,
    path = "/wishlist/remove-from-wishlist",
    tag = "wishlist",
    request_body = WishlistRequest,
    responses(
        (status = 200, description = "Product removed from the wishlist"),
        (status = 404, description = "Not in the wishlist")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<Principal>,
    ValidatedJson(req): ValidatedJson<WishlistRequest>,
) -> Result<Response, ApiError> {
    let product_id = product_id(&req)?;
    if state.wishlist.remove(user.id, product_id).await? {
        Ok(send_empty(StatusCode::OK, "Product removed from wishlist."))
    } else {
        Err(ApiError::NotFound("Wishlist item not found.".to_string()))
    }
}

//! services/api/src/web/cart.rs
//!
//! Cart endpoints. The same handlers serve `/guest-cart/*` and `/auth-cart/*`;
//! the owner is resolved per request from the bearer token and the
//! `guest_token` cookie, and a freshly minted guest token is sent back as a cookie.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::{resolve_owner, CartItem, CartView, OwnerIdentity, PageRequest, Principal};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;
use crate::web::extract::{
    guest_cookie, set_guest_cookie, MaybePrincipal, PageQuery, ValidatedJson, ValidatedQuery,
};
use crate::web::response::{listing, send, send_empty, with_cookie};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCartRequest {
    #[validate(required(message = "The product id field is required."))]
    pub product_id: Option<i64>,
    #[validate(
        required(message = "The quantity field is required."),
        range(min = 1, max = 1000000, message = "The quantity field must be between 1 and 1000000.")
    )]
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RemoveFromCartRequest {
    #[validate(required(message = "The product id field is required."))]
    pub product_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct AddedToCart {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Serialize, ToSchema)]
pub struct CartItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = String)]
    pub effective_price: Decimal,
    pub quantity: i32,
}

impl From<CartItem> for CartItemResponse {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.line_id,
            product_id: item.product_id,
            product_name: item.product_name,
            price: item.current_price,
            effective_price: item.effective_price,
            quantity: item.quantity,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CartTotal {
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

//=========================================================================================
// Owner Resolution
//=========================================================================================

/// The cart owner plus the `Set-Cookie` value to attach when a guest token was minted.
fn cart_owner(state: &AppState, principal: Option<&Principal>, headers: &HeaderMap) -> (OwnerIdentity, Option<String>) {
    let resolution = resolve_owner(principal, guest_cookie(headers));
    let cookie = resolution.issued_guest_token.map(|token| {
        debug!(guest = %token, "Issued a new guest token");
        set_guest_cookie(token, state.config.guest_cookie_minutes)
    });
    (resolution.owner, cookie)
}

fn listing_url(state: &AppState, owner: &OwnerIdentity) -> String {
    match owner {
        OwnerIdentity::User(_) => state.url("/auth-cart/view-items"),
        OwnerIdentity::Guest(_) => state.url("/guest-cart/view-items"),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /{guest,auth}-cart/view-items
#[utoipa::path(
    get,
    path = "/guest-cart/view-items",
    tag = "cart",
    params(PageQuery),
    responses(
        (status = 200, description = "Cart items, or a null payload when the cart is empty", body = [CartItemResponse])
    )
)]
pub async fn view_items(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Response, ApiError> {
    let (owner, cookie) = cart_owner(&state, principal.as_ref(), &headers);
    let page = PageRequest::new(query.page(), state.config.page_size);

    let response = match state.carts.view(&owner, page).await? {
        CartView::Empty => send_empty(StatusCode::OK, "No items to view."),
        CartView::Items(items) => {
            let body = listing(items.map(CartItemResponse::from), &listing_url(&state, &owner));
            send(StatusCode::OK, "Cart items retrieved successfully", Some(body))
        }
    };
    Ok(with_cookie(response, cookie))
}

/// POST /{guest,auth}-cart/add
#[utoipa::path(
    post,
    path = "/guest-cart/add",
    tag = "cart",
    request_body = AddToCartRequest,
    responses(
        (status = 201, description = "Quantity added to the cart", body = AddedToCart),
        (status = 404, description = "Unknown product"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn add(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<AddToCartRequest>,
) -> Result<Response, ApiError> {
    let (Some(product_id), Some(quantity)) = (req.product_id, req.quantity) else {
        return Err(ApiError::field("product_id", "The product id field is required."));
    };
    let (owner, cookie) = cart_owner(&state, principal.as_ref(), &headers);

    state.carts.add(&owner, product_id, quantity).await?;
    debug!(owner = %owner, product_id, quantity, "Added to cart");

    let response = send(
        StatusCode::CREATED,
        "Item added to cart successfully.",
        Some(AddedToCart { product_id, quantity }),
    );
    Ok(with_cookie(response, cookie))
}

/// POST /{guest,auth}-cart/remove
#[utoipa::path(
    post,
    path = "/guest-cart/remove",
    tag = "cart",
    request_body = RemoveFromCartRequest,
    responses(
        (status = 200, description = "Line removed"),
        (status = 404, description = "Unknown product, or not in the cart"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<RemoveFromCartRequest>,
) -> Result<Response, ApiError> {
    let Some(product_id) = req.product_id else {
        return Err(ApiError::field("product_id", "The product id field is required."));
    };
    let (owner, cookie) = cart_owner(&state, principal.as_ref(), &headers);

    let response = if state.carts.remove(&owner, product_id).await? {
        send_empty(StatusCode::OK, "Product removed from cart successfully.")
    } else {
        send_empty(StatusCode::NOT_FOUND, "Item not found in cart.")
    };
    Ok(with_cookie(response, cookie))
}

/// GET /{guest,auth}-cart/total-price
#[utoipa::path(
    get,
    path = "/guest-cart/total-price",
    tag = "cart",
    responses(
        (status = 200, description = "Sum of effective price times quantity", body = CartTotal)
    )
)]
pub async fn total_price(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (owner, cookie) = cart_owner(&state, principal.as_ref(), &headers);
    let total_price = state.carts.total(&owner).await?;
    let response = send(
        StatusCode::OK,
        "Total price calculated successfully.",
        Some(CartTotal { total_price }),
    );
    Ok(with_cookie(response, cookie))
}

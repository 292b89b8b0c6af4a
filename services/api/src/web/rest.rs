//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification. `/auth-cart/*`
//! shares its handlers and shapes with the documented `/guest-cart/*` routes.

use crate::web::{auth, cart, catalog, response, wishlist};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_user,
        auth::login_user,
        auth::logout_user,
        auth::register_admin,
        auth::login_admin,
        auth::logout_admin,
        cart::view_items,
        cart::add,
        cart::remove,
        cart::total_price,
        wishlist::toggle,
        wishlist::view,
        wishlist::remove,
        catalog::list_categories,
        catalog::show_category,
        catalog::store_category,
        catalog::update_category,
        catalog::destroy_category,
        catalog::list_products,
        catalog::show_product,
        catalog::store_product,
        catalog::update_product,
        catalog::destroy_product,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthPayload,
            cart::AddToCartRequest,
            cart::RemoveFromCartRequest,
            cart::AddedToCart,
            cart::CartItemResponse,
            cart::CartTotal,
            wishlist::WishlistRequest,
            wishlist::WishlistItem,
            catalog::CategoryRequest,
            catalog::CategorySummary,
            catalog::CategoryResponse,
            catalog::ProductUpload,
            catalog::ProductSummary,
            catalog::ProductResponse,
            response::Pagination,
            response::PageLinks,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "User and admin accounts."),
        (name = "cart", description = "Guest and authenticated carts."),
        (name = "wishlist", description = "User wishlists."),
        (name = "categories", description = "Admin category management."),
        (name = "products", description = "Admin product management.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

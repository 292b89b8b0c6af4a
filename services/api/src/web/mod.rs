pub mod auth;
pub mod cart;
pub mod catalog;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod rest;
pub mod state;
pub mod wishlist;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use middleware::{authenticate, require_admin, require_user};
pub use rest::ApiDoc;
pub use state::AppState;

/// Multipart product uploads carry an image of up to 2 MB plus text fields.
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/view-items", get(cart::view_items))
        .route("/add", post(cart::add))
        .route("/remove", post(cart::remove))
        .route("/total-price", get(cart::total_price))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(origin, "Ignoring unparsable CORS origin");
            layer
        }
    }
}

/// Builds the complete application router.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/register", post(auth::register_user))
        .route("/login", post(auth::login_user))
        .route("/logout", post(auth::logout_user))
        .route("/admin/register", post(auth::register_admin))
        .route("/admin/login", post(auth::login_admin))
        .route("/admin/logout", post(auth::logout_admin))
        .nest("/guest-cart", cart_routes());

    // User routes
    let user_routes = Router::new()
        .nest("/auth-cart", cart_routes())
        .route("/wishlist/toggle-wishlist", post(wishlist::toggle))
        .route("/wishlist/view-wishlist", get(wishlist::view))
        .route("/wishlist/remove-from-wishlist", post(wishlist::remove))
        .route_layer(axum_middleware::from_fn(require_user));

    // Admin routes
    let admin_routes = Router::new()
        .route("/admin/categories", get(catalog::list_categories))
        .route("/admin/category", get(catalog::show_category))
        .route("/admin/categories/store", post(catalog::store_category))
        .route("/admin/category/edit/{id}", post(catalog::update_category))
        .route("/admin/category/destroy/{id}", post(catalog::destroy_category))
        .route("/admin/products", get(catalog::list_products))
        .route("/admin/product/show/{id}", get(catalog::show_product))
        .route("/admin/product/store", post(catalog::store_product))
        .route("/admin/product/edit/{id}", post(catalog::update_product))
        .route("/admin/product/destroy/{id}", post(catalog::destroy_product))
        .route_layer(axum_middleware::from_fn(require_admin));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state.clone());

    Router::new()
        .merge(api_router)
        .nest_service("/storage", ServeDir::new(&state.config.storage_path))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(&state.config.cors_origin))
        .layer(TraceLayer::new_for_http())
}

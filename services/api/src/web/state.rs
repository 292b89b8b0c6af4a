//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use shop_core::ports::{
    CartStore, CatalogService, ImageStorage, PrincipalStore, TokenService, WishlistStore,
};
use shop_core::{CartService, Reconciler};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub carts: CartService,
    pub reconciler: Reconciler,
    pub catalog: Arc<dyn CatalogService>,
    pub principals: Arc<dyn PrincipalStore>,
    pub tokens: Arc<dyn TokenService>,
    pub wishlist: Arc<dyn WishlistStore>,
    pub images: Arc<dyn ImageStorage>,
}

impl AppState {
    /// Wires the cart services on top of the given adapters.
    pub fn new(
        config: Arc<Config>,
        cart_store: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogService>,
        principals: Arc<dyn PrincipalStore>,
        tokens: Arc<dyn TokenService>,
        wishlist: Arc<dyn WishlistStore>,
        images: Arc<dyn ImageStorage>,
    ) -> Self {
        Self {
            carts: CartService::new(cart_store.clone(), catalog.clone()),
            reconciler: Reconciler::new(cart_store),
            config,
            catalog,
            principals,
            tokens,
            wishlist,
            images,
        }
    }

    /// Absolute URL of a route, for pagination links.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.public_base_url, path)
    }

    /// Absolute URL of a stored image.
    pub fn image_url(&self, stored_path: &str) -> String {
        format!("{}/storage/{}", self.config.public_base_url, stored_path)
    }
}

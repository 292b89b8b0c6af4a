//! crates/shop_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the storefront's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or file stores.

use async_trait::async_trait;
use crate::domain::{
    CartLine, Category, CategoryId, NewProduct, OwnerIdentity, Principal, PrincipalCredentials,
    PrincipalId, PrincipalKind, Product, ProductChanges, ProductId, Quantity, WishlistEntry,
    WishlistToggle,
};
use crate::pagination::PageRequest;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Line-level access to carts. Every operation is scoped to one owner and is
/// atomic on its own; no operation spans more than one guest line.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<Option<CartLine>>;

    /// Increments the owner's line for `product_id` by `quantity`, creating it if absent.
    /// Must be a single atomic increment-or-insert so concurrent adds are never lost.
    /// Returns `Conflict` and leaves the line unchanged when the sum would exceed [`Quantity::MAX`].
    async fn add_quantity(
        &self,
        owner: &OwnerIdentity,
        product_id: ProductId,
        quantity: Quantity,
    ) -> PortResult<CartLine>;

    /// Returns whether a line was deleted.
    async fn remove_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<bool>;

    /// A page of the owner's lines in creation order, plus the total line count.
    async fn list_lines(&self, owner: &OwnerIdentity, page: PageRequest) -> PortResult<(Vec<CartLine>, u64)>;

    async fn all_lines(&self, owner: &OwnerIdentity) -> PortResult<Vec<CartLine>>;

    /// Deletes `guest_line` and adds its quantity to `user_line` as one unit.
    /// Returns `NotFound` without touching `user_line` when the guest line is already gone.
    /// The merged quantity is capped at [`Quantity::MAX`].
    async fn merge_line(&self, guest_line: &CartLine, user_line: &CartLine) -> PortResult<CartLine>;

    /// Hands `guest_line` over to `user_id` without creating or deleting rows.
    /// Returns `Conflict` when the user already owns a line for the same product.
    async fn reassign_line(&self, guest_line: &CartLine, user_id: PrincipalId) -> PortResult<CartLine>;
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    // --- Categories ---
    async fn list_categories(&self, page: PageRequest) -> PortResult<(Vec<Category>, u64)>;

    async fn get_category(&self, category_id: CategoryId) -> PortResult<Category>;

    async fn create_category(&self, name: &str) -> PortResult<Category>;

    async fn update_category(&self, category_id: CategoryId, name: &str) -> PortResult<Category>;

    /// Deletes the category together with its products.
    async fn delete_category(&self, category_id: CategoryId) -> PortResult<()>;

    // --- Products ---
    async fn product_exists(&self, product_id: ProductId) -> PortResult<bool>;

    async fn get_product(&self, product_id: ProductId) -> PortResult<Product>;

    /// Products matching `product_ids`; unknown ids are skipped.
    async fn products_by_ids(&self, product_ids: &[ProductId]) -> PortResult<Vec<Product>>;

    async fn list_products(&self, page: PageRequest) -> PortResult<(Vec<Product>, u64)>;

    async fn create_product(&self, product: NewProduct) -> PortResult<Product>;

    async fn update_product(&self, product_id: ProductId, changes: ProductChanges) -> PortResult<Product>;

    /// Deletes the product and returns it, so callers can clean up its image.
    async fn delete_product(&self, product_id: ProductId) -> PortResult<Product>;
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Returns `Conflict` when the email is already registered for this kind.
    async fn create_principal(
        &self,
        kind: PrincipalKind,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<Principal>;

    async fn get_credentials_by_email(&self, kind: PrincipalKind, email: &str) -> PortResult<PrincipalCredentials>;
}

/// Issues, verifies and revokes opaque bearer tokens.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn issue_token(&self, principal: &Principal) -> PortResult<String>;

    /// Returns `Unauthorized` for unknown, revoked or expired tokens.
    async fn verify_token(&self, token: &str) -> PortResult<Principal>;

    async fn revoke_token(&self, token: &str) -> PortResult<()>;
}

#[async_trait]
pub trait WishlistStore: Send + Sync {
    async fn toggle(&self, user_id: PrincipalId, product_id: ProductId) -> PortResult<WishlistToggle>;

    async fn list(&self, user_id: PrincipalId, page: PageRequest) -> PortResult<(Vec<WishlistEntry>, u64)>;

    /// Returns whether an entry was deleted.
    async fn remove(&self, user_id: PrincipalId, product_id: ProductId) -> PortResult<bool>;
}

#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Stores the bytes under `directory` and returns the storage-relative path.
    async fn store_image(&self, directory: &str, extension: &str, bytes: &[u8]) -> PortResult<String>;

    /// Deleting a missing file is not an error.
    async fn delete_image(&self, path: &str) -> PortResult<()>;
}

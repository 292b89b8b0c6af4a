pub mod cart;
pub mod domain;
pub mod identity;
pub mod pagination;
pub mod ports;
pub mod pricing;
pub mod reconcile;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub use cart::{CartError, CartItem, CartResult, CartService, CartView};
pub use domain::{
    CartLine, Category, GuestToken, Money, NewProduct, Offer, OwnerIdentity, Principal,
    PrincipalCredentials, PrincipalKind, Product, ProductChanges, Quantity, WishlistEntry,
    WishlistToggle,
};
pub use identity::{resolve_owner, Resolution};
pub use pagination::{Page, PageMeta, PageRequest};
pub use ports::{
    CartStore, CatalogService, ImageStorage, PortError, PortResult, PrincipalStore, TokenService,
    WishlistStore,
};
pub use reconcile::{ReconcileReport, Reconciler};

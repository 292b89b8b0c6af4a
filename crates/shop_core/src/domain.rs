//! crates/shop_core/src/domain.rs
//!
//! Defines the pure, core data structures for the storefront.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type PrincipalId = i64;
pub type ProductId = i64;
pub type CategoryId = i64;
pub type LineId = i64;

/// Monetary amounts are plain decimals in the shop's single currency.
pub type Money = Decimal;

//=========================================================================================
// Cart Ownership
//=========================================================================================

/// Opaque identifier of an unauthenticated cart, carried in the `guest_token` cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuestToken(Uuid);

impl GuestToken {
    /// Generates a new, globally unique token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for GuestToken {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for GuestToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for GuestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whose cart a line belongs to. Exactly one of the two forms, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerIdentity {
    User(PrincipalId),
    Guest(GuestToken),
}

impl OwnerIdentity {
    pub fn user_id(&self) -> Option<PrincipalId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }

    pub fn guest_token(&self) -> Option<GuestToken> {
        match self {
            Self::User(_) => None,
            Self::Guest(token) => Some(*token),
        }
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(token) => write!(f, "guest:{token}"),
        }
    }
}

/// A strictly positive item count, never above [`Quantity::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(i32);

impl Quantity {
    /// The most a single cart line may hold.
    pub const MAX: i32 = 1_000_000;

    /// Returns `None` for zero, negative or over-limit values.
    pub fn new(value: i64) -> Option<Self> {
        i32::try_from(value)
            .ok()
            .filter(|v| (1..=Self::MAX).contains(v))
            .map(Self)
    }

    pub fn get(&self) -> i32 {
        self.0
    }

    /// `None` when the sum would exceed [`Quantity::MAX`].
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        Self::new(i64::from(self.0) + i64::from(other.0))
    }

    /// The sum, capped at [`Quantity::MAX`].
    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Self(self.0.saturating_add(other.0).min(Self::MAX))
    }
}

/// A single product entry in somebody's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub id: LineId,
    pub owner: OwnerIdentity,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Principals
//=========================================================================================

/// The two disjoint kinds of account. Only users own carts and wishlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    User,
    Admin,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

// Represents an authenticated account - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub kind: PrincipalKind,
    pub name: String,
    pub email: String,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct PrincipalCredentials {
    pub principal: Principal,
    pub hashed_password: String,
}

//=========================================================================================
// Catalog
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A time-bounded discount. Dates are calendar days, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offer {
    pub price: Option<Money>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    /// Storage-relative path of the product image, if any.
    pub image: Option<String>,
    pub quantity: i32,
    pub sku: String,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub description: String,
    pub current_price: Money,
    pub offer: Offer,
    pub created_at: DateTime<Utc>,
}

/// Validated input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category_id: CategoryId,
    pub name: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub sku: String,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub description: String,
    pub current_price: Money,
    pub offer: Offer,
}

/// Partial update of a product; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub quantity: Option<i32>,
    pub sku: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub description: Option<String>,
    pub current_price: Option<Money>,
    pub offer_price: Option<Money>,
    pub offer_starts_on: Option<NaiveDate>,
    pub offer_ends_on: Option<NaiveDate>,
}

//=========================================================================================
// Wishlist
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistEntry {
    pub id: i64,
    pub user_id: PrincipalId,
    pub product_id: ProductId,
    pub product_name: String,
}

/// Outcome of toggling a product on a wishlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WishlistToggle {
    Added,
    Removed,
}

//! crates/shop_core/src/cart.rs
//!
//! Cart operations over a resolved owner: adding, removing, listing and pricing.
//! Validation and existence checks always run before any mutation.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{CartLine, Money, OwnerIdentity, ProductId, Quantity};
use crate::pagination::{Page, PageRequest};
use crate::ports::{CartStore, CatalogService, PortError};

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Quantity must be a positive integer")]
    InvalidQuantity,
    #[error("A cart line may not hold more than {} items", Quantity::MAX)]
    QuantityLimit,
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type CartResult<T> = Result<T, CartError>;

/// A cart line joined with the product's current display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub line_id: i64,
    pub product_id: ProductId,
    pub product_name: String,
    pub current_price: Money,
    pub effective_price: Money,
    pub quantity: i32,
}

/// An owner's cart as shown to a client. An empty cart is its own outcome,
/// never an empty page with misleading metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartView {
    Empty,
    Items(Page<CartItem>),
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogService>,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>, catalog: Arc<dyn CatalogService>) -> Self {
        Self { store, catalog }
    }

    async fn ensure_product(&self, product_id: ProductId) -> CartResult<()> {
        if self.catalog.product_exists(product_id).await? {
            Ok(())
        } else {
            Err(CartError::ProductNotFound(product_id))
        }
    }

    /// Adds `quantity` of a product, merging into an existing line for the same product.
    pub async fn add(&self, owner: &OwnerIdentity, product_id: ProductId, quantity: i64) -> CartResult<CartLine> {
        let quantity = match Quantity::new(quantity) {
            Some(quantity) => quantity,
            None if quantity > i64::from(Quantity::MAX) => return Err(CartError::QuantityLimit),
            None => return Err(CartError::InvalidQuantity),
        };
        self.ensure_product(product_id).await?;
        let line = match self.store.add_quantity(owner, product_id, quantity).await {
            Ok(line) => line,
            Err(PortError::Conflict(_)) => return Err(CartError::QuantityLimit),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(%owner, product_id, quantity = line.quantity.get(), "Cart line updated");
        Ok(line)
    }

    /// Returns whether a line was removed. A missing line is not an error.
    pub async fn remove(&self, owner: &OwnerIdentity, product_id: ProductId) -> CartResult<bool> {
        self.ensure_product(product_id).await?;
        Ok(self.store.remove_line(owner, product_id).await?)
    }

    pub async fn view(&self, owner: &OwnerIdentity, page: PageRequest) -> CartResult<CartView> {
        self.view_on(owner, page, Utc::now().date_naive()).await
    }

    pub async fn view_on(&self, owner: &OwnerIdentity, page: PageRequest, today: NaiveDate) -> CartResult<CartView> {
        let (lines, total) = self.store.list_lines(owner, page).await?;
        if lines.is_empty() {
            return Ok(CartView::Empty);
        }

        let products = self.products_for(&lines).await?;
        let items = lines
            .into_iter()
            .filter_map(|line| {
                let product = products.get(&line.product_id)?;
                Some(CartItem {
                    line_id: line.id,
                    product_id: line.product_id,
                    product_name: product.name.clone(),
                    current_price: product.current_price,
                    effective_price: product.effective_price(today),
                    quantity: line.quantity.get(),
                })
            })
            .collect();

        Ok(CartView::Items(Page::new(items, page, total)))
    }

    /// The amount due now for everything in the owner's cart.
    pub async fn total(&self, owner: &OwnerIdentity) -> CartResult<Money> {
        self.total_on(owner, Utc::now().date_naive()).await
    }

    pub async fn total_on(&self, owner: &OwnerIdentity, today: NaiveDate) -> CartResult<Money> {
        let lines = self.store.all_lines(owner).await?;
        let products = self.products_for(&lines).await?;
        let total: Money = lines
            .iter()
            .filter_map(|line| {
                let product = products.get(&line.product_id)?;
                Some(product.effective_price(today) * Decimal::from(line.quantity.get()))
            })
            .sum();
        Ok(total)
    }

    async fn products_for(&self, lines: &[CartLine]) -> CartResult<HashMap<ProductId, crate::domain::Product>> {
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let products = self.catalog.products_by_ids(&ids).await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }
}

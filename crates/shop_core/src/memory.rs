//! crates/shop_core/src/memory.rs
//!
//! In-memory implementations of the storage ports. Every operation holds a
//! single lock for its whole duration, which gives the same per-line atomicity
//! the SQL adapter gets from conditional upserts and short transactions.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    CartLine, Category, CategoryId, LineId, NewProduct, OwnerIdentity, Principal,
    PrincipalCredentials, PrincipalId, PrincipalKind, Product, ProductChanges, ProductId,
    Quantity, WishlistEntry, WishlistToggle,
};
use crate::pagination::PageRequest;
use crate::ports::{
    CartStore, CatalogService, ImageStorage, PortError, PortResult, PrincipalStore, TokenService,
    WishlistStore,
};

#[derive(Default)]
struct State {
    next_id: i64,
    lines: BTreeMap<LineId, CartLine>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    principals: Vec<PrincipalCredentials>,
    tokens: HashMap<String, Principal>,
    wishlist: BTreeMap<i64, (PrincipalId, ProductId)>,
    images: HashMap<String, Vec<u8>>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A process-local store implementing every storage port.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> PortResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }

    /// Number of cart lines across all owners.
    pub fn line_count(&self) -> usize {
        self.state().map(|s| s.lines.len()).unwrap_or_default()
    }

    /// Whether an image with this path is currently stored.
    pub fn has_image(&self, path: &str) -> bool {
        self.state().map(|s| s.images.contains_key(path)).unwrap_or_default()
    }
}

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
    let slice = items.iter().skip(offset).take(limit).cloned().collect();
    (slice, total)
}

/// Overwrites only the fields present in `changes`, like the SQL `COALESCE` update.
fn apply_changes(product: &mut Product, changes: ProductChanges) {
    let ProductChanges {
        category_id,
        name,
        image,
        quantity,
        sku,
        seo_title,
        seo_description,
        description,
        current_price,
        offer_price,
        offer_starts_on,
        offer_ends_on,
    } = changes;

    if let Some(v) = category_id {
        product.category_id = v;
    }
    if let Some(v) = name {
        product.name = v;
    }
    if let Some(v) = quantity {
        product.quantity = v;
    }
    if let Some(v) = sku {
        product.sku = v;
    }
    if let Some(v) = description {
        product.description = v;
    }
    if let Some(v) = current_price {
        product.current_price = v;
    }
    product.image = image.or(product.image.take());
    product.seo_title = seo_title.or(product.seo_title.take());
    product.seo_description = seo_description.or(product.seo_description.take());
    product.offer.price = offer_price.or(product.offer.price);
    product.offer.starts_on = offer_starts_on.or(product.offer.starts_on);
    product.offer.ends_on = offer_ends_on.or(product.offer.ends_on);
}

//=========================================================================================
// `CartStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CartStore for InMemoryStore {
    async fn find_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<Option<CartLine>> {
        let state = self.state()?;
        Ok(state
            .lines
            .values()
            .find(|l| l.owner == *owner && l.product_id == product_id)
            .cloned())
    }

    async fn add_quantity(
        &self,
        owner: &OwnerIdentity,
        product_id: ProductId,
        quantity: Quantity,
    ) -> PortResult<CartLine> {
        let mut state = self.state()?;
        if let Some(line) = state
            .lines
            .values_mut()
            .find(|l| l.owner == *owner && l.product_id == product_id)
        {
            line.quantity = line.quantity.checked_add(quantity).ok_or_else(|| {
                PortError::Conflict(format!("Cart line {} would exceed the quantity limit", line.id))
            })?;
            return Ok(line.clone());
        }

        let id = state.next_id();
        let line = CartLine {
            id,
            owner: *owner,
            product_id,
            quantity,
            created_at: Utc::now(),
        };
        state.lines.insert(id, line.clone());
        Ok(line)
    }

    async fn remove_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<bool> {
        let mut state = self.state()?;
        let id = state
            .lines
            .values()
            .find(|l| l.owner == *owner && l.product_id == product_id)
            .map(|l| l.id);
        Ok(id.and_then(|id| state.lines.remove(&id)).is_some())
    }

    async fn list_lines(&self, owner: &OwnerIdentity, page: PageRequest) -> PortResult<(Vec<CartLine>, u64)> {
        let lines = self.all_lines(owner).await?;
        Ok(paginate(&lines, page))
    }

    async fn all_lines(&self, owner: &OwnerIdentity) -> PortResult<Vec<CartLine>> {
        let state = self.state()?;
        // BTreeMap keys are allocated in insertion order, so this is creation order.
        Ok(state.lines.values().filter(|l| l.owner == *owner).cloned().collect())
    }

    async fn merge_line(&self, guest_line: &CartLine, user_line: &CartLine) -> PortResult<CartLine> {
        let mut state = self.state()?;
        let source = match state.lines.get(&guest_line.id) {
            Some(line) if line.owner == guest_line.owner => line.clone(),
            _ => return Err(PortError::NotFound(format!("Cart line {} not found", guest_line.id))),
        };
        let target = state
            .lines
            .get(&user_line.id)
            .filter(|l| l.owner == user_line.owner)
            .cloned()
            .ok_or_else(|| PortError::Conflict(format!("Cart line {} disappeared during merge", user_line.id)))?;

        let merged_quantity = target.quantity.saturating_add(source.quantity);

        state.lines.remove(&source.id);
        let merged = CartLine {
            quantity: merged_quantity,
            ..target
        };
        state.lines.insert(merged.id, merged.clone());
        Ok(merged)
    }

    async fn reassign_line(&self, guest_line: &CartLine, user_id: PrincipalId) -> PortResult<CartLine> {
        let mut state = self.state()?;
        let new_owner = OwnerIdentity::User(user_id);
        if state
            .lines
            .values()
            .any(|l| l.owner == new_owner && l.product_id == guest_line.product_id)
        {
            return Err(PortError::Conflict(format!(
                "{} already has product {} in the cart",
                new_owner, guest_line.product_id
            )));
        }

        let line = state
            .lines
            .get_mut(&guest_line.id)
            .filter(|l| l.owner == guest_line.owner)
            .ok_or_else(|| PortError::NotFound(format!("Cart line {} not found", guest_line.id)))?;
        line.owner = new_owner;
        Ok(line.clone())
    }
}

//=========================================================================================
// `CatalogService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CatalogService for InMemoryStore {
    async fn list_categories(&self, page: PageRequest) -> PortResult<(Vec<Category>, u64)> {
        let state = self.state()?;
        let all: Vec<Category> = state.categories.values().cloned().collect();
        Ok(paginate(&all, page))
    }

    async fn get_category(&self, category_id: CategoryId) -> PortResult<Category> {
        let state = self.state()?;
        state
            .categories
            .get(&category_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Category {} not found", category_id)))
    }

    async fn create_category(&self, name: &str) -> PortResult<Category> {
        let mut state = self.state()?;
        let id = state.next_id();
        let category = Category {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, category_id: CategoryId, name: &str) -> PortResult<Category> {
        let mut state = self.state()?;
        let category = state
            .categories
            .get_mut(&category_id)
            .ok_or_else(|| PortError::NotFound(format!("Category {} not found", category_id)))?;
        category.name = name.to_string();
        Ok(category.clone())
    }

    async fn delete_category(&self, category_id: CategoryId) -> PortResult<()> {
        let mut state = self.state()?;
        state
            .categories
            .remove(&category_id)
            .ok_or_else(|| PortError::NotFound(format!("Category {} not found", category_id)))?;
        let doomed: Vec<ProductId> = state
            .products
            .values()
            .filter(|p| p.category_id == category_id)
            .map(|p| p.id)
            .collect();
        for product_id in doomed {
            state.products.remove(&product_id);
            state.lines.retain(|_, l| l.product_id != product_id);
            state.wishlist.retain(|_, (_, p)| *p != product_id);
        }
        Ok(())
    }

    async fn product_exists(&self, product_id: ProductId) -> PortResult<bool> {
        Ok(self.state()?.products.contains_key(&product_id))
    }

    async fn get_product(&self, product_id: ProductId) -> PortResult<Product> {
        let state = self.state()?;
        state
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn products_by_ids(&self, product_ids: &[ProductId]) -> PortResult<Vec<Product>> {
        let state = self.state()?;
        Ok(product_ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn list_products(&self, page: PageRequest) -> PortResult<(Vec<Product>, u64)> {
        let state = self.state()?;
        let all: Vec<Product> = state.products.values().cloned().collect();
        Ok(paginate(&all, page))
    }

    async fn create_product(&self, product: NewProduct) -> PortResult<Product> {
        let mut state = self.state()?;
        if !state.categories.contains_key(&product.category_id) {
            return Err(PortError::NotFound(format!("Category {} not found", product.category_id)));
        }
        let id = state.next_id();
        let created = Product {
            id,
            category_id: product.category_id,
            name: product.name,
            image: product.image,
            quantity: product.quantity,
            sku: product.sku,
            seo_title: product.seo_title,
            seo_description: product.seo_description,
            description: product.description,
            current_price: product.current_price,
            offer: product.offer,
            created_at: Utc::now(),
        };
        state.products.insert(id, created.clone());
        Ok(created)
    }

    async fn update_product(&self, product_id: ProductId, changes: ProductChanges) -> PortResult<Product> {
        let mut state = self.state()?;
        if let Some(category_id) = changes.category_id {
            if !state.categories.contains_key(&category_id) {
                return Err(PortError::NotFound(format!("Category {} not found", category_id)));
            }
        }
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))?;
        apply_changes(product, changes);
        Ok(product.clone())
    }

    async fn delete_product(&self, product_id: ProductId) -> PortResult<Product> {
        let mut state = self.state()?;
        let product = state
            .products
            .remove(&product_id)
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))?;
        state.lines.retain(|_, l| l.product_id != product_id);
        state.wishlist.retain(|_, (_, p)| *p != product_id);
        Ok(product)
    }
}

//=========================================================================================
// `PrincipalStore` and `TokenService` Trait Implementations
//=========================================================================================

#[async_trait]
impl PrincipalStore for InMemoryStore {
    async fn create_principal(
        &self,
        kind: PrincipalKind,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<Principal> {
        let mut state = self.state()?;
        if state
            .principals
            .iter()
            .any(|c| c.principal.kind == kind && c.principal.email.eq_ignore_ascii_case(email))
        {
            return Err(PortError::Conflict(format!("Email {} is already registered", email)));
        }
        let principal = Principal {
            id: state.next_id(),
            kind,
            name: name.to_string(),
            email: email.to_string(),
        };
        state.principals.push(PrincipalCredentials {
            principal: principal.clone(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(principal)
    }

    async fn get_credentials_by_email(&self, kind: PrincipalKind, email: &str) -> PortResult<PrincipalCredentials> {
        let state = self.state()?;
        state
            .principals
            .iter()
            .find(|c| c.principal.kind == kind && c.principal.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No {} with email {}", kind.as_str(), email)))
    }
}

#[async_trait]
impl TokenService for InMemoryStore {
    async fn issue_token(&self, principal: &Principal) -> PortResult<String> {
        let token = Uuid::new_v4().to_string();
        self.state()?.tokens.insert(token.clone(), principal.clone());
        Ok(token)
    }

    async fn verify_token(&self, token: &str) -> PortResult<Principal> {
        self.state()?
            .tokens
            .get(token)
            .cloned()
            .ok_or(PortError::Unauthorized)
    }

    async fn revoke_token(&self, token: &str) -> PortResult<()> {
        self.state()?.tokens.remove(token);
        Ok(())
    }
}

//=========================================================================================
// `WishlistStore` and `ImageStorage` Trait Implementations
//=========================================================================================

#[async_trait]
impl WishlistStore for InMemoryStore {
    async fn toggle(&self, user_id: PrincipalId, product_id: ProductId) -> PortResult<WishlistToggle> {
        let mut state = self.state()?;
        let existing = state
            .wishlist
            .iter()
            .find(|(_, entry)| **entry == (user_id, product_id))
            .map(|(id, _)| *id);
        match existing {
            Some(id) => {
                state.wishlist.remove(&id);
                Ok(WishlistToggle::Removed)
            }
            None => {
                let id = state.next_id();
                state.wishlist.insert(id, (user_id, product_id));
                Ok(WishlistToggle::Added)
            }
        }
    }

    async fn list(&self, user_id: PrincipalId, page: PageRequest) -> PortResult<(Vec<WishlistEntry>, u64)> {
        let state = self.state()?;
        let entries: Vec<WishlistEntry> = state
            .wishlist
            .iter()
            .filter(|(_, (u, _))| *u == user_id)
            .map(|(id, (u, p))| WishlistEntry {
                id: *id,
                user_id: *u,
                product_id: *p,
                product_name: state
                    .products
                    .get(p)
                    .map(|product| product.name.clone())
                    .unwrap_or_default(),
            })
            .collect();
        Ok(paginate(&entries, page))
    }

    async fn remove(&self, user_id: PrincipalId, product_id: ProductId) -> PortResult<bool> {
        let mut state = self.state()?;
        let before = state.wishlist.len();
        state.wishlist.retain(|_, entry| *entry != (user_id, product_id));
        Ok(state.wishlist.len() != before)
    }
}

#[async_trait]
impl ImageStorage for InMemoryStore {
    async fn store_image(&self, directory: &str, extension: &str, bytes: &[u8]) -> PortResult<String> {
        let path = format!("{}/{}.{}", directory, Uuid::new_v4().simple(), extension);
        self.state()?.images.insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    async fn delete_image(&self, path: &str) -> PortResult<()> {
        self.state()?.images.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Offer;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn product_update_keeps_fields_it_was_not_given() {
        let store = InMemoryStore::new();
        let category = store.create_category("Tea").await.unwrap();
        let product = store
            .create_product(NewProduct {
                category_id: category.id,
                name: "Sencha".to_string(),
                image: Some("products/sencha.png".to_string()),
                quantity: 5,
                sku: "SKU-1".to_string(),
                seo_title: Some("Green tea".to_string()),
                seo_description: None,
                description: "Steamed".to_string(),
                current_price: Decimal::from(12),
                offer: Offer {
                    price: Some(Decimal::from(9)),
                    ..Offer::default()
                },
            })
            .await
            .unwrap();

        let updated = store
            .update_product(
                product.id,
                ProductChanges {
                    name: Some("Gyokuro".to_string()),
                    quantity: Some(8),
                    ..ProductChanges::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Gyokuro");
        assert_eq!(updated.quantity, 8);
        assert_eq!(updated.image.as_deref(), Some("products/sencha.png"));
        assert_eq!(updated.seo_title.as_deref(), Some("Green tea"));
        assert_eq!(updated.current_price, Decimal::from(12));
        assert_eq!(updated.offer.price, Some(Decimal::from(9)));
    }

    #[tokio::test]
    async fn merge_caps_at_the_line_limit() {
        let store = InMemoryStore::new();
        let guest = OwnerIdentity::Guest(crate::domain::GuestToken::generate());
        let user = OwnerIdentity::User(3);
        let guest_line = store
            .add_quantity(&guest, 1, Quantity::new(i64::from(Quantity::MAX)).unwrap())
            .await
            .unwrap();
        let user_line = store.add_quantity(&user, 1, Quantity::new(7).unwrap()).await.unwrap();

        let merged = store.merge_line(&guest_line, &user_line).await.unwrap();

        assert_eq!(merged.quantity.get(), Quantity::MAX);
        assert_eq!(store.line_count(), 1);
    }
}

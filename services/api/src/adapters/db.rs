//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the storage ports from the `shop_core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use shop_core::domain::{
    CartLine, Category, CategoryId, NewProduct, Offer, OwnerIdentity, Principal,
    PrincipalCredentials, PrincipalId, PrincipalKind, Product, ProductChanges, ProductId,
    Quantity, WishlistEntry, WishlistToggle,
};
use shop_core::pagination::PageRequest;
use shop_core::ports::{
    CartStore, CatalogService, PortError, PortResult, PrincipalStore, TokenService, WishlistStore,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every persistence port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    token_ttl: Duration,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`; issued tokens live for `token_ttl_days`.
    pub fn new(pool: PgPool, token_ttl_days: i64) -> Self {
        Self {
            pool,
            token_ttl: Duration::days(token_ttl_days),
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_foreign_key_violation())
        .unwrap_or(false)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

//=========================================================================================
// Owner Filtering
//=========================================================================================

/// The column a cart owner lives in.
fn owner_column(owner: &OwnerIdentity) -> &'static str {
    match owner {
        OwnerIdentity::User(_) => "user_id",
        OwnerIdentity::Guest(_) => "guest_token",
    }
}

/// Binds the owner's value to the next placeholder of any sqlx query builder.
macro_rules! bind_owner {
    ($query:expr, $owner:expr) => {
        match $owner {
            OwnerIdentity::User(id) => $query.bind(*id),
            OwnerIdentity::Guest(token) => $query.bind(token.as_uuid()),
        }
    };
}

const LINE_COLUMNS: &str = "id, user_id, guest_token, product_id, quantity, created_at";

const PRODUCT_COLUMNS: &str = "id, category_id, name, image, quantity, sku, seo_title, seo_description, \
     description, current_price, offer_price, offer_start_date, offer_end_date, created_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CartLineRecord {
    id: i64,
    user_id: Option<i64>,
    guest_token: Option<Uuid>,
    product_id: i64,
    quantity: i32,
    created_at: DateTime<Utc>,
}
impl CartLineRecord {
    fn to_domain(self) -> PortResult<CartLine> {
        let owner = match (self.user_id, self.guest_token) {
            (Some(user_id), None) => OwnerIdentity::User(user_id),
            (None, Some(token)) => OwnerIdentity::Guest(token.into()),
            _ => {
                return Err(PortError::Unexpected(format!(
                    "cart line {} does not have exactly one owner",
                    self.id
                )))
            }
        };
        let quantity = Quantity::new(i64::from(self.quantity)).ok_or_else(|| {
            PortError::Unexpected(format!("cart line {} has an out-of-range quantity", self.id))
        })?;
        Ok(CartLine {
            id: self.id,
            owner,
            product_id: self.product_id,
            quantity,
            created_at: self.created_at,
        })
    }
}

fn lines_to_domain(records: Vec<CartLineRecord>) -> PortResult<Vec<CartLine>> {
    records.into_iter().map(CartLineRecord::to_domain).collect()
}

#[derive(FromRow)]
struct CategoryRecord {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
}
impl CategoryRecord {
    fn to_domain(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ProductRecord {
    id: i64,
    category_id: i64,
    name: String,
    image: Option<String>,
    quantity: i32,
    sku: String,
    seo_title: Option<String>,
    seo_description: Option<String>,
    description: String,
    current_price: Decimal,
    offer_price: Option<Decimal>,
    offer_start_date: Option<NaiveDate>,
    offer_end_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}
impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            id: self.id,
            category_id: self.category_id,
            name: self.name,
            image: self.image,
            quantity: self.quantity,
            sku: self.sku,
            seo_title: self.seo_title,
            seo_description: self.seo_description,
            description: self.description,
            current_price: self.current_price,
            offer: Offer {
                price: self.offer_price,
                starts_on: self.offer_start_date,
                ends_on: self.offer_end_date,
            },
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PrincipalRecord {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
}
impl PrincipalRecord {
    fn to_domain(self, kind: PrincipalKind) -> PrincipalCredentials {
        PrincipalCredentials {
            principal: Principal {
                id: self.id,
                kind,
                name: self.name,
                email: self.email,
            },
            hashed_password: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct TokenRecord {
    principal_kind: String,
    principal_id: i64,
}

#[derive(FromRow)]
struct WishlistRecord {
    id: i64,
    user_id: i64,
    product_id: i64,
    product_name: String,
}
impl WishlistRecord {
    fn to_domain(self) -> WishlistEntry {
        WishlistEntry {
            id: self.id,
            user_id: self.user_id,
            product_id: self.product_id,
            product_name: self.product_name,
        }
    }
}

fn principal_table(kind: PrincipalKind) -> &'static str {
    match kind {
        PrincipalKind::User => "users",
        PrincipalKind::Admin => "admins",
    }
}

//=========================================================================================
// `CartStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CartStore for DbAdapter {
    async fn find_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<Option<CartLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM cart_lines WHERE {} = $1 AND product_id = $2",
            owner_column(owner)
        );
        let record = bind_owner!(sqlx::query_as::<_, CartLineRecord>(&sql), owner)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(CartLineRecord::to_domain).transpose()
    }

    async fn add_quantity(
        &self,
        owner: &OwnerIdentity,
        product_id: ProductId,
        quantity: Quantity,
    ) -> PortResult<CartLine> {
        // One statement: concurrent adds for the same (owner, product) serialize on the unique index.
        // An increment past the limit matches no row and returns nothing.
        let column = owner_column(owner);
        let sql = format!(
            "INSERT INTO cart_lines ({column}, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT ({column}, product_id) WHERE {column} IS NOT NULL \
             DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity \
             WHERE cart_lines.quantity + EXCLUDED.quantity <= $4 \
             RETURNING {LINE_COLUMNS}"
        );
        let record = bind_owner!(sqlx::query_as::<_, CartLineRecord>(&sql), owner)
            .bind(product_id)
            .bind(quantity.get())
            .bind(Quantity::MAX)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PortError::NotFound(format!("Product {} not found", product_id))
                } else {
                    unexpected(e)
                }
            })?;
        record
            .ok_or_else(|| {
                PortError::Conflict(format!(
                    "{} already holds the most of product {} a cart line allows",
                    owner, product_id
                ))
            })?
            .to_domain()
    }

    async fn remove_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<bool> {
        let sql = format!(
            "DELETE FROM cart_lines WHERE {} = $1 AND product_id = $2",
            owner_column(owner)
        );
        let result = bind_owner!(sqlx::query(&sql), owner)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_lines(&self, owner: &OwnerIdentity, page: PageRequest) -> PortResult<(Vec<CartLine>, u64)> {
        let column = owner_column(owner);
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM cart_lines WHERE {column} = $1 \
             ORDER BY created_at ASC, id ASC LIMIT $2 OFFSET $3"
        );
        let records = bind_owner!(sqlx::query_as::<_, CartLineRecord>(&sql), owner)
            .bind(to_i64(page.limit()))
            .bind(to_i64(page.offset()))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let count_sql = format!("SELECT COUNT(*) FROM cart_lines WHERE {column} = $1");
        let total: i64 = bind_owner!(sqlx::query_scalar::<_, i64>(&count_sql), owner)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok((lines_to_domain(records)?, total.max(0) as u64))
    }

    async fn all_lines(&self, owner: &OwnerIdentity) -> PortResult<Vec<CartLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM cart_lines WHERE {} = $1 ORDER BY created_at ASC, id ASC",
            owner_column(owner)
        );
        let records = bind_owner!(sqlx::query_as::<_, CartLineRecord>(&sql), owner)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        lines_to_domain(records)
    }

    async fn merge_line(&self, guest_line: &CartLine, user_line: &CartLine) -> PortResult<CartLine> {
        let user_id = user_line
            .owner
            .user_id()
            .ok_or_else(|| PortError::Unexpected("merge target must be a user line".to_string()))?;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Delete first: if another request already moved this line, nothing gets added twice.
        let delete_sql = format!(
            "DELETE FROM cart_lines WHERE {} = $1 AND id = $2 RETURNING quantity",
            owner_column(&guest_line.owner)
        );
        let moved: Option<i32> = bind_owner!(sqlx::query_scalar::<_, i32>(&delete_sql), &guest_line.owner)
            .bind(guest_line.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        let Some(moved) = moved else {
            tx.rollback().await.map_err(unexpected)?;
            return Err(PortError::NotFound(format!("Cart line {} not found", guest_line.id)));
        };

        let update_sql = format!(
            "UPDATE cart_lines SET quantity = LEAST(quantity + $1, $4) WHERE id = $2 AND user_id = $3 \
             RETURNING {LINE_COLUMNS}"
        );
        let merged = sqlx::query_as::<_, CartLineRecord>(&update_sql)
            .bind(moved)
            .bind(user_line.id)
            .bind(user_id)
            .bind(Quantity::MAX)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        let Some(merged) = merged else {
            tx.rollback().await.map_err(unexpected)?;
            return Err(PortError::Conflict(format!(
                "Cart line {} disappeared during merge",
                user_line.id
            )));
        };

        tx.commit().await.map_err(unexpected)?;
        merged.to_domain()
    }

    async fn reassign_line(&self, guest_line: &CartLine, user_id: PrincipalId) -> PortResult<CartLine> {
        let token = guest_line
            .owner
            .guest_token()
            .ok_or_else(|| PortError::Unexpected("only guest lines can be reassigned".to_string()))?;
        let sql = format!(
            "UPDATE cart_lines SET user_id = $1, guest_token = NULL WHERE id = $2 AND guest_token = $3 \
             RETURNING {LINE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, CartLineRecord>(&sql)
            .bind(user_id)
            .bind(guest_line.id)
            .bind(token.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict(format!(
                        "User {} already has product {} in the cart",
                        user_id, guest_line.product_id
                    ))
                } else {
                    unexpected(e)
                }
            })?;
        record
            .ok_or_else(|| PortError::NotFound(format!("Cart line {} not found", guest_line.id)))?
            .to_domain()
    }
}

//=========================================================================================
// `CatalogService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CatalogService for DbAdapter {
    async fn list_categories(&self, page: PageRequest) -> PortResult<(Vec<Category>, u64)> {
        let records = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, created_at FROM categories ORDER BY id ASC LIMIT $1 OFFSET $2",
        )
        .bind(to_i64(page.limit()))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok((
            records.into_iter().map(|r| r.to_domain()).collect(),
            total.max(0) as u64,
        ))
    }

    async fn get_category(&self, category_id: CategoryId) -> PortResult<Category> {
        sqlx::query_as::<_, CategoryRecord>("SELECT id, name, created_at FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("Category {} not found", category_id)))
    }

    async fn create_category(&self, name: &str) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_category(&self, category_id: CategoryId, name: &str) -> PortResult<Category> {
        sqlx::query_as::<_, CategoryRecord>(
            "UPDATE categories SET name = $1 WHERE id = $2 RETURNING id, name, created_at",
        )
        .bind(name)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(|r| r.to_domain())
        .ok_or_else(|| PortError::NotFound(format!("Category {} not found", category_id)))
    }

    async fn delete_category(&self, category_id: CategoryId) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Category {} not found", category_id)));
        }
        Ok(())
    }

    async fn product_exists(&self, product_id: ProductId) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn get_product(&self, product_id: ProductId) -> PortResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn products_by_ids(&self, product_ids: &[ProductId]) -> PortResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let records = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product_ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_products(&self, page: PageRequest) -> PortResult<(Vec<Product>, u64)> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id ASC LIMIT $1 OFFSET $2");
        let records = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(to_i64(page.limit()))
            .bind(to_i64(page.offset()))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok((
            records.into_iter().map(|r| r.to_domain()).collect(),
            total.max(0) as u64,
        ))
    }

    async fn create_product(&self, product: NewProduct) -> PortResult<Product> {
        let sql = format!(
            "INSERT INTO products (category_id, name, image, quantity, sku, seo_title, seo_description, \
             description, current_price, offer_price, offer_start_date, offer_end_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {PRODUCT_COLUMNS}"
        );
        let category_id = product.category_id;
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product.category_id)
            .bind(product.name)
            .bind(product.image)
            .bind(product.quantity)
            .bind(product.sku)
            .bind(product.seo_title)
            .bind(product.seo_description)
            .bind(product.description)
            .bind(product.current_price)
            .bind(product.offer.price)
            .bind(product.offer.starts_on)
            .bind(product.offer.ends_on)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PortError::NotFound(format!("Category {} not found", category_id))
                } else {
                    unexpected(e)
                }
            })?;
        Ok(record.to_domain())
    }

    async fn update_product(&self, product_id: ProductId, changes: ProductChanges) -> PortResult<Product> {
        let sql = format!(
            "UPDATE products SET \
             category_id = COALESCE($2, category_id), \
             name = COALESCE($3, name), \
             image = COALESCE($4, image), \
             quantity = COALESCE($5, quantity), \
             sku = COALESCE($6, sku), \
             seo_title = COALESCE($7, seo_title), \
             seo_description = COALESCE($8, seo_description), \
             description = COALESCE($9, description), \
             current_price = COALESCE($10, current_price), \
             offer_price = COALESCE($11, offer_price), \
             offer_start_date = COALESCE($12, offer_start_date), \
             offer_end_date = COALESCE($13, offer_end_date) \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let category_id = changes.category_id;
        sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product_id)
            .bind(changes.category_id)
            .bind(changes.name)
            .bind(changes.image)
            .bind(changes.quantity)
            .bind(changes.sku)
            .bind(changes.seo_title)
            .bind(changes.seo_description)
            .bind(changes.description)
            .bind(changes.current_price)
            .bind(changes.offer_price)
            .bind(changes.offer_starts_on)
            .bind(changes.offer_ends_on)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PortError::NotFound(format!("Category {} not found", category_id.unwrap_or_default()))
                } else {
                    unexpected(e)
                }
            })?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn delete_product(&self, product_id: ProductId) -> PortResult<Product> {
        let sql = format!("DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}");
        sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }
}

//=========================================================================================
// `PrincipalStore` and `TokenService` Trait Implementations
//=========================================================================================

#[async_trait]
impl PrincipalStore for DbAdapter {
    async fn create_principal(
        &self,
        kind: PrincipalKind,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<Principal> {
        let sql = format!(
            "INSERT INTO {} (name, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, name, email, password_hash",
            principal_table(kind)
        );
        let record = sqlx::query_as::<_, PrincipalRecord>(&sql)
            .bind(name)
            .bind(email)
            .bind(hashed_password)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict(format!("Email {} is already registered", email))
                } else {
                    unexpected(e)
                }
            })?;
        Ok(record.to_domain(kind).principal)
    }

    async fn get_credentials_by_email(&self, kind: PrincipalKind, email: &str) -> PortResult<PrincipalCredentials> {
        let sql = format!(
            "SELECT id, name, email, password_hash FROM {} WHERE LOWER(email) = LOWER($1)",
            principal_table(kind)
        );
        sqlx::query_as::<_, PrincipalRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(|r| r.to_domain(kind))
            .ok_or_else(|| PortError::NotFound(format!("No {} with email {}", kind.as_str(), email)))
    }
}

#[async_trait]
impl TokenService for DbAdapter {
    async fn issue_token(&self, principal: &Principal) -> PortResult<String> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + self.token_ttl;
        sqlx::query(
            "INSERT INTO access_tokens (token, principal_kind, principal_id, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&token)
        .bind(principal.kind.as_str())
        .bind(principal.id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(token)
    }

    async fn verify_token(&self, token: &str) -> PortResult<Principal> {
        let record = sqlx::query_as::<_, TokenRecord>(
            "SELECT principal_kind, principal_id FROM access_tokens WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        let kind = PrincipalKind::parse(&record.principal_kind).ok_or(PortError::Unauthorized)?;
        let sql = format!(
            "SELECT id, name, email, password_hash FROM {} WHERE id = $1",
            principal_table(kind)
        );
        sqlx::query_as::<_, PrincipalRecord>(&sql)
            .bind(record.principal_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(|r| r.to_domain(kind).principal)
            .ok_or(PortError::Unauthorized)
    }

    async fn revoke_token(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `WishlistStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl WishlistStore for DbAdapter {
    async fn toggle(&self, user_id: PrincipalId, product_id: ProductId) -> PortResult<WishlistToggle> {
        let removed = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if removed.rows_affected() > 0 {
            return Ok(WishlistToggle::Removed);
        }

        sqlx::query(
            "INSERT INTO wishlists (user_id, product_id) VALUES ($1, $2) ON CONFLICT (user_id, product_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                PortError::NotFound(format!("Product {} not found", product_id))
            } else {
                unexpected(e)
            }
        })?;
        Ok(WishlistToggle::Added)
    }

    async fn list(&self, user_id: PrincipalId, page: PageRequest) -> PortResult<(Vec<WishlistEntry>, u64)> {
        let records = sqlx::query_as::<_, WishlistRecord>(
            "SELECT w.id, w.user_id, w.product_id, p.name AS product_name \
             FROM wishlists w JOIN products p ON p.id = w.product_id \
             WHERE w.user_id = $1 ORDER BY w.id ASC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(to_i64(page.limit()))
        .bind(to_i64(page.offset()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wishlists WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok((
            records.into_iter().map(|r| r.to_domain()).collect(),
            total.max(0) as u64,
        ))
    }

    async fn remove(&self, user_id: PrincipalId, product_id: ProductId) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }
}

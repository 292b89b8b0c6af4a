//! services/api/src/web/catalog.rs
//!
//! Admin endpoints for categories and products. Products arrive as
//! multipart forms carrying an optional image, which is written to image
//! storage before the row and removed again if the row cannot be saved.

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    response::Response,
};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::ports::PortError;
use shop_core::{Category, NewProduct, Offer, Page, PageRequest, Product, ProductChanges};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{ApiError, FieldErrors};
use crate::web::extract::{PageQuery, ValidatedJson, ValidatedPath, ValidatedQuery};
use crate::web::response::{listing, send, send_empty};
use crate::web::state::AppState;

/// Uploads larger than this are rejected, in bytes.
const MAX_IMAGE_BYTES: usize = 2048 * 1024;
const IMAGE_EXTENSIONS: [&str; 3] = ["jpeg", "png", "jpg"];
const IMAGE_DIRECTORY: &str = "products";
const DATE_FORMAT: &str = "%d/%m/%Y";

//=========================================================================================
// Category Types
//=========================================================================================

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 255, message = "The name field must be between 1 and 255 characters."))]
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryQuery {
    pub id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            created_at: category.created_at,
        }
    }
}

//=========================================================================================
// Product Types
//=========================================================================================

/// Multipart fields accepted by the product store and edit endpoints.
#[derive(ToSchema)]
pub struct ProductUpload {
    pub category_id: i64,
    pub name: String,
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    pub quantity: i32,
    pub sku: String,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub description: String,
    #[schema(value_type = String)]
    pub current_price: Decimal,
    #[schema(value_type = Option<String>)]
    pub offer_price: Option<Decimal>,
    /// `d/m/Y`
    pub offer_start_date: Option<String>,
    /// `d/m/Y`
    pub offer_end_date: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductSummary {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub current_price: Decimal,
    #[schema(value_type = Option<String>)]
    pub offer_price: Option<Decimal>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub sku: String,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub description: String,
    #[schema(value_type = String)]
    pub current_price: Decimal,
    #[schema(value_type = Option<String>)]
    pub offer_price: Option<Decimal>,
    pub offer_start_date: Option<NaiveDate>,
    pub offer_end_date: Option<NaiveDate>,
    #[schema(value_type = String)]
    pub effective_price: Decimal,
    pub category: Option<CategorySummary>,
}

impl ProductResponse {
    fn new(state: &AppState, product: Product, category: Option<Category>, today: NaiveDate) -> Self {
        Self {
            id: product.id,
            image: product.image.as_deref().map(|path| state.image_url(path)),
            effective_price: product.effective_price(today),
            name: product.name,
            quantity: product.quantity,
            sku: product.sku,
            seo_title: product.seo_title,
            seo_description: product.seo_description,
            description: product.description,
            current_price: product.current_price,
            offer_price: product.offer.price,
            offer_start_date: product.offer.starts_on,
            offer_end_date: product.offer.ends_on,
            category: category.map(|c| CategorySummary { id: c.id, name: c.name }),
        }
    }
}

//=========================================================================================
// Category Handlers
//=========================================================================================

/// GET /admin/categories
#[utoipa::path(
    get,
    path = "/admin/categories",
    tag = "categories",
    params(PageQuery),
    responses((status = 200, description = "Categories, or a null payload when there are none", body = [CategorySummary])),
    security(("bearer_auth" = []))
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Response, ApiError> {
    let request = PageRequest::new(query.page(), state.config.page_size);
    let (categories, total) = state.catalog.list_categories(request).await?;
    let page = Page::new(categories, request, total);
    if page.is_empty() {
        return Ok(send_empty(StatusCode::OK, "No Categories found."));
    }
    let body = listing(
        page.map(|c| CategorySummary { id: c.id, name: c.name }),
        &state.url("/admin/categories"),
    );
    Ok(send(StatusCode::OK, "Categories retrieved successfully", Some(body)))
}

/// GET /admin/category?id=
#[utoipa::path(
    get,
    path = "/admin/category",
    tag = "categories",
    params(CategoryQuery),
    responses(
        (status = 200, description = "The category", body = CategoryResponse),
        (status = 404, description = "Unknown category")
    ),
    security(("bearer_auth" = []))
)]
pub async fn show_category(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<CategoryQuery>,
) -> Result<Response, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::field("id", "The id field is required."))?;
    let category = state.catalog.get_category(id).await?;
    Ok(send(
        StatusCode::OK,
        "Category retrieved successfully",
        Some(CategoryResponse::from(category)),
    ))
}

/// POST /admin/categories/store
#[utoipa::path(
    post,
    path = "/admin/categories/store",
    tag = "categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn store_category(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CategoryRequest>,
) -> Result<Response, ApiError> {
    let category = state.catalog.create_category(req.name.trim()).await?;
    info!(category_id = category.id, "Category created");
    Ok(send(
        StatusCode::CREATED,
        "Category Created Successfully",
        Some(CategoryResponse::from(category)),
    ))
}

/// POST /admin/category/edit/{id}
#[utoipa::path(
    post,
    path = "/admin/category/edit/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category id")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 404, description = "Unknown category"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    ValidatedPath(id): ValidatedPath<i64>,
    ValidatedJson(req): ValidatedJson<CategoryRequest>,
) -> Result<Response, ApiError> {
    let category = state.catalog.update_category(id, req.name.trim()).await?;
    Ok(send(
        StatusCode::OK,
        "Category updated successfully",
        Some(CategoryResponse::from(category)),
    ))
}

/// POST /admin/category/destroy/{id} - Also removes the category's products.
#[utoipa::path(
    post,
    path = "/admin/category/destroy/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Unknown category")
    ),
    security(("bearer_auth" = []))
)]
pub async fn destroy_category(
    State(state): State<Arc<AppState>>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> Result<Response, ApiError> {
    state.catalog.delete_category(id).await?;
    info!(category_id = id, "Category deleted");
    Ok(send_empty(StatusCode::OK, "Category Deleted successfully"))
}

//=========================================================================================
// Product Form Parsing
//=========================================================================================

struct UploadedImage {
    extension: String,
    bytes: Bytes,
}

/// The raw multipart form: text fields by name plus the image part.
#[derive(Default)]
struct ProductForm {
    fields: HashMap<String, String>,
    image: Option<UploadedImage>,
    errors: FieldErrors,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::field("body", e.body_text())
}

fn image_extension(field: &Field<'_>) -> Option<String> {
    let from_name = field
        .file_name()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    let from_mime = field
        .content_type()
        .and_then(|mime| mime.strip_prefix("image/"))
        .map(str::to_ascii_lowercase);
    from_name
        .or(from_mime)
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "image" {
                let extension = image_extension(&field);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.is_empty() {
                    continue;
                }
                match extension {
                    None => form.reject("image", "The image field must be a file of type: jpeg, png, jpg."),
                    Some(_) if bytes.len() > MAX_IMAGE_BYTES => {
                        form.reject("image", "The image field must not be greater than 2048 kilobytes.")
                    }
                    Some(extension) => {
                        form.image = Some(UploadedImage { extension, bytes })
                    }
                }
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value.trim().to_string());
            }
        }
        Ok(form)
    }

    fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    fn raw(&self, field: &str) -> Option<String> {
        self.fields.get(field).filter(|v| !v.is_empty()).cloned()
    }

    fn require(&mut self, field: &str, required: bool) -> Option<String> {
        let value = self.raw(field);
        if value.is_none() && required {
            self.reject(field, format!("The {} field is required.", field.replace('_', " ")));
        }
        value
    }

    fn text(&mut self, field: &str, max_chars: usize, required: bool) -> Option<String> {
        let value = self.require(field, required)?;
        if value.chars().count() > max_chars {
            self.reject(
                field,
                format!("The {} field must not be greater than {} characters.", field.replace('_', " "), max_chars),
            );
            return None;
        }
        Some(value)
    }

    fn parsed<T: FromStr>(&mut self, field: &str, required: bool, message: &str) -> Option<T> {
        let value = self.require(field, required)?;
        match value.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.reject(field, message);
                None
            }
        }
    }

    fn quantity(&mut self, required: bool) -> Option<i32> {
        let quantity: i32 = self.parsed("quantity", required, "The quantity field must be a number.")?;
        if quantity < 1 {
            self.reject("quantity", "The quantity field must be at least 1.");
            return None;
        }
        Some(quantity)
    }

    fn price(&mut self, field: &str, required: bool) -> Option<Decimal> {
        let message = format!("The {} field must be a number.", field.replace('_', " "));
        self.parsed(field, required, &message)
    }

    fn date(&mut self, field: &str) -> Option<NaiveDate> {
        let value = self.raw(field)?;
        match NaiveDate::parse_from_str(&value, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(_) => {
                self.reject(
                    field,
                    format!("The {} field must match the format d/m/Y.", field.replace('_', " ")),
                );
                None
            }
        }
    }

    /// Parses the offer dates; `current_start` stands in for an omitted start on edits.
    fn offer_dates(&mut self, today: NaiveDate, current_start: Option<NaiveDate>) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let start = self.date("offer_start_date");
        let end = self.date("offer_end_date");
        if let Some(start) = start {
            if start < today {
                self.reject(
                    "offer_start_date",
                    "The offer start date field must be a date after or equal to today.",
                );
            }
        }
        if let (Some(start), Some(end)) = (start.or(current_start), end) {
            if end <= start {
                self.reject(
                    "offer_end_date",
                    "The offer end date field must be a date after offer start date.",
                );
            }
        }
        (start, end)
    }

    /// The uploaded image, once every field has passed.
    fn finish(self) -> Result<Option<UploadedImage>, ApiError> {
        if self.errors.is_empty() {
            Ok(self.image)
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// Rejects an unknown category as a validation error on `category_id`.
async fn ensure_category(state: &AppState, category_id: i64) -> Result<Category, ApiError> {
    match state.catalog.get_category(category_id).await {
        Ok(category) => Ok(category),
        Err(PortError::NotFound(_)) => Err(ApiError::field(
            "category_id",
            "The selected category id is invalid.",
        )),
        Err(e) => Err(e.into()),
    }
}

async fn discard_image(state: &AppState, path: &str) {
    if let Err(e) = state.images.delete_image(path).await {
        warn!(path, error = %e, "Failed to delete product image");
    }
}

//=========================================================================================
// Product Handlers
//=========================================================================================

/// GET /admin/products
#[utoipa::path(
    get,
    path = "/admin/products",
    tag = "products",
    params(PageQuery),
    responses((status = 200, description = "Products, or a null payload when there are none", body = [ProductSummary])),
    security(("bearer_auth" = []))
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Response, ApiError> {
    let request = PageRequest::new(query.page(), state.config.page_size);
    let (products, total) = state.catalog.list_products(request).await?;
    let page = Page::new(products, request, total);
    if page.is_empty() {
        return Ok(send_empty(StatusCode::OK, "No Products found."));
    }
    let body = listing(
        page.map(|p| ProductSummary {
            id: p.id,
            image: p.image.as_deref().map(|path| state.image_url(path)),
            name: p.name,
            quantity: p.quantity,
            current_price: p.current_price,
            offer_price: p.offer.price,
        }),
        &state.url("/admin/products"),
    );
    Ok(send(StatusCode::OK, "Products retrieved successfully", Some(body)))
}

/// GET /admin/product/show/{id}
#[utoipa::path(
    get,
    path = "/admin/product/show/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product with its effective price", body = ProductResponse),
        (status = 404, description = "Unknown product")
    ),
    security(("bearer_auth" = []))
)]
pub async fn show_product(
    State(state): State<Arc<AppState>>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> Result<Response, ApiError> {
    let product = state.catalog.get_product(id).await?;
    let category = state.catalog.get_category(product.category_id).await.ok();
    let today = Utc::now().date_naive();
    Ok(send(
        StatusCode::OK,
        "Product retrieved successfully",
        Some(ProductResponse::new(&state, product, category, today)),
    ))
}

/// POST /admin/product/store
#[utoipa::path(
    post,
    path = "/admin/product/store",
    tag = "products",
    request_body(content_type = "multipart/form-data", content = ProductUpload),
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn store_product(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let today = Utc::now().date_naive();
    let mut form = ProductForm::read(multipart).await?;

    let category_id: Option<i64> =
        form.parsed("category_id", true, "The selected category id is invalid.");
    let name = form.text("name", 255, true);
    if form.image.is_none() && !form.errors.contains_key("image") {
        form.reject("image", "The image field is required.");
    }
    let quantity = form.quantity(true);
    let sku = form.text("sku", 100, true);
    let seo_title = form.text("seo_title", 255, false);
    let seo_description = form.text("seo_description", 5000, false);
    let description = form.text("description", 5000, true);
    let current_price = form.price("current_price", true);
    let offer_price = form.price("offer_price", false);
    let (starts_on, ends_on) = form.offer_dates(today, None);
    let image = form.finish()?;

    // `finish` succeeded, so every required value is present.
    let (Some(category_id), Some(name), Some(quantity), Some(sku), Some(description), Some(current_price), Some(image)) =
        (category_id, name, quantity, sku, description, current_price, image)
    else {
        return Err(ApiError::Internal("product form passed validation incomplete".to_string()));
    };
    let category = ensure_category(&state, category_id).await?;

    let image_path = state
        .images
        .store_image(IMAGE_DIRECTORY, &image.extension, &image.bytes)
        .await?;
    let created = state
        .catalog
        .create_product(NewProduct {
            category_id,
            name,
            image: Some(image_path.clone()),
            quantity,
            sku,
            seo_title,
            seo_description,
            description,
            current_price,
            offer: Offer {
                price: offer_price,
                starts_on,
                ends_on,
            },
        })
        .await;
    let product = match created {
        Ok(product) => product,
        Err(e) => {
            discard_image(&state, &image_path).await;
            return Err(e.into());
        }
    };

    info!(product_id = product.id, category_id, "Product created");
    Ok(send(
        StatusCode::CREATED,
        "Product Created Successfully",
        Some(ProductResponse::new(&state, product, Some(category), today)),
    ))
}

/// POST /admin/product/edit/{id} - Every field is optional; a new image replaces the old one.
#[utoipa::path(
    post,
    path = "/admin/product/edit/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    request_body(content_type = "multipart/form-data", content = ProductUpload),
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 404, description = "Unknown product"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    ValidatedPath(id): ValidatedPath<i64>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let today = Utc::now().date_naive();
    let existing = state.catalog.get_product(id).await?;
    let mut form = ProductForm::read(multipart).await?;

    let category_id: Option<i64> =
        form.parsed("category_id", false, "The selected category id is invalid.");
    let mut changes = ProductChanges {
        category_id,
        name: form.text("name", 255, false),
        quantity: form.quantity(false),
        sku: form.text("sku", 100, false),
        seo_title: form.text("seo_title", 255, false),
        seo_description: form.text("seo_description", 5000, false),
        description: form.text("description", 5000, false),
        current_price: form.price("current_price", false),
        offer_price: form.price("offer_price", false),
        ..ProductChanges::default()
    };
    let (starts_on, ends_on) = form.offer_dates(today, existing.offer.starts_on);
    changes.offer_starts_on = starts_on;
    changes.offer_ends_on = ends_on;
    let image = form.finish()?;

    let category = match changes.category_id {
        Some(category_id) => Some(ensure_category(&state, category_id).await?),
        None => state.catalog.get_category(existing.category_id).await.ok(),
    };

    let new_image_path = match image {
        Some(image) => Some(
            state
                .images
                .store_image(IMAGE_DIRECTORY, &image.extension, &image.bytes)
                .await?,
        ),
        None => None,
    };
    changes.image = new_image_path.clone();

    let product = match state.catalog.update_product(id, changes).await {
        Ok(product) => product,
        Err(e) => {
            if let Some(path) = &new_image_path {
                discard_image(&state, path).await;
            }
            return Err(e.into());
        }
    };
    if let (Some(_), Some(old)) = (&new_image_path, &existing.image) {
        discard_image(&state, old).await;
    }

    Ok(send(
        StatusCode::OK,
        "Product updated successfully",
        Some(ProductResponse::new(&state, product, category, today)),
    ))
}

/// POST /admin/product/destroy/{id} - Removes the product and its image.
#[utoipa::path(
    post,
    path = "/admin/product/destroy/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Unknown product")
    ),
    security(("bearer_auth" = []))
)]
pub async fn destroy_product(
    State(state): State<Arc<AppState>>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> Result<Response, ApiError> {
    let product = state.catalog.delete_product(id).await?;
    if let Some(path) = &product.image {
        discard_image(&state, path).await;
    }
    info!(product_id = id, "Product deleted");
    Ok(send_empty(StatusCode::OK, "Product deleted successfully"))
}

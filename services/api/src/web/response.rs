//! services/api/src/web/response.rs
//!
//! The `{status_code, message, data}` envelope every endpoint answers with,
//! and the paginated listing shape shared by carts, wishlists and the catalog.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value;
use shop_core::{Page, PageMeta};
use utoipa::ToSchema;

/// Uniform response body.
#[derive(Serialize)]
pub struct Envelope<T> {
    pub status_code: u16,
    pub message: String,
    pub data: Option<T>,
}

/// Wraps `data` in the envelope with a matching HTTP status.
pub fn send<T: Serialize>(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Response {
    let body = Envelope {
        status_code: status.as_u16(),
        message: message.into(),
        data,
    };
    (status, Json(body)).into_response()
}

/// Appends a `Set-Cookie` header when `cookie` is present.
pub fn with_cookie(mut response: Response, cookie: Option<String>) -> Response {
    if let Some(value) = cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// Envelope without a payload.
pub fn send_empty(status: StatusCode, message: impl Into<String>) -> Response {
    send::<Value>(status, message, None)
}

#[derive(Serialize, ToSchema)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total_records: u64,
    pub total_pages: u32,
    pub links: PageLinks,
}

impl Pagination {
    /// `base_url` is the absolute URL of the listing without a query string.
    pub fn new(meta: &PageMeta, base_url: &str) -> Self {
        let link = |page: u32| format!("{}?page={}", base_url, page);
        Self {
            current_page: meta.current_page,
            per_page: meta.per_page,
            total_records: meta.total_records,
            total_pages: meta.total_pages(),
            links: PageLinks {
                first: link(meta.first_page()),
                last: link(meta.last_page()),
                prev: meta.prev_page().map(link),
                next: meta.next_page().map(link),
            },
        }
    }
}

#[derive(Serialize)]
pub struct PaginatedRecords<T> {
    pub records: Vec<T>,
    pub pagination: Pagination,
}

/// A bare array when everything fits on one page, otherwise records plus pagination.
pub fn listing<T: Serialize>(page: Page<T>, base_url: &str) -> Value {
    let result = if page.meta.spans_multiple_pages() {
        let pagination = Pagination::new(&page.meta, base_url);
        serde_json::to_value(PaginatedRecords {
            records: page.items,
            pagination,
        })
    } else {
        serde_json::to_value(page.items)
    };
    result.unwrap_or(Value::Null)
}

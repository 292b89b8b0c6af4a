//! End-to-end router tests over the in-memory store: guest carts, cookie
//! issuance, guest → user reconciliation on register/login, route guards and
//! error envelopes.

use api_lib::config::Config;
use api_lib::web::{router, AppState};
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use async_trait::async_trait;
use shop_core::memory::InMemoryStore;
use shop_core::ports::CatalogService;
use shop_core::{
    CartLine, CartStore, NewProduct, Offer, OwnerIdentity, PageRequest, PortError, PortResult, Quantity,
};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Reply {
    /// The `name=value` part of the guest cookie set by this response.
    fn guest_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("guest_token="))
            .map(|v| v.split(';').next().unwrap().to_string())
    }

    fn set_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string())
    }
}

/// Serves reads and adds but cannot move any guest line to a user.
struct StuckCartStore(Arc<InMemoryStore>);

#[async_trait]
impl CartStore for StuckCartStore {
    async fn find_line(&self, owner: &OwnerIdentity, product_id: i64) -> PortResult<Option<CartLine>> {
        self.0.find_line(owner, product_id).await
    }
    async fn add_quantity(&self, owner: &OwnerIdentity, product_id: i64, quantity: Quantity) -> PortResult<CartLine> {
        self.0.add_quantity(owner, product_id, quantity).await
    }
    async fn remove_line(&self, owner: &OwnerIdentity, product_id: i64) -> PortResult<bool> {
        self.0.remove_line(owner, product_id).await
    }
    async fn list_lines(&self, owner: &OwnerIdentity, page: PageRequest) -> PortResult<(Vec<CartLine>, u64)> {
        self.0.list_lines(owner, page).await
    }
    async fn all_lines(&self, owner: &OwnerIdentity) -> PortResult<Vec<CartLine>> {
        self.0.all_lines(owner).await
    }
    async fn merge_line(&self, _guest_line: &CartLine, _user_line: &CartLine) -> PortResult<CartLine> {
        Err(PortError::Unexpected("connection reset".to_string()))
    }
    async fn reassign_line(&self, _guest_line: &CartLine, _user_id: i64) -> PortResult<CartLine> {
        Err(PortError::Unexpected("connection reset".to_string()))
    }
}

impl TestApp {
    fn new() -> Self {
        Self::with_cart_store(|store| store as Arc<dyn CartStore>)
    }

    fn with_cart_store(wrap: impl FnOnce(Arc<InMemoryStore>) -> Arc<dyn CartStore>) -> Self {
        let storage = std::env::temp_dir().join(format!("storefront-test-{}", uuid::Uuid::new_v4().simple()));
        let storage = storage.to_string_lossy().to_string();
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://unused".to_string()),
            "STORAGE_PATH" => Some(storage.clone()),
            "PAGE_SIZE" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(
            Arc::new(config),
            wrap(store.clone()),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        Self {
            router: router(Arc::new(state)),
            store,
        }
    }

    async fn product(&self, price: i64) -> i64 {
        let category = self.store.create_category("Shoes").await.unwrap();
        let product = self
            .store
            .create_product(NewProduct {
                category_id: category.id,
                name: format!("Sneaker {}", price),
                image: None,
                quantity: 10,
                sku: "SKU-1".to_string(),
                seo_title: None,
                seo_description: None,
                description: "A shoe".to_string(),
                current_price: Decimal::from(price),
                offer: Offer::default(),
            })
            .await
            .unwrap();
        product.id
    }

    async fn call(&self, method: &str, uri: &str, body: Option<Value>, auth: Option<&str>, cookie: Option<&str>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply { status, headers, body }
    }

    async fn register(&self, path: &str, email: &str, cookie: Option<&str>) -> Reply {
        let body = json!({ "name": "Ada", "email": email, "password": "correct horse" });
        self.call("POST", path, Some(body), None, cookie).await
    }
}

fn token_of(reply: &Reply) -> String {
    reply.body["data"]["token"].as_str().unwrap().to_string()
}

fn total_of(reply: &Reply) -> Decimal {
    reply.body["data"]["total_price"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn first_guest_request_issues_exactly_one_cookie() {
    let app = TestApp::new();
    let product = app.product(100).await;

    let first = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": product, "quantity": 2 })), None, None)
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    let cookie = first.guest_cookie().expect("a guest token cookie");
    assert!(first.set_cookie().unwrap().contains("Max-Age=604800"));

    let second = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": product, "quantity": 3 })), None, Some(&cookie))
        .await;
    assert_eq!(second.status, StatusCode::CREATED);
    assert!(second.guest_cookie().is_none());

    let view = app.call("GET", "/guest-cart/view-items", None, None, Some(&cookie)).await;
    assert_eq!(view.status, StatusCode::OK);
    assert_eq!(view.body["data"][0]["quantity"], 5);
    assert_eq!(app.store.line_count(), 1);
}

#[tokio::test]
async fn empty_cart_has_no_payload() {
    let app = TestApp::new();
    let view = app.call("GET", "/guest-cart/view-items", None, None, None).await;
    assert_eq!(view.status, StatusCode::OK);
    assert_eq!(view.body["message"], "No items to view.");
    assert_eq!(view.body["data"], Value::Null);
}

#[tokio::test]
async fn registering_adopts_the_guest_cart_and_retires_the_cookie() {
    let app = TestApp::new();
    let product = app.product(100).await;
    let added = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": product, "quantity": 2 })), None, None)
        .await;
    let cookie = added.guest_cookie().unwrap();

    let registered = app.register("/register", "ada@example.com", Some(&cookie)).await;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.body["data"]["email"], "ada@example.com");
    assert!(registered.set_cookie().unwrap().contains("Max-Age=0"));
    let token = token_of(&registered);

    let user_view = app.call("GET", "/auth-cart/view-items", None, Some(&token), None).await;
    assert_eq!(user_view.body["data"][0]["product_id"], product);
    assert_eq!(user_view.body["data"][0]["quantity"], 2);

    let guest_view = app.call("GET", "/guest-cart/view-items", None, None, Some(&cookie)).await;
    assert_eq!(guest_view.body["message"], "No items to view.");
    assert_eq!(app.store.line_count(), 1);
}

#[tokio::test]
async fn login_merges_into_the_existing_user_line() {
    let app = TestApp::new();
    let product = app.product(100).await;
    let token = token_of(&app.register("/register", "bob@example.com", None).await);
    app.call("POST", "/auth-cart/add", Some(json!({ "product_id": product, "quantity": 3 })), Some(&token), None)
        .await;

    let guest = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": product, "quantity": 2 })), None, None)
        .await;
    let cookie = guest.guest_cookie().unwrap();

    let login = app
        .call(
            "POST",
            "/login",
            Some(json!({ "email": "bob@example.com", "password": "correct horse" })),
            None,
            Some(&cookie),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let token = token_of(&login);

    let total = app.call("GET", "/auth-cart/total-price", None, Some(&token), None).await;
    assert_eq!(total_of(&total), Decimal::from(500));
    assert_eq!(app.store.line_count(), 1);
}

#[tokio::test]
async fn wrong_password_is_rejected_without_touching_the_guest_cart() {
    let app = TestApp::new();
    let product = app.product(100).await;
    app.register("/register", "eve@example.com", None).await;
    let guest = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": product, "quantity": 1 })), None, None)
        .await;
    let cookie = guest.guest_cookie().unwrap();

    let login = app
        .call(
            "POST",
            "/login",
            Some(json!({ "email": "eve@example.com", "password": "wrong password" })),
            None,
            Some(&cookie),
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);

    let guest_view = app.call("GET", "/guest-cart/view-items", None, None, Some(&cookie)).await;
    assert_eq!(guest_view.body["data"][0]["quantity"], 1);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestApp::new();
    assert_eq!(app.register("/register", "dup@example.com", None).await.status, StatusCode::CREATED);
    let again = app.register("/register", "DUP@example.com", None).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cart_input_is_validated_before_anything_is_written() {
    let app = TestApp::new();
    let product = app.product(100).await;

    let zero = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": product, "quantity": 0 })), None, None)
        .await;
    assert_eq!(zero.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(zero.body["data"]["errors"]["quantity"].is_array());

    let missing = app.call("POST", "/guest-cart/add", Some(json!({ "quantity": 1 })), None, None).await;
    assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(missing.body["data"]["errors"]["product_id"].is_array());

    let unknown = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": 9999, "quantity": 1 })), None, None)
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.line_count(), 0);
}

#[tokio::test]
async fn removing_a_product_not_in_the_cart_is_not_found() {
    let app = TestApp::new();
    let product = app.product(100).await;
    let reply = app
        .call("POST", "/guest-cart/remove", Some(json!({ "product_id": product })), None, None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "Item not found in cart.");
}

#[tokio::test]
async fn guest_listing_paginates_past_one_page() {
    let app = TestApp::new();
    let mut cookie = None;
    for price in [10, 20, 30] {
        let product = app.product(price).await;
        let reply = app
            .call(
                "POST",
                "/guest-cart/add",
                Some(json!({ "product_id": product, "quantity": 1 })),
                None,
                cookie.as_deref(),
            )
            .await;
        cookie = cookie.or(reply.guest_cookie());
    }

    let page_two = app
        .call("GET", "/guest-cart/view-items?page=2", None, None, cookie.as_deref())
        .await;
    assert_eq!(page_two.body["data"]["records"].as_array().unwrap().len(), 1);
    assert_eq!(page_two.body["data"]["pagination"]["total_records"], 3);
    assert_eq!(page_two.body["data"]["pagination"]["total_pages"], 2);
    assert_eq!(page_two.body["data"]["pagination"]["links"]["next"], Value::Null);
}

#[tokio::test]
async fn auth_cart_requires_a_user_token() {
    let app = TestApp::new();
    let anonymous = app.call("GET", "/auth-cart/view-items", None, None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let bogus = app.call("GET", "/auth-cart/view-items", None, Some("not-a-token"), None).await;
    assert_eq!(bogus.status, StatusCode::UNAUTHORIZED);

    let admin = token_of(&app.register("/admin/register", "root@example.com", None).await);
    let as_admin = app.call("GET", "/auth-cart/view-items", None, Some(&admin), None).await;
    assert_eq!(as_admin.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_routes_reject_users_and_anonymous_callers() {
    let app = TestApp::new();
    let anonymous = app.call("GET", "/admin/categories", None, None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let user = token_of(&app.register("/register", "user@example.com", None).await);
    let as_user = app.call("GET", "/admin/categories", None, Some(&user), None).await;
    assert_eq!(as_user.status, StatusCode::FORBIDDEN);
    assert_eq!(as_user.body["message"], "Unauthorized access");

    let admin = token_of(&app.register("/admin/register", "admin@example.com", None).await);
    let created = app
        .call("POST", "/admin/categories/store", Some(json!({ "name": "Hats" })), Some(&admin), None)
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["data"]["id"].as_i64().unwrap();

    let shown = app
        .call("GET", &format!("/admin/category?id={}", id), None, Some(&admin), None)
        .await;
    assert_eq!(shown.body["data"]["name"], "Hats");
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new();
    let token = token_of(&app.register("/register", "out@example.com", None).await);

    let wrong_kind = app.call("POST", "/admin/logout", None, Some(&token), None).await;
    assert_eq!(wrong_kind.status, StatusCode::UNAUTHORIZED);

    let out = app.call("POST", "/logout", None, Some(&token), None).await;
    assert_eq!(out.status, StatusCode::OK);

    let after = app.call("GET", "/auth-cart/view-items", None, Some(&token), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wishlist_toggles() {
    let app = TestApp::new();
    let product = app.product(100).await;
    let token = token_of(&app.register("/register", "wish@example.com", None).await);

    let added = app
        .call("POST", "/wishlist/toggle-wishlist", Some(json!({ "product_id": product })), Some(&token), None)
        .await;
    assert_eq!(added.status, StatusCode::CREATED);

    let listed = app.call("GET", "/wishlist/view-wishlist", None, Some(&token), None).await;
    assert_eq!(listed.body["data"][0]["product_id"], product);

    let removed = app
        .call("POST", "/wishlist/toggle-wishlist", Some(json!({ "product_id": product })), Some(&token), None)
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let gone = app
        .call("POST", "/wishlist/remove-from-wishlist", Some(json!({ "product_id": product })), Some(&token), None)
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_query_and_path_values_are_enveloped() {
    let app = TestApp::new();
    let page = app.call("GET", "/guest-cart/view-items?page=abc", None, None, None).await;
    assert_eq!(page.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(page.body["status_code"], 422);
    assert_eq!(page.body["data"]["errors"]["page"][0], "The page field is invalid.");

    let admin = token_of(&app.register("/admin/register", "ids@example.com", None).await);
    let product = app.call("GET", "/admin/product/show/abc", None, Some(&admin), None).await;
    assert_eq!(product.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(product.body["status_code"], 422);
    assert_eq!(product.body["data"]["errors"]["id"][0], "The id field is invalid.");
}

#[tokio::test]
async fn adding_past_the_line_limit_is_a_validation_error() {
    let app = TestApp::new();
    let product = app.product(100).await;
    let token = token_of(&app.register("/register", "bulk@example.com", None).await);

    let huge = app
        .call("POST", "/auth-cart/add", Some(json!({ "product_id": product, "quantity": i32::MAX })), Some(&token), None)
        .await;
    assert_eq!(huge.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(huge.body["data"]["errors"]["quantity"].is_array());

    let most = json!({ "product_id": product, "quantity": Quantity::MAX - 1 });
    let first = app.call("POST", "/auth-cart/add", Some(most), Some(&token), None).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let over = app
        .call("POST", "/auth-cart/add", Some(json!({ "product_id": product, "quantity": 2 })), Some(&token), None)
        .await;
    assert_eq!(over.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(over.body["data"]["errors"]["quantity"].is_array());

    let view = app.call("GET", "/auth-cart/view-items", None, Some(&token), None).await;
    assert_eq!(view.body["data"][0]["quantity"], Quantity::MAX - 1);
}

#[tokio::test]
async fn login_with_a_full_guest_line_caps_the_merge() {
    let app = TestApp::new();
    let product = app.product(1).await;
    let token = token_of(&app.register("/register", "cap@example.com", None).await);
    app.call("POST", "/auth-cart/add", Some(json!({ "product_id": product, "quantity": 1 })), Some(&token), None)
        .await;

    let guest = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": product, "quantity": Quantity::MAX })), None, None)
        .await;
    assert_eq!(guest.status, StatusCode::CREATED);
    let cookie = guest.guest_cookie().unwrap();

    let login = app
        .call(
            "POST",
            "/login",
            Some(json!({ "email": "cap@example.com", "password": "correct horse" })),
            None,
            Some(&cookie),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert!(login.set_cookie().unwrap().contains("Max-Age=0"));

    let view = app.call("GET", "/auth-cart/view-items", None, Some(&token_of(&login)), None).await;
    assert_eq!(view.body["data"][0]["quantity"], Quantity::MAX);
    assert_eq!(app.store.line_count(), 1);
}

#[tokio::test]
async fn failed_transfer_on_register_points_the_client_to_login() {
    let app = TestApp::with_cart_store(|store| Arc::new(StuckCartStore(store)) as Arc<dyn CartStore>);
    let product = app.product(100).await;
    let guest = app
        .call("POST", "/guest-cart/add", Some(json!({ "product_id": product, "quantity": 1 })), None, None)
        .await;
    let cookie = guest.guest_cookie().unwrap();

    let registered = app.register("/register", "stuck@example.com", Some(&cookie)).await;
    assert_eq!(registered.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(registered.body["message"].as_str().unwrap().contains("log in to retry"));
    assert!(registered.set_cookie().is_none());

    let login = app
        .call(
            "POST",
            "/login",
            Some(json!({ "email": "stuck@example.com", "password": "correct horse" })),
            None,
            Some(&cookie),
        )
        .await;
    assert_eq!(login.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(login.body["message"], "Could not transfer the guest cart, please retry");

    let guest_view = app.call("GET", "/guest-cart/view-items", None, None, Some(&cookie)).await;
    assert_eq!(guest_view.body["data"][0]["quantity"], 1);
}

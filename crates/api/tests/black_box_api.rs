use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use motormart_auth::{JwtClaims, PrincipalId, Role};
use motormart_core::TenantId;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = motormart_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn car_listing_body(title: &str, price_cents: u64, stock: u32) -> serde_json::Value {
    json!({
        "title": title,
        "condition": "used",
        "details": {
            "brand": "Toyota",
            "model_year": 2019,
            "category": "sedan",
            "mileage": 42_000,
            "description": "Well maintained, single owner.",
            "features": ["bluetooth", "rear camera"],
        },
        "price_cents": price_cents,
        "stock": stock,
    })
}

/// Poll a tenant-scoped GET until the projection catches up with the
/// command path.
async fn get_eventually(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> serde_json::Value {
    for _ in 0..50 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("resource at {url} did not become visible within timeout");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn staff_listing_is_auto_approved_and_visible_in_catalog() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/listings", srv.base_url))
        .bearer_auth(&token)
        .json(&car_listing_body("2019 Toyota Corolla", 1_450_000, 1))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // Staff-created listings skip the review queue, so the public catalog
    // view picks them up as soon as the projection applies the events.
    let listing = get_eventually(
        &client,
        &format!("{}/catalog/{}", srv.base_url, id),
        &token,
    )
    .await;
    assert_eq!(listing["title"], "2019 Toyota Corolla");
    assert_eq!(listing["approval"], "approved");
    assert_eq!(listing["price_cents"], 1_450_000);
}

#[tokio::test]
async fn seller_listing_requires_approval_before_catalog() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let seller = mint_jwt(jwt_secret, tenant_id, vec![Role::new("seller")]);
    let manager = mint_jwt(jwt_secret, tenant_id, vec![Role::new("manager")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/listings", srv.base_url))
        .bearer_auth(&seller)
        .json(&car_listing_body("2015 Honda Civic", 900_000, 1))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // Pending listings stay off the catalog.
    let mine = get_eventually(
        &client,
        &format!("{}/listings/{}", srv.base_url, id),
        &seller,
    )
    .await;
    assert_eq!(mine["approval"], "pending");
    let res = client
        .get(format!("{}/catalog/{}", srv.base_url, id))
        .bearer_auth(&seller)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // A manager approves it; it then appears in the catalog.
    let res = client
        .post(format!("{}/listings/{}/approve", srv.base_url, id))
        .bearer_auth(&manager)
        .json(&json!({ "note": "looks good" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let mut approved = false;
    for _ in 0..50 {
        let res = client
            .get(format!("{}/catalog/{}", srv.base_url, id))
            .bearer_auth(&seller)
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::OK {
            approved = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(approved, "approved listing never reached the catalog");
}

#[tokio::test]
async fn buyers_cannot_create_listings() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("buyer")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/listings", srv.base_url))
        .bearer_auth(&token)
        .json(&car_listing_body("2020 Mazda 3", 1_200_000, 1))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_isolation_blocks_cross_tenant_reads() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant1 = TenantId::new();
    let tenant2 = TenantId::new();
    let token1 = mint_jwt(jwt_secret, tenant1, vec![Role::new("admin")]);
    let token2 = mint_jwt(jwt_secret, tenant2, vec![Role::new("admin")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/listings", srv.base_url))
        .bearer_auth(&token1)
        .json(&car_listing_body("2018 Ford Focus", 800_000, 1))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    get_eventually(&client, &format!("{}/catalog/{}", srv.base_url, id), &token1).await;

    // Another tenant never sees it, in either view.
    for path in ["catalog", "listings"] {
        let res = client
            .get(format!("{}/{}/{}", srv.base_url, path, id))
            .bearer_auth(&token2)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "leak via /{path}");
    }
}

#[tokio::test]
async fn cart_checkout_places_an_order() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let buyer = mint_jwt(jwt_secret, tenant_id, vec![Role::new("buyer")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/listings", srv.base_url))
        .bearer_auth(&admin)
        .json(&car_listing_body("2021 Kia Sportage", 2_100_000, 2))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let listing_id = created["id"].as_str().unwrap().to_string();

    get_eventually(
        &client,
        &format!("{}/catalog/{}", srv.base_url, listing_id),
        &buyer,
    )
    .await;

    // Add to cart.
    let res = client
        .post(format!("{}/cart/items", srv.base_url))
        .bearer_auth(&buyer)
        .json(&json!({ "listing_id": listing_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Wait for the cart projection before checking out.
    let mut ready = false;
    for _ in 0..50 {
        let cart: serde_json::Value = client
            .get(format!("{}/cart", srv.base_url))
            .bearer_auth(&buyer)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if cart["items"].as_array().is_some_and(|items| !items.is_empty()) {
            ready = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(ready, "cart item never reached the projection");

    // Checkout.
    let res = client
        .post(format!("{}/cart/checkout", srv.base_url))
        .bearer_auth(&buyer)
        .json(&json!({
            "payment_method": "cash_on_delivery",
            "customer_name": "Test Buyer",
            "customer_email": "buyer@example.com",
            "delivery_address": "1 Harbour St",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let placed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(placed["total_cents"], 2_100_000);
    let order_id = placed["id"].as_str().unwrap().to_string();

    // The order shows up under the buyer's own orders.
    let mut found = false;
    for _ in 0..50 {
        let body: serde_json::Value = client
            .get(format!("{}/orders/mine", srv.base_url))
            .bearer_auth(&buyer)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["items"]
            .as_array()
            .is_some_and(|items| items.iter().any(|o| o["id"] == order_id.as_str()))
        {
            found = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(found, "placed order never reached the orders projection");

    // Stock on the listing was decremented by the purchase.
    for _ in 0..50 {
        let listing: serde_json::Value = client
            .get(format!("{}/catalog/{}", srv.base_url, listing_id))
            .bearer_auth(&buyer)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if listing["stock"] == 1 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("stock decrement never reached the catalog projection");
}

#[tokio::test]
async fn messaging_between_tenant_users() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    // Provision the recipient through user admin so the id is real.
    let res = client
        .post(format!("{}/admin/users", srv.base_url))
        .bearer_auth(&admin)
        .json(&json!({
            "email": "seller@example.com",
            "display_name": "Sam Seller",
            "roles": ["seller"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let recipient_id = created["id"].as_str().unwrap().to_string();

    get_eventually(
        &client,
        &format!("{}/admin/users/{}", srv.base_url, recipient_id),
        &admin,
    )
    .await;

    let res = client
        .post(format!("{}/messages", srv.base_url))
        .bearer_auth(&admin)
        .json(&json!({
            "recipient_id": recipient_id,
            "subject": "Welcome",
            "body": "Your seller account is ready.",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // Sender sees it in the sent box once projected.
    let mut seen = false;
    for _ in 0..50 {
        let body: serde_json::Value = client
            .get(format!("{}/messages/sent", srv.base_url))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["items"]
            .as_array()
            .is_some_and(|items| items.iter().any(|m| m["subject"] == "Welcome"))
        {
            seen = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(seen, "sent message never reached the projection");
}

#[tokio::test]
async fn event_inspection_requires_full_admin() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let manager = mint_jwt(jwt_secret, tenant_id, vec![Role::new("manager")]);
    let admin = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    // Raw event payloads include cart streams and message bodies, so the
    // manager's user-directory grant must not open them.
    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/admin/events", srv.base_url))
        .bearer_auth(&manager)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(format!("{}/admin/events", srv.base_url))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn sellers_get_a_sales_scoped_dashboard() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let seller = mint_jwt(jwt_secret, tenant_id, vec![Role::new("seller")]);
    let buyer = mint_jwt(jwt_secret, tenant_id, vec![Role::new("buyer")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/dashboard", srv.base_url))
        .bearer_auth(&seller)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total_orders"], 0);

    let res = client
        .get(format!("{}/dashboard", srv.base_url))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rbac_explain_reports_denials() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let manager = mint_jwt(jwt_secret, tenant_id, vec![Role::new("manager")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!(
            "{}/admin/rbac/explain?permission=admin.users.write",
            srv.base_url
        ))
        .bearer_auth(&manager)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["granted"], false);
    assert_eq!(body["required_permission"], "admin.users.write");
}

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use warehouse_api::app::{self, AppServices, AuthServices};
use warehouse_auth::{Hs256TokenService, JwtClaims, PrincipalId, StaticCredentials};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over an in-memory store, bound to an ephemeral port.
        let auth = AuthServices::new(
            Hs256TokenService::new(JWT_SECRET, ChronoDuration::hours(1)),
            StaticCredentials::new("admin", "s3cret"),
        );
        let app = app::build_app(Arc::new(AppServices::in_memory()), Arc::new(auth));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let res = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(reqwest::Method::POST, path, token, body).await
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(reqwest::Method::PUT, path, token, body).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, issued_at: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = JwtClaims {
        sub: PrincipalId::new("admin"),
        issued_at,
        expires_at: issued_at + ttl,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn token() -> String {
    mint_jwt(JWT_SECRET, Utc::now(), ChronoDuration::minutes(10))
}

async fn create_product(srv: &TestServer, token: &str, sku: &str, quantity: i64) -> i64 {
    let (status, body) = srv
        .post("/api/products", token, json!({ "sku_name": sku, "quantity": quantity }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

async fn create_location(srv: &TestServer, token: &str, code: &str, capacity: i64) -> i64 {
    let (status, body) = srv
        .post(
            "/api/locations",
            token,
            json!({ "code": code, "name": format!("Location {code}"), "capacity": capacity }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

async fn move_stock(
    srv: &TestServer,
    token: &str,
    product_id: i64,
    location_id: i64,
    kind: &str,
    quantity: i64,
) -> (StatusCode, Value) {
    srv.post(
        "/api/stock-movements",
        token,
        json!({
            "product_id": product_id,
            "location_id": location_id,
            "type": kind,
            "quantity": quantity,
        }),
    )
    .await
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/api/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Authorization header required");

    let res = srv
        .client
        .get(srv.url("/api/products"))
        .header("Authorization", "Token abc")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Invalid authorization header format");

    let wrong_secret = mint_jwt("other-secret", Utc::now(), ChronoDuration::minutes(10));
    let (status, body) = srv.get("/api/products", &wrong_secret).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");

    let expired = mint_jwt(
        JWT_SECRET,
        Utc::now() - ChronoDuration::hours(2),
        ChronoDuration::hours(1),
    );
    let (status, body) = srv.get("/api/products", &expired).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn login_issues_a_usable_token() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Invalid credentials");

    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Invalid request body");

    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "username": "admin", "password": "s3cret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Login successful");
    let token = body["data"]["token"].as_str().unwrap().to_string();
    let expires_at = body["data"]["expires_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(expires_at).is_ok());

    let (status, body) = srv.get("/api/whoami", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "admin");
}

#[tokio::test]
async fn product_create_update_and_conflicts() {
    let srv = TestServer::spawn().await;
    let token = token();

    let id = create_product(&srv, &token, "WIDGET-1", 10).await;
    create_product(&srv, &token, "GADGET-1", 3).await;

    let (status, body) = srv
        .post("/api/products", &token, json!({ "sku_name": "WIDGET-1", "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "SKU name already exists");

    let (status, body) = srv
        .post("/api/products", &token, json!({ "sku_name": "NEG", "quantity": -1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = srv
        .post("/api/products", &token, json!({ "sku_name": "MISSING-QTY" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request body: ")
    );

    let (status, body) = srv
        .put(
            &format!("/api/products/{id}"),
            &token,
            json!({ "sku_name": "WIDGET-1B", "quantity": 7 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Product updated successfully");
    assert_eq!(body["data"]["sku_name"], "WIDGET-1B");
    assert_eq!(body["data"]["quantity"], 7);

    let (status, _) = srv
        .put(
            &format!("/api/products/{id}"),
            &token,
            json!({ "sku_name": "GADGET-1", "quantity": 7 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = srv
        .put("/api/products/999", &token, json!({ "sku_name": "X", "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = srv.get("/api/products/abc", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid product ID");

    let (status, body) = srv.get(&format!("/api/products/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);
}

#[tokio::test]
async fn product_listing_paginates_and_searches() {
    let srv = TestServer::spawn().await;
    let token = token();

    for sku in ["bolt-1", "nut-1", "BOLT-2", "washer-1"] {
        create_product(&srv, &token, sku, 1).await;
    }

    let (status, body) = srv.get("/api/products?page=1&limit=2", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Products retrieved successfully");
    let products = body["data"]["products"].as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["sku_name"], "washer-1");
    assert_eq!(body["data"]["pagination"], json!({ "page": 1, "limit": 2, "total": 4 }));

    let (_, body) = srv.get("/api/products?search=bolt", &token).await;
    let skus: Vec<&str> = body["data"]["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["sku_name"].as_str().unwrap())
        .collect();
    assert_eq!(skus, vec!["BOLT-2", "bolt-1"]);

    let (_, body) = srv.get("/api/products?page=0&limit=1000", &token).await;
    assert_eq!(body["data"]["pagination"]["page"], 1);
    assert_eq!(body["data"]["pagination"]["limit"], 100);
}

#[tokio::test]
async fn locations_report_usage() {
    let srv = TestServer::spawn().await;
    let token = token();

    let product = create_product(&srv, &token, "WIDGET-1", 0).await;
    let a = create_location(&srv, &token, "A-01", 100).await;
    let b = create_location(&srv, &token, "B-01", 10).await;

    let (status, body) = srv
        .post(
            "/api/locations",
            &token,
            json!({ "code": "A-01", "name": "dup", "capacity": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "location code already exists");

    let (status, _) = move_stock(&srv, &token, product, a, "IN", 40).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = srv.get("/api/locations", &token).await;
    assert_eq!(status, StatusCode::OK);
    let locations = body["data"].as_array().unwrap();
    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0]["id"], a);
    assert_eq!(locations[0]["current_usage"], 40);
    assert_eq!(locations[0]["available"], 60);
    assert_eq!(locations[1]["id"], b);
    assert_eq!(locations[1]["current_usage"], 0);

    let (status, body) = srv.get(&format!("/api/locations/{a}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available"], 60);

    let (status, _) = srv.get("/api/locations/404", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn movements_enforce_stock_and_capacity() {
    let srv = TestServer::spawn().await;
    let token = token();

    let product = create_product(&srv, &token, "WIDGET-1", 10).await;
    let location = create_location(&srv, &token, "A-01", 50).await;

    let (status, body) = move_stock(&srv, &token, product, location, "IN", 5).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Stock movement created successfully");
    assert_eq!(body["data"]["type"], "IN");
    assert_eq!(body["data"]["quantity"], 5);

    let (_, body) = srv.get(&format!("/api/products/{product}"), &token).await;
    assert_eq!(body["data"]["quantity"], 15);

    let (status, _) = move_stock(&srv, &token, product, location, "OUT", 5).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = srv.get(&format!("/api/products/{product}"), &token).await;
    assert_eq!(body["data"]["quantity"], 10);

    let (status, body) = move_stock(&srv, &token, product, location, "OUT", 11).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let (_, body) = srv.get(&format!("/api/products/{product}"), &token).await;
    assert_eq!(body["data"]["quantity"], 10);

    let (status, _) = move_stock(&srv, &token, product, location, "IN", 51).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = move_stock(&srv, &token, 999, location, "IN", 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = move_stock(&srv, &token, product, 999, "IN", 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = move_stock(&srv, &token, product, location, "SIDEWAYS", 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = move_stock(&srv, &token, product, location, "IN", 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Only the two accepted movements were recorded.
    let (_, body) = srv.get("/api/stock-movements", &token).await;
    assert_eq!(body["data"]["pagination"]["total"], 2);
    let (_, body) = srv.get(&format!("/api/locations/{location}"), &token).await;
    assert_eq!(body["data"]["current_usage"], 0);
}

#[tokio::test]
async fn movement_listing_filters() {
    let srv = TestServer::spawn().await;
    let token = token();

    let widget = create_product(&srv, &token, "WIDGET-1", 0).await;
    let gadget = create_product(&srv, &token, "GADGET-1", 0).await;
    let a = create_location(&srv, &token, "A-01", 100).await;
    let b = create_location(&srv, &token, "B-01", 100).await;

    let today = Utc::now().date_naive();
    move_stock(&srv, &token, widget, a, "IN", 10).await;
    move_stock(&srv, &token, widget, b, "IN", 5).await;
    move_stock(&srv, &token, gadget, a, "IN", 8).await;
    move_stock(&srv, &token, widget, a, "OUT", 4).await;

    let (status, body) = srv.get("/api/stock-movements", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Stock movements retrieved successfully");
    let movements = body["data"]["movements"].as_array().unwrap();
    assert_eq!(movements.len(), 4);
    assert_eq!(movements[0]["type"], "OUT");

    let (_, body) = srv
        .get(&format!("/api/stock-movements?product_id={widget}"), &token)
        .await;
    assert_eq!(body["data"]["pagination"]["total"], 3);

    let (_, body) = srv
        .get(
            &format!("/api/stock-movements?product_id={widget}&location_id={a}&type=IN"),
            &token,
        )
        .await;
    let movements = body["data"]["movements"].as_array().unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["quantity"], 10);

    let (_, body) = srv.get("/api/stock-movements?limit=1&page=2", &token).await;
    assert_eq!(body["data"]["movements"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["data"]["pagination"],
        json!({ "page": 2, "limit": 1, "total": 4 })
    );

    let tomorrow = Utc::now().date_naive() + chrono::Days::new(1);
    let (_, body) = srv
        .get(&format!("/api/stock-movements?start_date={tomorrow}"), &token)
        .await;
    assert_eq!(body["data"]["pagination"]["total"], 0);
    let (_, body) = srv
        .get(&format!("/api/stock-movements?start_date={today}"), &token)
        .await;
    assert_eq!(body["data"]["pagination"]["total"], 4);

    let (status, _) = srv.get("/api/stock-movements?type=sideways", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = srv.get("/api/stock-movements?start_date=soon", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reported_created_at_round_trips_through_date_filters() {
    let srv = TestServer::spawn().await;
    let token = token();

    let product = create_product(&srv, &token, "WIDGET-1", 0).await;
    let location = create_location(&srv, &token, "A-01", 100).await;
    let (status, body) = move_stock(&srv, &token, product, location, "IN", 3).await;
    assert_eq!(status, StatusCode::CREATED);
    let created_at = body["data"]["created_at"].as_str().unwrap().to_string();
    let id = body["data"]["id"].clone();

    let res = srv
        .client
        .get(srv.url("/api/stock-movements"))
        .bearer_auth(&token)
        .query(&[("start_date", created_at.as_str()), ("end_date", created_at.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["pagination"]["total"], 1, "created_at={created_at}");
    assert_eq!(body["data"]["movements"][0]["id"], id);
}

use rental_admin::config::DEFAULT_BODY_LIMIT_BYTES;
use rental_admin::{build_app, builtin_config, resolve, AppState, RolePolicy, Session};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over the in-memory store, bound to an ephemeral port.
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let policy = Arc::new(RolePolicy::builtin().unwrap());
        let app = build_app(AppState::in_memory(model, policy), DEFAULT_BODY_LIMIT_BYTES);
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

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn as_role(req: reqwest::RequestBuilder, role: &str) -> reqwest::RequestBuilder {
    let session = Session::new("user-1", "tenant-1", &[role]);
    session
        .to_headers()
        .into_iter()
        .fold(req, |req, (name, value)| req.header(name, value))
}

async fn create(client: &reqwest::Client, srv: &TestServer, resource: &str, body: Value) -> Value {
    let res = as_role(client.post(srv.url(resource)), "admin")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED, "creating {}", resource);
    res.json().await.unwrap()
}

struct Fixture {
    outlet: Value,
    tool: Value,
    user: Value,
    rental: Value,
}

async fn fixture(client: &reqwest::Client, srv: &TestServer) -> Fixture {
    let outlet = create(client, srv, "outlets", json!({ "name": "North" })).await;
    let tool = create(client, srv, "tools", json!({ "name": "Drill", "outlet_id": outlet["id"] })).await;
    let user = create(
        client,
        srv,
        "users",
        json!({ "email": "ana@example.com", "first_name": "Ana", "roq_user_id": "roq-1" }),
    )
    .await;
    let rental = create(
        client,
        srv,
        "rentals",
        json!({
            "rental_date": "2024-03-01T00:00:00+00:00",
            "return_date": "2024-03-05T00:00:00+00:00",
            "tool_id": tool["id"],
            "user_id": user["id"],
            "outlet_id": outlet["id"]
        }),
    )
    .await;
    Fixture {
        outlet,
        tool,
        user,
        rental,
    }
}

fn rental_path(f: &Fixture) -> String {
    format!("rentals/{}", f.rental["id"].as_str().unwrap())
}

#[tokio::test]
async fn unsupported_methods_are_405_before_anything_else() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let id = uuid::Uuid::new_v4();

    for (method, path) in [
        (reqwest::Method::PATCH, format!("rentals/{}", id)),
        (reqwest::Method::POST, format!("rentals/{}", id)),
        (reqwest::Method::OPTIONS, format!("rentals/{}", id)),
        (reqwest::Method::PATCH, "no-such-resource/not-an-id".to_string()),
        (reqwest::Method::DELETE, "rentals".to_string()),
    ] {
        // No session headers: the method check comes first.
        let res = client.request(method.clone(), srv.url(&path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, path);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({ "message": format!("Method {} not allowed", method) }));
    }
}

#[tokio::test]
async fn session_is_required() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url(&format!("rentals/{}", uuid::Uuid::new_v4())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn policy_decides_access() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;

    let res = as_role(client.get(srv.url(&rental_path(&f))), "customer")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = as_role(client.put(srv.url(&rental_path(&f))), "customer")
        .json(&json!({ "rental_date": "2024-03-02", "return_date": "2024-03-06" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "forbidden");

    // Staff may update rentals but not delete them.
    let res = as_role(client.delete(srv.url(&rental_path(&f))), "staff")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // No grants at all for an unknown role.
    let res = as_role(client.get(srv.url(&rental_path(&f))), "visitor")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn get_returns_the_record_verbatim() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;

    let res = as_role(client.get(srv.url(&rental_path(&f))), "staff")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, f.rental);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn successful_update_merges_posted_fields() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;
    let other_tool = create(&client, &srv, "tools", json!({ "name": "Saw" })).await;

    let posted = json!({
        "rental_date": "2024-04-01T10:00:00+00:00",
        "return_date": "2024-04-03T10:00:00+00:00",
        "tool_id": other_tool["id"],
        "user_id": f.user["id"],
        "outlet_id": f.outlet["id"]
    });
    let res = as_role(client.put(srv.url(&rental_path(&f))), "staff")
        .json(&posted)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();

    for (k, v) in posted.as_object().unwrap() {
        assert_eq!(&updated[k], v, "field {}", k);
    }
    assert_eq!(updated["id"], f.rental["id"]);
    assert_eq!(updated["created_at"], f.rental["created_at"]);

    let res = as_role(client.get(srv.url(&rental_path(&f))), "staff")
        .send()
        .await
        .unwrap();
    let stored: Value = res.json().await.unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn user_update_returns_every_posted_field() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;
    let user_path = format!("users/{}", f.user["id"].as_str().unwrap());

    let posted = json!({ "email": "a@b.io", "roq_user_id": "roq-42" });
    let res = as_role(client.put(srv.url(&user_path)), "admin")
        .json(&posted)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["email"], "a@b.io");
    assert_eq!(updated["roq_user_id"], "roq-42");
    assert_eq!(updated["first_name"], "Ana");

    let res = as_role(client.get(srv.url(&user_path)), "admin").send().await.unwrap();
    let stored: Value = res.json().await.unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn update_ignores_primary_key_and_timestamps() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;

    let res = as_role(client.put(srv.url(&rental_path(&f))), "staff")
        .json(&json!({
            "id": uuid::Uuid::new_v4(),
            "created_at": "2000-01-01T00:00:00+00:00",
            "rental_date": "2024-03-01T00:00:00+00:00",
            "return_date": "2024-03-09T00:00:00+00:00"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["id"], f.rental["id"]);
    assert_eq!(updated["created_at"], f.rental["created_at"]);
    assert_eq!(updated["return_date"], "2024-03-09T00:00:00+00:00");
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;

    let res = as_role(client.delete(srv.url(&rental_path(&f))), "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let deleted: Value = res.json().await.unwrap();
    assert_eq!(deleted, f.rental);

    let res = as_role(client.get(srv.url(&rental_path(&f))), "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    let res = as_role(client.delete(srv.url(&rental_path(&f))), "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_payload_is_rejected_before_mutation() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;

    let res = as_role(client.put(srv.url(&rental_path(&f))), "staff")
        .json(&json!({ "rental_date": "next tuesday", "tool_id": "abc", "colour": "red" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "validation_error");
    let details = &body["error"]["details"];
    assert_eq!(details["rental_date"], "rental_date must be a valid date");
    assert_eq!(details["return_date"], "return_date is required");
    assert_eq!(details["tool_id"], "tool_id must be a valid UUID");
    assert_eq!(details["colour"], "colour is not a field of rental");

    let res = as_role(client.put(srv.url(&rental_path(&f))), "staff")
        .header("content-type", "application/json")
        .body("[1, 2]")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = as_role(client.get(srv.url(&rental_path(&f))), "staff")
        .send()
        .await
        .unwrap();
    let stored: Value = res.json().await.unwrap();
    assert_eq!(stored, f.rental);
}

#[tokio::test]
async fn foreign_keys_are_enforced() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;

    let res = as_role(client.put(srv.url(&rental_path(&f))), "staff")
        .json(&json!({
            "rental_date": "2024-03-01T00:00:00+00:00",
            "return_date": "2024-03-05T00:00:00+00:00",
            "tool_id": uuid::Uuid::new_v4()
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let tool_path = format!("tools/{}", f.tool["id"].as_str().unwrap());
    let res = as_role(client.delete(srv.url(&tool_path)), "admin").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn ids_and_resources_are_checked() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = as_role(client.get(srv.url("rentals/42")), "admin").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = as_role(client.get(srv.url(&format!("bikes/{}", uuid::Uuid::new_v4()))), "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = as_role(client.get(srv.url(&format!("rentals/{}", uuid::Uuid::new_v4()))), "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn includes_embed_related_records() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;

    let res = as_role(
        client.get(srv.url(&format!("{}?include=tool,user", rental_path(&f)))),
        "staff",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tool"]["name"], "Drill");
    assert_eq!(body["user"]["email"], "ana@example.com");
    assert_eq!(body["user"]["roq_user_id"], "roq-1");
    assert!(body.get("outlet").is_none());

    let res = as_role(client.get(srv.url(&format!("{}?include=owner", rental_path(&f)))), "staff")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lookup_lists_filter_and_page() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let f = fixture(&client, &srv).await;
    create(&client, &srv, "tools", json!({ "name": "Saw" })).await;

    let res = as_role(client.get(srv.url("tools")), "customer").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["count"], 2);

    let outlet_id = f.outlet["id"].as_str().unwrap();
    let res = as_role(client.get(srv.url(&format!("tools?outlet_id={}", outlet_id))), "customer")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["name"], "Drill");

    let res = as_role(client.get(srv.url("tools?limit=1&offset=1")), "customer")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["count"], 1);

    let res = as_role(client.get(srv.url("users")), "staff").send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"][0]["email"], "ana@example.com");
    assert_eq!(body["data"][0]["roq_user_id"], "roq-1");

    // Customers have no grant on users.
    let res = as_role(client.get(srv.url("users")), "customer").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_validates_required_fields() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = as_role(client.post(srv.url("users")), "admin")
        .json(&json!({ "email": "not-an-email" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = as_role(client.post(srv.url("outlets")), "staff")
        .json(&json!({ "name": "South" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn health_ready_and_version() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let res = client.get(format!("{}/ready", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["store"], "ok");

    let res = client.get(format!("{}/version", srv.base_url)).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "rental-admin");
}

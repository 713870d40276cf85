use civicwatch_server::uploads::ImageStore;
use civicwatch_server::{auth, build_router, AppState, ServerConfig};
use civicwatch_store::Store;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-pass-123";

struct TestServer {
    base: String,
    uploads_dir: PathBuf,
    _tmp: TempDir,
}

async fn spawn_server() -> TestServer {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        database_path: tmp.path().join("civicwatch.sqlite"),
        uploads_dir: tmp.path().join("uploads"),
        jwt_secret: "integration-test-secret".to_string(),
        ..ServerConfig::default()
    };

    let store = Arc::new(Store::open(&config.database_path).expect("open store"));
    let password_hash = auth::hash_password(ADMIN_PASSWORD).expect("hash admin password");
    store
        .ensure_admin_user("Admin", ADMIN_EMAIL, &password_hash)
        .await
        .expect("seed admin");
    let images = Arc::new(ImageStore::new(config.uploads_dir.clone()).expect("image store"));

    let uploads_dir = config.uploads_dir.clone();
    let state = AppState::new(store, images, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve app");
    });

    TestServer {
        base: format!("http://{addr}"),
        uploads_dir,
        _tmp: tmp,
    }
}

async fn register(client: &reqwest::Client, base: &str, name: &str, email: &str) -> String {
    let resp = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({
            "name": name,
            "email": email,
            "password": "secret-pass",
            "phone": "9999999999"
        }))
        .send()
        .await
        .expect("register request");
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("register body");
    assert_eq!(body["success"], json!(true));
    body["data"]["token"].as_str().expect("token").to_string()
}

async fn login(client: &reqwest::Client, base: &str, email: &str, password: &str) -> String {
    let resp = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .expect("login request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("login body");
    body["data"]["token"].as_str().expect("token").to_string()
}

fn issue_form(title: &str, lon: f64, lat: f64) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("title", title.to_string())
        .text("description", "spotted on the morning commute")
        .text("category", "Pothole")
        .text("coordinates", format!("[{lon}, {lat}]"))
        .text("address", "MG Road")
        .part(
            "image",
            reqwest::multipart::Part::bytes(b"fake jpeg bytes".to_vec())
                .file_name("pothole.jpg"),
        )
}

async fn create_issue(
    client: &reqwest::Client,
    base: &str,
    token: &str,
    title: &str,
    lon: f64,
    lat: f64,
) -> Value {
    let resp = client
        .post(format!("{base}/api/issues"))
        .bearer_auth(token)
        .multipart(issue_form(title, lon, lat))
        .send()
        .await
        .expect("create request");
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("create body");
    assert_eq!(body["success"], json!(true));
    body["data"].clone()
}

#[tokio::test]
async fn register_login_me_round_trip() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let token = register(&client, &server.base, "Asha", "asha@example.com").await;

    let me: Value = client
        .get(format!("{}/api/auth/me", server.base))
        .bearer_auth(&token)
        .send()
        .await
        .expect("me request")
        .json()
        .await
        .expect("me body");
    assert_eq!(me["success"], json!(true));
    assert_eq!(me["data"]["email"], json!("asha@example.com"));
    assert_eq!(me["data"]["role"], json!("citizen"));
    assert!(me["data"].get("password_hash").is_none());

    let relogin = login(&client, &server.base, "asha@example.com", "secret-pass").await;
    assert!(!relogin.is_empty());

    // Bad credentials and missing tokens are both 401 with the envelope.
    let resp = client
        .post(format!("{}/api/auth/login", server.base))
        .json(&json!({"email": "asha@example.com", "password": "wrong"}))
        .send()
        .await
        .expect("bad login");
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.expect("body");
    assert_eq!(body["success"], json!(false));

    let resp = client
        .get(format!("{}/api/auth/me", server.base))
        .send()
        .await
        .expect("me without token");
    assert_eq!(resp.status(), 401);

    // Duplicate registration is rejected up front.
    let resp = client
        .post(format!("{}/api/auth/register", server.base))
        .json(&json!({
            "name": "Asha Again",
            "email": "asha@example.com",
            "password": "secret-pass",
            "phone": ""
        }))
        .send()
        .await
        .expect("duplicate register");
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn issue_creation_defaults_and_image_serving() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let token = register(&client, &server.base, "Asha", "asha@example.com").await;

    let issue = create_issue(&client, &server.base, &token, "Open pothole", 77.5946, 12.9716).await;
    assert_eq!(issue["status"], json!("Pending"));
    assert_eq!(issue["priority"], json!("Medium"));
    assert_eq!(issue["category"], json!("Pothole"));
    assert_eq!(issue["location"]["type"], json!("Point"));
    assert_eq!(issue["location"]["coordinates"], json!([77.5946, 12.9716]));
    assert!(issue.get("resolvedAt").is_none());

    // The stored image is served back under the public uploads path.
    let image = issue["image"].as_str().expect("image name");
    let resp = client
        .get(format!("{}/uploads/{image}", server.base))
        .send()
        .await
        .expect("fetch image");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.expect("image bytes").as_ref(), b"fake jpeg bytes");

    // Detail view embeds the reporter profile.
    let id = issue["id"].as_str().expect("id");
    let detail: Value = client
        .get(format!("{}/api/issues/{id}", server.base))
        .bearer_auth(&token)
        .send()
        .await
        .expect("detail request")
        .json()
        .await
        .expect("detail body");
    assert_eq!(detail["data"]["reportedBy"]["email"], json!("asha@example.com"));

    // Rejected multipart: missing image part.
    let resp = client
        .post(format!("{}/api/issues", server.base))
        .bearer_auth(&token)
        .multipart(
            reqwest::multipart::Form::new()
                .text("title", "no image")
                .text("description", "d")
                .text("category", "Pothole")
                .text("coordinates", "[77.6, 12.97]")
                .text("address", "MG Road"),
        )
        .send()
        .await
        .expect("create without image");
    assert_eq!(resp.status(), 400);

    // Rejected multipart: malformed coordinates.
    let resp = client
        .post(format!("{}/api/issues", server.base))
        .bearer_auth(&token)
        .multipart(
            reqwest::multipart::Form::new()
                .text("title", "bad coords")
                .text("description", "d")
                .text("category", "Pothole")
                .text("coordinates", "77.6, 12.97")
                .text("address", "MG Road")
                .part(
                    "image",
                    reqwest::multipart::Part::bytes(b"x".to_vec()).file_name("a.jpg"),
                ),
        )
        .send()
        .await
        .expect("create with bad coords");
    assert_eq!(resp.status(), 400);
    // The rejected upload must not leave an orphaned image behind.
    let leftovers = std::fs::read_dir(&server.uploads_dir)
        .expect("read uploads dir")
        .count();
    assert_eq!(leftovers, 1, "only the first issue's image should remain");
}

#[tokio::test]
async fn ownership_rules_for_detail_and_delete() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let token_a = register(&client, &server.base, "Asha", "a@example.com").await;
    let token_b = register(&client, &server.base, "Bela", "b@example.com").await;
    let admin = login(&client, &server.base, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let issue = create_issue(&client, &server.base, &token_a, "Open pothole", 77.6, 12.97).await;
    let id = issue["id"].as_str().expect("id");
    let image = issue["image"].as_str().expect("image").to_string();

    // Another citizen can neither view nor delete it.
    let resp = client
        .get(format!("{}/api/issues/{id}", server.base))
        .bearer_auth(&token_b)
        .send()
        .await
        .expect("foreign detail");
    assert_eq!(resp.status(), 403);
    let resp = client
        .delete(format!("{}/api/issues/{id}", server.base))
        .bearer_auth(&token_b)
        .send()
        .await
        .expect("foreign delete");
    assert_eq!(resp.status(), 403);

    // The admin can delete it; record and image both go away.
    let resp = client
        .delete(format!("{}/api/issues/{id}", server.base))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("admin delete");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("delete body");
    assert_eq!(body["success"], json!(true));

    let resp = client
        .get(format!("{}/api/issues/{id}", server.base))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("detail after delete");
    assert_eq!(resp.status(), 404);
    assert!(!server.uploads_dir.join(&image).exists());

    // Unknown ids are not-found for any role.
    let resp = client
        .get(format!("{}/api/issues/{}", server.base, uuid::Uuid::new_v4()))
        .bearer_auth(&token_a)
        .send()
        .await
        .expect("missing detail");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn admin_status_updates_latch_resolved_at() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let citizen = register(&client, &server.base, "Asha", "a@example.com").await;
    let admin = login(&client, &server.base, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let issue = create_issue(&client, &server.base, &citizen, "Dark street", 77.6, 12.97).await;
    let id = issue["id"].as_str().expect("id");
    let status_url = format!("{}/api/issues/{id}/status", server.base);

    // Citizens cannot touch the status endpoint on an existing issue.
    let resp = client
        .put(&status_url)
        .bearer_auth(&citizen)
        .json(&json!({"status": "Resolved"}))
        .send()
        .await
        .expect("citizen update");
    assert_eq!(resp.status(), 403);

    // A missing issue reports not-found before any authorization verdict.
    let resp = client
        .put(format!(
            "{}/api/issues/{}/status",
            server.base,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(&citizen)
        .json(&json!({"status": "Resolved"}))
        .send()
        .await
        .expect("citizen update on missing issue");
    assert_eq!(resp.status(), 404);

    let resolved: Value = client
        .put(&status_url)
        .bearer_auth(&admin)
        .json(&json!({"status": "Resolved", "adminNotes": "patched"}))
        .send()
        .await
        .expect("resolve")
        .json()
        .await
        .expect("resolve body");
    assert_eq!(resolved["data"]["status"], json!("Resolved"));
    assert_eq!(resolved["data"]["adminNotes"], json!("patched"));
    let first_resolved_at = resolved["data"]["resolvedAt"].clone();
    assert!(first_resolved_at.is_string());

    // Reopen, resolve again: the original resolution time survives.
    client
        .put(&status_url)
        .bearer_auth(&admin)
        .json(&json!({"status": "Pending"}))
        .send()
        .await
        .expect("reopen");
    let re_resolved: Value = client
        .put(&status_url)
        .bearer_auth(&admin)
        .json(&json!({"status": "Resolved"}))
        .send()
        .await
        .expect("re-resolve")
        .json()
        .await
        .expect("re-resolve body");
    assert_eq!(re_resolved["data"]["resolvedAt"], first_resolved_at);

    // Unknown status labels are validation failures.
    let resp = client
        .put(&status_url)
        .bearer_auth(&admin)
        .json(&json!({"status": "Fixed"}))
        .send()
        .await
        .expect("bad status");
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn stats_are_admin_only_and_dense_by_status() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let citizen = register(&client, &server.base, "Asha", "a@example.com").await;
    let admin = login(&client, &server.base, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let mut ids = Vec::new();
    for n in 0..5 {
        let issue =
            create_issue(&client, &server.base, &citizen, &format!("issue {n}"), 77.6, 12.97).await;
        ids.push(issue["id"].as_str().expect("id").to_string());
    }
    for id in ids.iter().take(2) {
        client
            .put(format!("{}/api/issues/{id}/status", server.base))
            .bearer_auth(&admin)
            .json(&json!({"status": "Resolved"}))
            .send()
            .await
            .expect("resolve");
    }

    let resp = client
        .get(format!("{}/api/issues/admin/stats", server.base))
        .bearer_auth(&citizen)
        .send()
        .await
        .expect("citizen stats");
    assert_eq!(resp.status(), 403);

    let stats: Value = client
        .get(format!("{}/api/issues/admin/stats", server.base))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("admin stats")
        .json()
        .await
        .expect("stats body");
    assert_eq!(stats["data"]["total"], json!(5));
    assert_eq!(stats["data"]["byStatus"]["pending"], json!(3));
    assert_eq!(stats["data"]["byStatus"]["resolved"], json!(2));
    assert_eq!(stats["data"]["byStatus"]["verified"], json!(0));
    assert_eq!(stats["data"]["byStatus"]["inProgress"], json!(0));
    assert_eq!(stats["data"]["byStatus"]["rejected"], json!(0));
    assert_eq!(stats["data"]["byCategory"]["Pothole"], json!(5));
    assert!(stats["data"]["byCategory"].get("Road Damage").is_none());
}

#[tokio::test]
async fn nearby_search_is_cross_user_and_nearest_first() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let token_a = register(&client, &server.base, "Asha", "a@example.com").await;
    let token_b = register(&client, &server.base, "Bela", "b@example.com").await;

    // ~1.1 km, ~2.2 km, and ~11 km east of the query point.
    create_issue(&client, &server.base, &token_a, "near", 77.6046, 12.9716).await;
    create_issue(&client, &server.base, &token_b, "mid", 77.6146, 12.9716).await;
    create_issue(&client, &server.base, &token_a, "far", 77.6946, 12.9716).await;

    let nearby: Value = client
        .get(format!(
            "{}/api/issues/nearby/77.5946/12.9716/5",
            server.base
        ))
        .bearer_auth(&token_b)
        .send()
        .await
        .expect("nearby request")
        .json()
        .await
        .expect("nearby body");
    assert_eq!(nearby["success"], json!(true));
    assert_eq!(nearby["count"], json!(2));
    assert_eq!(nearby["data"][0]["title"], json!("near"));
    assert_eq!(nearby["data"][1]["title"], json!("mid"));

    let resp = client
        .get(format!("{}/api/issues/nearby/east/12.9716/5", server.base))
        .bearer_auth(&token_a)
        .send()
        .await
        .expect("bad longitude");
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!(
            "{}/api/issues/nearby/77.5946/12.9716/5",
            server.base
        ))
        .send()
        .await
        .expect("unauthenticated nearby");
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn listing_is_scoped_paginated_and_strict_about_paging_input() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let token_a = register(&client, &server.base, "Asha", "a@example.com").await;
    let token_b = register(&client, &server.base, "Bela", "b@example.com").await;
    let admin = login(&client, &server.base, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    for n in 0..3 {
        create_issue(&client, &server.base, &token_a, &format!("a{n}"), 77.6, 12.97).await;
    }
    create_issue(&client, &server.base, &token_b, "b0", 77.61, 12.97).await;

    // A citizen only ever sees their own issues.
    let mine: Value = client
        .get(format!("{}/api/issues", server.base))
        .bearer_auth(&token_a)
        .send()
        .await
        .expect("own list")
        .json()
        .await
        .expect("own list body");
    assert_eq!(mine["total"], json!(3));
    for item in mine["data"].as_array().expect("items") {
        assert_eq!(item["reportedBy"]["email"], json!("a@example.com"));
    }

    // Admin sees everything, newest first, paginated.
    let page: Value = client
        .get(format!("{}/api/issues?page=1&limit=2", server.base))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("admin list")
        .json()
        .await
        .expect("admin list body");
    assert_eq!(page["total"], json!(4));
    assert_eq!(page["totalPages"], json!(2));
    assert_eq!(page["currentPage"], json!(1));
    assert_eq!(page["count"], json!(2));
    assert_eq!(page["data"][0]["title"], json!("b0"));

    // Status filtering still applies within the scope.
    let filtered: Value = client
        .get(format!("{}/api/issues?status=Resolved", server.base))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("filtered list")
        .json()
        .await
        .expect("filtered body");
    assert_eq!(filtered["total"], json!(0));
    assert_eq!(filtered["data"], json!([]));

    let resp = client
        .get(format!("{}/api/issues?limit=abc", server.base))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("bad limit");
    assert_eq!(resp.status(), 400);
    let resp = client
        .get(format!("{}/api/issues?page=zero", server.base))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("bad page");
    assert_eq!(resp.status(), 400);
}

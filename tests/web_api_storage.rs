//! Web API Storage Tests
//!
//! Integration tests for upload, retrieval, delete and directory endpoints.

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use dspace::storage::{ChunkStore, MemoryPlatform, RetryPolicy};
use dspace::web::handlers::AppState;
use dspace::web::middleware::USER_HEADER;
use dspace::web::{create_health_router, create_router};
use dspace::{Database, UserRepository};
use serde_json::{json, Value};

/// Chunk size small enough that test files span several chunks.
const TEST_CHUNK_SIZE: usize = 4;

struct TestContext {
    server: TestServer,
    platform: Arc<MemoryPlatform>,
}

/// Create a test server with an in-memory database and storage platform.
async fn create_test_server() -> TestContext {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let users = UserRepository::new(db.pool());
    users.ensure("testuser").await.expect("Failed to create user");
    users.ensure("alice").await.expect("Failed to create user");

    let platform = Arc::new(MemoryPlatform::new(3));
    let store = ChunkStore::connect(
        platform.clone(),
        &RetryPolicy::fixed(Duration::from_millis(1)),
        RetryPolicy::fixed(Duration::from_millis(1)),
        TEST_CHUNK_SIZE,
    )
    .await
    .expect("Failed to connect chunk store");

    let app_state = Arc::new(AppState::new(
        Arc::new(db),
        Arc::new(store),
        "testuser",
        16 * 1024 * 1024,
    ));

    let router = create_router(app_state, &[]).merge(create_health_router());
    let server = TestServer::new(router).expect("Failed to create test server");

    TestContext { server, platform }
}

fn user_header() -> HeaderName {
    HeaderName::from_static(USER_HEADER)
}

fn docs_structure() -> Value {
    json!({
        "name": "docs",
        "type": "directory",
        "path": "root/docs",
        "children": [
            {"name": "a.txt", "type": "file", "path": "root/docs/a.txt"},
            {
                "name": "sub",
                "type": "directory",
                "path": "root/docs/sub",
                "children": [
                    {"name": "b.txt", "type": "file", "path": "root/docs/sub/b.txt"}
                ]
            }
        ]
    })
}

fn file_part(content: &[u8], name: &str) -> Part {
    Part::bytes(content.to_vec())
        .file_name(name)
        .mime_type("application/octet-stream")
}

fn docs_form() -> MultipartForm {
    MultipartForm::new()
        .add_text("directoryStructure", docs_structure().to_string())
        .add_part("files", file_part(b"the quick brown fox", "a.txt"))
        .add_part("files", file_part(b"jumps over", "b.txt"))
}

/// Find the id of the first node named `name` in a JSON tree.
fn find_id(node: &Value, name: &str) -> Option<String> {
    if node["name"] == name {
        return node["id"].as_str().map(str::to_string);
    }
    node["children"]
        .as_array()?
        .iter()
        .find_map(|child| find_id(child, name))
}

async fn upload_docs(ctx: &TestContext) -> Value {
    let response = ctx.server.post("/upload").multipart(docs_form()).await;
    response.assert_status_ok();
    response.json::<Value>()
}

#[tokio::test]
async fn test_service_info() {
    let ctx = create_test_server().await;

    let response = ctx.server.get("/").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["name"], "dspace");
    let paths: Vec<&str> = body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"/upload"));
    assert!(paths.contains(&"/retrieve/{id}"));
}

#[tokio::test]
async fn test_health() {
    let ctx = create_test_server().await;
    let response = ctx.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_directory_starts_empty() {
    let ctx = create_test_server().await;

    let response = ctx.server.get("/directory").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "root");
    assert_eq!(body["data"]["type"], "directory");
    assert!(body["data"]["id"].is_string());
    assert_eq!(body["data"]["children"], json!([]));
}

#[tokio::test]
async fn test_upload_files() {
    let ctx = create_test_server().await;

    let body = upload_docs(&ctx).await;
    let data = &body["data"];

    assert_eq!(data["files"], 2);
    // 19 bytes and 10 bytes in 4-byte chunks
    assert_eq!(data["chunks"], 5 + 3);
    assert!(data["upload_time_ms"].is_u64());
    assert_eq!(ctx.platform.send_count(), 8);

    let docs = &data["directory"]["children"][0];
    assert_eq!(docs["name"], "docs");
    assert!(docs["id"].is_string());
    let a = &docs["children"][0];
    assert_eq!(a["name"], "a.txt");
    assert_eq!(a["links"].as_array().unwrap().len(), 5);
    assert!(a["links"][0]
        .as_str()
        .unwrap()
        .starts_with("https://discord.com/channels/"));

    // The stored tree matches the one returned by the upload.
    let listing: Value = ctx.server.get("/directory").await.json();
    assert_eq!(listing["data"], data["directory"]);
}

#[tokio::test]
async fn test_retrieve_file() {
    let ctx = create_test_server().await;
    let body = upload_docs(&ctx).await;
    let id = find_id(&body["data"]["directory"], "a.txt").unwrap();

    let response = ctx.server.get(&format!("/retrieve/{}", id)).await;
    response.assert_status_ok();

    assert_eq!(response.as_bytes().as_ref(), b"the quick brown fox");
    assert_eq!(response.header("content-type"), "text/plain");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"a.txt\""
    );
    assert_eq!(response.header("x-content-type-options"), "nosniff");
}

#[tokio::test]
async fn test_retrieve_directory_as_zip() {
    let ctx = create_test_server().await;
    let body = upload_docs(&ctx).await;
    let id = find_id(&body["data"]["directory"], "docs").unwrap();

    let response = ctx.server.get(&format!("/retrieve/{}", id)).await;
    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "application/zip");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"docs.zip\""
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, ["a.txt", "sub/b.txt"]);

    let mut content = String::new();
    archive
        .by_name("a.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "the quick brown fox");
}

#[tokio::test]
async fn test_retrieve_unknown_id() {
    let ctx = create_test_server().await;

    let response = ctx.server.get("/retrieve/no-such-id").await;
    assert_eq!(response.status_code(), 404);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_upload_name_mismatch_sends_nothing() {
    let ctx = create_test_server().await;

    let form = MultipartForm::new()
        .add_text("directoryStructure", docs_structure().to_string())
        .add_part("files", file_part(b"the quick brown fox", "a.txt"))
        .add_part("files", file_part(b"jumps over", "B.txt"));

    let response = ctx.server.post("/upload").multipart(form).await;
    assert_eq!(response.status_code(), 422);
    assert_eq!(response.json::<Value>()["error"]["code"], "UNPROCESSABLE_ENTITY");
    assert_eq!(ctx.platform.send_count(), 0);

    let listing: Value = ctx.server.get("/directory").await.json();
    assert_eq!(listing["data"]["children"], json!([]));
}

#[tokio::test]
async fn test_upload_without_structure() {
    let ctx = create_test_server().await;

    let form = MultipartForm::new().add_part("files", file_part(b"data", "a.txt"));
    let response = ctx.server.post("/upload").multipart(form).await;
    assert_eq!(response.status_code(), 422);

    let form = MultipartForm::new()
        .add_text("directoryStructure", "{not json")
        .add_part("files", file_part(b"data", "a.txt"));
    let response = ctx.server.post("/upload").multipart(form).await;
    assert_eq!(response.status_code(), 422);

    assert_eq!(ctx.platform.send_count(), 0);
}

#[tokio::test]
async fn test_reupload_replaces_file() {
    let ctx = create_test_server().await;
    upload_docs(&ctx).await;

    let structure = json!({"name": "a.txt", "type": "file", "path": "root/docs/a.txt"});
    let form = MultipartForm::new()
        .add_text("directoryStructure", structure.to_string())
        .add_part("files", file_part(b"new", "a.txt"));
    let body: Value = ctx.server.post("/upload").multipart(form).await.json();

    let docs = &body["data"]["directory"]["children"][0];
    assert_eq!(docs["children"].as_array().unwrap().len(), 2);

    let id = find_id(&body["data"]["directory"], "a.txt").unwrap();
    let response = ctx.server.get(&format!("/retrieve/{}", id)).await;
    assert_eq!(response.as_bytes().as_ref(), b"new");
}

#[tokio::test]
async fn test_delete_file_and_directory() {
    let ctx = create_test_server().await;
    let body = upload_docs(&ctx).await;
    let tree = &body["data"]["directory"];
    let b_id = find_id(tree, "b.txt").unwrap();
    let docs_id = find_id(tree, "docs").unwrap();

    let response = ctx.server.delete(&format!("/delete/{}", b_id)).await;
    response.assert_status_ok();
    let deleted: Value = response.json();
    assert_eq!(deleted["data"]["deleted"], true);
    assert!(find_id(&deleted["data"]["directory"], "b.txt").is_none());
    assert!(find_id(&deleted["data"]["directory"], "sub").is_some());

    let response = ctx.server.get(&format!("/retrieve/{}", b_id)).await;
    assert_eq!(response.status_code(), 404);

    let response = ctx.server.delete(&format!("/delete/{}", docs_id)).await;
    response.assert_status_ok();

    let listing: Value = ctx.server.get("/directory").await.json();
    assert_eq!(listing["data"]["children"], json!([]));
}

#[tokio::test]
async fn test_delete_unknown_is_noop() {
    let ctx = create_test_server().await;
    upload_docs(&ctx).await;
    let before: Value = ctx.server.get("/directory").await.json();

    let response = ctx.server.delete("/delete/no-such-id").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["deleted"], false);

    let after: Value = ctx.server.get("/directory").await.json();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_delete_root_rejected() {
    let ctx = create_test_server().await;
    let listing: Value = ctx.server.get("/directory").await.json();
    let root_id = listing["data"]["id"].as_str().unwrap();

    let response = ctx.server.delete(&format!("/delete/{}", root_id)).await;
    assert_eq!(response.status_code(), 422);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let ctx = create_test_server().await;
    let body = upload_docs(&ctx).await;
    let id = find_id(&body["data"]["directory"], "a.txt").unwrap();

    let listing: Value = ctx
        .server
        .get("/directory")
        .add_header(user_header(), "alice")
        .await
        .json();
    assert_eq!(listing["data"]["children"], json!([]));

    let response = ctx
        .server
        .get(&format!("/retrieve/{}", id))
        .add_header(user_header(), "alice")
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_unknown_user() {
    let ctx = create_test_server().await;

    let response = ctx
        .server
        .get("/directory")
        .add_header(user_header(), "nobody")
        .await;
    assert_eq!(response.status_code(), 404);

    let response = ctx
        .server
        .post("/upload")
        .add_header(user_header(), "nobody")
        .multipart(docs_form())
        .await;
    assert_eq!(response.status_code(), 404);
    assert_eq!(ctx.platform.send_count(), 0);
}

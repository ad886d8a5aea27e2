//! In-process API tests against the full router with in-memory stores

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use elibrary_server::{
    api,
    config::{AppConfig, UploadConfig},
    models::user::UserClaims,
    services::Services,
    AppState,
};

const BOUNDARY: &str = "elibrary-test-boundary";

struct TestApp {
    router: Router,
    token: String,
    upload_dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_prefix("/images")
    }

    fn with_prefix(public_prefix: &str) -> Self {
        let upload_dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.upload = UploadConfig {
            path: upload_dir.path().to_string_lossy().into_owned(),
            public_prefix: public_prefix.to_string(),
            ..UploadConfig::default()
        };

        let services = Services::in_memory(config.auth.clone(), &config.upload);
        let now = Utc::now().timestamp();
        let token = UserClaims {
            sub: "librarian".to_string(),
            user_id: 1,
            exp: now + 3600,
            iat: now,
        }
        .create_token(&config.auth.jwt_secret)
        .unwrap();

        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        };

        Self {
            router: api::router(state),
            token,
            upload_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn form(&self, method: Method, uri: &str, form: Form) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(form.finish()))
            .unwrap();
        self.send(request).await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::delete(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    fn stored_covers(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}

/// Minimal multipart/form-data body builder
#[derive(Default)]
struct Form {
    body: Vec<u8>,
}

impl Form {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

fn dune() -> Form {
    Form::default()
        .text("title", "Dune")
        .text("isbn", "111")
        .text("year", "1965")
        .text("publisher", "Chilton")
        .text("author", "Frank Herbert")
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_then_duplicate_isbn() {
    let app = TestApp::new();

    let (status, body) = app.form(Method::POST, "/api/books", dune()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["title"], "Dune");
    assert!(body["data"]["cover_image"].is_null());

    let (status, body) = app.form(Method::POST, "/api/books", dune()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "conflict");
    assert_eq!(body["message"], "ISBN already exists");

    let (status, body) = app.get("/api/books").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["books"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mutations_require_token() {
    let app = TestApp::new();
    let request = Request::post("/api/books")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(dune().finish()))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "unauthorized");

    let (_, body) = app.get("/api/books").await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let app = TestApp::new();
    let form = Form::default().text("title", "Dune");

    let (status, body) = app.form(Method::POST, "/api/books", form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_unsupported_cover_type() {
    let app = TestApp::new();
    let form = dune().file("cover_image", "cover.gif", b"GIF89a");

    let (status, body) = app.form(Method::POST, "/api/books", form).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "unsupported_media_type");
    assert_eq!(app.stored_covers(), 0);
}

#[tokio::test]
async fn test_cover_is_stored_and_served() {
    let app = TestApp::new();
    let form = dune().file("cover_image", "cover.PNG", b"\x89PNG fake image");

    let (status, body) = app.form(Method::POST, "/api/books", form).await;
    assert_eq!(status, StatusCode::CREATED);
    let reference = body["data"]["cover_image"].as_str().unwrap().to_string();
    assert!(reference.starts_with("/images/"));
    assert!(reference.ends_with(".png"));
    assert_eq!(app.stored_covers(), 1);

    let response = app
        .router
        .clone()
        .oneshot(Request::get(&reference).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNG fake image");
}

#[tokio::test]
async fn test_patch_updates_only_given_fields() {
    let app = TestApp::new();
    let (_, created) = app.form(Method::POST, "/api/books", dune()).await;

    let form = Form::default().text("author", "F. Herbert");
    let (status, body) = app.form(Method::PATCH, "/api/books/1", form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["author"], "F. Herbert");
    assert_eq!(body["data"]["title"], "Dune");
    assert_eq!(body["data"]["isbn"], "111");
    assert_ne!(body["data"]["updated_at"], created["data"]["updated_at"]);
}

#[tokio::test]
async fn test_patch_replaces_cover() {
    let app = TestApp::new();
    let form = dune().file("cover_image", "a.jpg", b"first");
    let (_, created) = app.form(Method::POST, "/api/books", form).await;
    let old_reference = created["data"]["cover_image"].as_str().unwrap().to_string();

    let form = Form::default().file("cover_image", "b.jpeg", b"second");
    let (status, body) = app.form(Method::PATCH, "/api/books/1", form).await;
    assert_eq!(status, StatusCode::OK);
    let new_reference = body["data"]["cover_image"].as_str().unwrap();
    assert_ne!(new_reference, old_reference);
    assert_eq!(app.stored_covers(), 1);
}

#[tokio::test]
async fn test_patch_isbn_collision() {
    let app = TestApp::new();
    app.form(Method::POST, "/api/books", dune()).await;
    let other = Form::default()
        .text("title", "Emma")
        .text("isbn", "222")
        .text("year", "1815")
        .text("publisher", "Murray")
        .text("author", "Jane Austen");
    app.form(Method::POST, "/api/books", other).await;

    let form = Form::default().text("isbn", "111");
    let (status, body) = app.form(Method::PATCH, "/api/books/2", form).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    // resubmitting the book's own ISBN is not a collision
    let form = Form::default().text("isbn", "222");
    let (status, _) = app.form(Method::PATCH, "/api/books/2", form).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    let app = TestApp::new();
    let form = dune().file("cover_image", "cover.jpg", b"jpeg");
    app.form(Method::POST, "/api/books", form).await;
    assert_eq!(app.stored_covers(), 1);

    let (status, body) = app.delete("/api/books/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.stored_covers(), 0);

    let (status, body) = app.get("/api/books/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = app.delete("/api/books/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_id_gets_envelope() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/books/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Book ID must be a number");
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let app = TestApp::new();
    app.form(Method::POST, "/api/books", dune()).await;

    let (status, body) = app
        .get("/api/books?page=9223372036854775807&limit=100")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["books"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["total_pages"], 1);
}

#[tokio::test]
async fn test_cover_part_without_file_name_is_rejected() {
    let app = TestApp::new();
    let form = dune().text("cover_image", "raw image bytes");

    let (status, body) = app.form(Method::POST, "/api/books", form).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "unsupported_media_type");

    let (_, body) = app.get("/api/books").await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_trailing_slash_prefix_still_serves_covers() {
    let app = TestApp::with_prefix("/covers/");
    let form = dune().file("cover_image", "cover.jpg", b"jpeg bytes");

    let (status, body) = app.form(Method::POST, "/api/books", form).await;
    assert_eq!(status, StatusCode::CREATED);
    let reference = body["data"]["cover_image"].as_str().unwrap().to_string();
    assert!(reference.starts_with("/covers/cover_"));

    let response = app
        .router
        .clone()
        .oneshot(Request::get(&reference).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_responses_are_gzipped_on_request() {
    let app = TestApp::new();
    app.form(Method::POST, "/api/books", dune()).await;

    let request = Request::get("/api/books")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
}

#[tokio::test]
async fn test_list_search_and_paging() {
    let app = TestApp::new();
    for i in 1..=12 {
        let form = Form::default()
            .text("title", &format!("Volume {}", i))
            .text("isbn", &format!("isbn-{}", i))
            .text("year", if i % 2 == 0 { "2000" } else { "1999" })
            .text("publisher", "Acme")
            .text("author", if i == 3 { "Ursula Le Guin" } else { "Anon" });
        let (status, _) = app.form(Method::POST, "/api/books", form).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app.get("/api/books?page=2&limit=5").await;
    let ids: Vec<i64> = body["data"]["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![7, 6, 5, 4, 3]);
    assert_eq!(body["data"]["total"], 12);
    assert_eq!(body["data"]["total_pages"], 3);

    let (_, body) = app.get("/api/books?search=guin").await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = app.get("/api/books?year=2000&limit=100").await;
    assert_eq!(body["data"]["total"], 6);
}

#[tokio::test]
async fn test_register_login_me() {
    let app = TestApp::new();

    let register = Request::post("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "username": "reader",
                "email": "reader@example.com",
                "password": "secret123",
                "full_name": "Avid Reader"
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body) = app.send(register).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["username"], "reader");

    let login = |password: &str| {
        Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "username": "reader", "password": password }).to_string(),
            ))
            .unwrap()
    };

    let (status, _) = app.send(login("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(login("secret123")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let me = Request::get("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(me).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "reader");
}

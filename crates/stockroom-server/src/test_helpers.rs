use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use stockroom_core::user::CreateUser;
use stockroom_db::{Database, SqliteDatabase};
use stockroom_service::LocalService;
use stockroom_store::StoreConfig;

use crate::auth::AuthConfig;
use crate::routes::{build_router, InnerAppState};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// A router over in-memory SQLite and a temp upload directory.
pub struct TestApp {
    pub router: Router,
    pub service: LocalService,
    pub upload_dir: PathBuf,
    _tmp: TempDir,
}

impl TestApp {
    /// Number of files currently in the upload directory.
    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(&self.upload_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Build a test app with authentication disabled.
pub async fn test_app() -> TestApp {
    build(false).await
}

/// Build a test app with authentication required and an active admin
/// (`ADMIN_USERNAME` / `ADMIN_PASSWORD`).
pub async fn test_app_with_auth() -> TestApp {
    let app = build(true).await;
    app.service
        .create_user(&CreateUser {
            name: "Ada".into(),
            lastname: "Root".into(),
            dni: "00000001".into(),
            username: ADMIN_USERNAME.into(),
            password: ADMIN_PASSWORD.into(),
            role_id: 1,
            status_id: 1,
        })
        .await
        .unwrap();
    app
}

async fn build(required: bool) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let upload_dir = tmp.path().join("uploads");
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let files = stockroom_store::create_store(&StoreConfig {
        upload_dir: Some(upload_dir.to_string_lossy().into_owned()),
    })
    .await
    .unwrap();
    let service = LocalService::new(db, files).with_bcrypt_cost(4);
    let state = Arc::new(InnerAppState {
        service: service.clone(),
        auth: AuthConfig {
            required,
            session_ttl: chrono::Duration::hours(1),
        },
        body_limit: 5 * 1024 * 1024,
    });
    TestApp {
        router: build_router(state),
        service,
        upload_dir,
        _tmp: tmp,
    }
}

/// Log in through the API and return the session token.
pub async fn login(router: &Router, username: &str, password: &str) -> String {
    let resp = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth",
            &json!({ "username": username, "password": password }),
        ))
        .await
        .unwrap();
    let body = body_json(resp).await;
    body["data"]["token"]
        .as_str()
        .unwrap_or_else(|| panic!("login failed: {body}"))
        .to_string()
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Builds a `multipart/form-data` body by hand.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "stockroom-test-boundary".into(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, field: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: &str, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

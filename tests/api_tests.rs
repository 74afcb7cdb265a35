use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
};
use folio::config::{Config, SecurityConfig};
use folio::domain::Role;
use folio::services::contact::OutgoingMail;
use folio::services::MailTransport;
use folio::state::SharedState;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-password-1";

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    shared: Arc<SharedState>,
    mail: Arc<RecordingTransport>,
    upload_dir: PathBuf,
}

fn test_config() -> Config {
    let dir = std::env::temp_dir().join(format!("folio-test-{}", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", dir.join("folio.db").display());
    config.auth.access_token_secret = "access-secret-for-tests-0123456789abcdef".to_string();
    config.auth.refresh_token_secret = "refresh-secret-for-tests-0123456789abcdef".to_string();
    config.auth.bootstrap_password = Some(ADMIN_PASSWORD.to_string());
    config.security = SecurityConfig {
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        min_password_length: 8,
    };
    config.content.seed_default = false;
    config.uploads.directory = dir.join("uploads").display().to_string();
    config.observability.metrics_enabled = false;
    config
}

async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

async fn spawn_app_with(config: Config) -> TestApp {
    spawn_app_with_metrics(config, None).await
}

async fn spawn_app_with_metrics(config: Config, metrics: Option<PrometheusHandle>) -> TestApp {
    let upload_dir = PathBuf::from(&config.uploads.directory);
    let mail = Arc::new(RecordingTransport::default());

    let shared = Arc::new(
        SharedState::with_transport(config, Some(mail.clone() as Arc<dyn MailTransport>))
            .await
            .expect("Failed to create state"),
    );
    let state = folio::api::create_app_state(Arc::clone(&shared), metrics);

    TestApp {
        router: folio::api::router(state),
        shared,
        mail,
        upload_dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json_request("POST", uri, token, body).await
    }

    async fn json_request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn login(&self, username: &str, password: &str) -> Value {
        let (status, body) = self
            .post_json(
                "/api/auth/login",
                None,
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"].clone()
    }

    async fn admin_token(&self) -> String {
        self.login("admin", ADMIN_PASSWORD).await["accessToken"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn upload(&self, token: &str, kind: &str, mime: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let boundary = "folio-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/upload?kind={kind}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

fn contact_form() -> Value {
    json!({
        "name": "Grace Hopper",
        "email": "grace@example.com",
        "message": "Would you be available for a short project?"
    })
}

#[tokio::test]
async fn test_login_and_me() {
    let app = spawn_app().await;

    let data = app.login("admin", ADMIN_PASSWORD).await;
    assert_eq!(data["tokenType"], "Bearer");
    assert_eq!(data["user"]["username"], "admin");
    assert_eq!(data["user"]["role"], "admin");
    assert!(data["user"].get("passwordHash").is_none());

    let token = data["accessToken"].as_str().unwrap();
    let (status, body) = app.get("/api/auth/me", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "admin");
}

#[tokio::test]
async fn test_bad_credentials_share_one_answer() {
    let app = spawn_app().await;

    let (status_a, body_a) = app
        .post_json(
            "/api/auth/login",
            None,
            json!({ "username": "admin", "password": "wrong-password" }),
        )
        .await;
    let (status_b, body_b) = app
        .post_json(
            "/api/auth/login",
            None,
            json!({ "username": "ghost", "password": "wrong-password" }),
        )
        .await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a, body_b);
    assert_eq!(body_a["success"], false);
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let app = spawn_app().await;

    let (status, _) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/auth/me", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json_request("PUT", "/api/content", None, json!({ "heroTitle": "x" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_editor_cannot_write_content() {
    let app = spawn_app().await;
    app.shared
        .store
        .user_repo()
        .create(
            "editor",
            "editor-password",
            Role::Editor,
            &app.shared.config.security,
        )
        .await
        .unwrap();

    let token = app.login("editor", "editor-password").await["accessToken"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = app
        .json_request("PUT", "/api/content", Some(&token), json!({ "heroTitle": "x" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/content/backups", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // editors still have a session
    let (status, _) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_content_lifecycle() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, _) = app.get("/api/content", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .json_request("PUT", "/api/content", Some(&token), json!({ "heroTitle": "Hello" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["version"], 1);

    let (status, body) = app
        .json_request(
            "PATCH",
            "/api/content/section/hero",
            Some(&token),
            json!({ "heroTitle": "World", "aboutTitle": "ignored", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["heroTitle"], "World");
    assert_eq!(body["data"]["aboutTitle"], "");

    let (status, body) = app.get("/api/content", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["heroTitle"], "World");

    let (status, body) = app.get("/api/content/backups", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    let backup = &body["data"]["items"][0];
    assert_eq!(backup["heroTitle"], "Hello");
    let backup_id = backup["id"].as_i64().unwrap();

    let (status, body) = app
        .get(&format!("/api/content/backups/{backup_id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], 1);

    let (status, body) = app
        .post_json(
            &format!("/api/content/restore/{backup_id}"),
            Some(&token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["version"], 3);
    assert_eq!(body["data"]["heroTitle"], "Hello");

    let (_, body) = app.get("/api/content/backups", Some(&token)).await;
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn test_stale_write_is_conflict() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    app.json_request("PUT", "/api/content", Some(&token), json!({ "heroTitle": "a" }))
        .await;
    app.json_request("PUT", "/api/content", Some(&token), json!({ "heroTitle": "b" }))
        .await;

    let (status, body) = app
        .json_request(
            "PUT",
            "/api/content",
            Some(&token),
            json!({ "heroTitle": "c", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (_, body) = app.get("/api/content", None).await;
    assert_eq!(body["data"]["heroTitle"], "b");
    assert_eq!(body["data"]["version"], 2);
}

#[tokio::test]
async fn test_content_validation_and_unknown_section() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .json_request(
            "PUT",
            "/api/content",
            Some(&token),
            json!({ "socialLinks": [{ "platform": "x", "url": "javascript:alert(1)" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "socialLinks[0].url");

    let (status, _) = app
        .json_request(
            "PATCH",
            "/api/content/section/footer",
            Some(&token),
            json!({ "heroTitle": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/content/backups/0", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/content/sections", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_refresh_rotation_and_logout() {
    let app = spawn_app().await;
    let tokens = app.login("admin", ADMIN_PASSWORD).await;
    let first_refresh = tokens["refreshToken"].as_str().unwrap().to_string();
    let access = tokens["accessToken"].as_str().unwrap().to_string();

    let (status, body) = app
        .post_json(
            "/api/auth/refresh",
            None,
            json!({ "refreshToken": first_refresh }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let second_refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let (status, _) = app
        .post_json(
            "/api/auth/refresh",
            None,
            json!({ "refreshToken": first_refresh }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post_json(
            "/api/auth/logout",
            Some(&access),
            json!({ "refreshToken": second_refresh }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post_json(
            "/api/auth/refresh",
            None,
            json!({ "refreshToken": second_refresh }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_over_http() {
    let app = spawn_app().await;
    let tokens = app.login("admin", ADMIN_PASSWORD).await;
    let access = tokens["accessToken"].as_str().unwrap().to_string();
    let refresh = tokens["refreshToken"].as_str().unwrap().to_string();

    let (status, _) = app
        .post_json(
            "/api/auth/change-password",
            Some(&access),
            json!({ "currentPassword": "wrong-password", "newPassword": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json(
            "/api/auth/change-password",
            Some(&access),
            json!({ "currentPassword": ADMIN_PASSWORD, "newPassword": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .post_json("/api/auth/refresh", None, json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.login("admin", "brand-new-pass").await;
}

#[tokio::test]
async fn test_contact_is_rate_limited() {
    let app = spawn_app().await;

    for _ in 0..3 {
        let (status, body) = app.post_json("/api/contact", None, contact_form()).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    assert_eq!(app.mail.sent.lock().unwrap().len(), 3);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/contact")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(contact_form().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 600);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["retryAfter"], retry_after);
    assert_eq!(app.mail.sent.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_contact_validation() {
    let app = spawn_app().await;

    let (status, body) = app
        .post_json(
            "/api/contact",
            None,
            json!({ "name": "G", "email": "nope", "message": "hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"].as_array().unwrap().len(), 3);
    assert!(app.mail.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_contact_limit_ignores_client_written_forwarding() {
    let mut config = test_config();
    config.server.trusted_proxy_ips = vec!["10.0.0.1".to_string()];
    let app = spawn_app_with(config).await;
    let proxy: SocketAddr = "10.0.0.1:443".parse().unwrap();

    let mut statuses = Vec::new();
    for n in 0..5 {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", format!("198.18.0.{n}, 203.0.113.7"))
            .body(Body::from(contact_form().to_string()))
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(proxy));
        statuses.push(app.send(request).await.0);
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
    assert_eq!(app.mail.sent.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_undecodable_bodies_use_error_envelope() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .json_request(
            "PUT",
            "/api/content",
            Some(&token),
            json!({
                "skillCategories": [{
                    "category": "Languages",
                    "icon": "code",
                    "skills": [{ "name": "Rust", "level": 300 }]
                }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"][0]["field"], "body");

    let (status, body) = app
        .post_json("/api/contact", None, json!({ "name": "Ada" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(app.mail.sent.lock().unwrap().is_empty());

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\": "))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .body(Body::from(r#"{"username":"admin","password":"x"}"#))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_request_metrics_use_route_templates() {
    // the only test in this binary that installs a recorder
    let handle = PrometheusBuilder::new().install_recorder().unwrap();
    let app = spawn_app_with_metrics(test_config(), Some(handle.clone())).await;
    let token = app.admin_token().await;

    for id in [5, 6, 7] {
        let (status, _) = app
            .get(&format!("/api/content/backups/{id}"), Some(&token))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    app.get("/api/health/live", None).await;

    let rendered = handle.render();
    assert!(rendered.contains(r#"path="/api/content/backups/{id}""#), "{rendered}");
    assert!(!rendered.contains("/api/content/backups/5"));
    assert!(!rendered.contains("/api/health/live"));
}

#[tokio::test]
async fn test_uploads() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    let (status, body) = app.upload(&token, "image", "image/png", &png).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let path = body["data"]["path"].as_str().unwrap();
    assert!(path.starts_with("images/") && path.ends_with(".png"));
    assert!(body["data"]["url"].as_str().unwrap().starts_with("/uploads/images/"));
    assert!(app.upload_dir.join(path).exists());

    let pdf = b"%PDF-1.7\n%fake\n";
    let (status, body) = app.upload(&token, "cv", "application/pdf", pdf).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["path"], "cv.pdf");
    assert_eq!(body["data"]["url"], "/uploads/cv.pdf");

    // a second CV replaces the first
    let newer = b"%PDF-1.7\n%newer\n";
    app.upload(&token, "cv", "application/pdf", newer).await;
    assert_eq!(
        std::fs::read(app.upload_dir.join("cv.pdf")).unwrap(),
        newer.to_vec()
    );

    let (status, _) = app.upload(&token, "image", "application/pdf", pdf).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, _) = app.upload(&token, "image", "image/png", pdf).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, _) = app.upload(&token, "video", "image/png", &png).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.get("/api/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health/live")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}

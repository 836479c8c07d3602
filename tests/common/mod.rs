//! Shared integration test infrastructure.
//!
//! [`TestServer`] runs the full application on an ephemeral port against a
//! temporary SQLite file and local storage directory, and talks to it with
//! `reqwest`.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use kindleplus::config::AppConfig;
use kindleplus::database::DatabaseConnection;
use kindleplus::models::User;
use kindleplus::services::{GoogleClaims, IdTokenVerifier, OAuthError};
use kindleplus::web::{create_app, state::AppState};

pub const TEST_GOOGLE_CLIENT_ID: &str = "test-client.apps.googleusercontent.com";

/// Accepts ID tokens of the form `valid:<email>` and `unverified:<email>`.
pub struct StubIdTokenVerifier;

#[async_trait]
impl IdTokenVerifier for StubIdTokenVerifier {
    async fn verify(&self, id_token: &str, audience: &str) -> Result<GoogleClaims, OAuthError> {
        if audience != TEST_GOOGLE_CLIENT_ID {
            return Err(OAuthError::InvalidToken("wrong audience".to_string()));
        }

        let (verified, email) = match id_token.split_once(':') {
            Some(("valid", email)) => (true, email),
            Some(("unverified", email)) => (false, email),
            _ => return Err(OAuthError::InvalidToken("malformed token".to_string())),
        };

        Ok(GoogleClaims {
            sub: format!("google-{email}"),
            email: Some(email.to_string()),
            email_verified: Some(verified),
            name: Some("Google Reader".to_string()),
            picture: None,
            exp: chrono::Utc::now().timestamp() + 3600,
        })
    }
}

pub struct TestServer {
    pub base_url: String,
    pub config: AppConfig,
    pub state: AppState,
    pub client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with configuration tweaks applied before services are built.
    pub async fn start_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));

        let mut config = AppConfig {
            environment: "test".to_string(),
            secret_key: "integration-test-secret".to_string(),
            bcrypt_cost: 4,
            database_url: format!("sqlite://{}", dir.path().join("test.db").display()),
            database_max_connections: 4,
            storage_local_dir: dir.path().join("storage").display().to_string(),
            public_base_url: base_url.clone(),
            google_client_id: Some(TEST_GOOGLE_CLIENT_ID.to_string()),
            ..AppConfig::default()
        };
        configure(&mut config);

        let db = DatabaseConnection::connect(&config)
            .await
            .expect("connect test database");
        db.migrate().await.expect("migrate test database");

        let state = AppState::new(config.clone(), db.into_pool())
            .expect("build app state")
            .with_id_token_verifier(Arc::new(StubIdTokenVerifier));
        let app = create_app(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });

        Self {
            base_url,
            config,
            state,
            client: reqwest::Client::new(),
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        self.request(Method::GET, path, token)
            .send()
            .await
            .expect("GET request")
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Response {
        self.request(Method::DELETE, path, token)
            .send()
            .await
            .expect("DELETE request")
    }

    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Response {
        self.request(method, path, token)
            .json(body)
            .send()
            .await
            .expect("JSON request")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> Response {
        self.send_json(Method::POST, path, token, body).await
    }

    /// Register an account and return its access token.
    pub async fn register(&self, email: &str) -> String {
        let response = self
            .post(
                "/auth/register",
                None,
                &json!({"email": email, "password": "secret123", "full_name": "Test Reader"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "register {email}");
        let body: Value = response.json().await.expect("register body");
        access_token(&body)
    }

    /// Register an account, promote it to superuser and return its token.
    pub async fn register_admin(&self, email: &str) -> String {
        let token = self.register(email).await;
        let user = User::find_by_email(&self.state.db_pool, email)
            .await
            .expect("lookup admin")
            .expect("admin exists");
        User::set_superuser(&self.state.db_pool, &user.id, true)
            .await
            .expect("promote admin");
        token
    }

    /// Create a book through the API as `admin` and return its JSON.
    pub async fn create_book(&self, admin: &str, body: Value) -> Value {
        let response = self.post("/books", Some(admin), &body).await;
        assert_eq!(response.status(), StatusCode::CREATED, "create book");
        response.json().await.expect("book body")
    }

    pub async fn create_category(&self, admin: &str, name: &str) -> Value {
        let response = self.post("/categories", Some(admin), &json!({"name": name})).await;
        assert_eq!(response.status(), StatusCode::CREATED, "create category");
        response.json().await.expect("category body")
    }
}

pub fn access_token(auth_response: &Value) -> String {
    auth_response["tokens"]["access_token"]
        .as_str()
        .expect("access token")
        .to_string()
}

pub async fn json_body(response: Response) -> Value {
    response.json().await.expect("JSON body")
}

/// Assert the standard error envelope and return its code.
pub async fn error_code(response: Response, expected: StatusCode) -> String {
    assert_eq!(response.status(), expected);
    let body = json_body(response).await;
    body["error"]["code"]
        .as_str()
        .expect("error code")
        .to_string()
}

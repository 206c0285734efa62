//! Common test utilities for E2E tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::async_trait;
use foliopage::auth::{IdentityProvider, ProviderError, ProviderToken};
use foliopage::error::AppError;
use foliopage::storage::ImageStore;
use foliopage::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const FRONTEND_URL: &str = "http://localhost:3000";
pub const PROVIDER_AUTH_URL: &str = "https://provider.test/o/oauth2/auth";
pub const IMAGE_PUBLIC_URL: &str = "https://images.test";

/// Identity provider double
///
/// Authorization codes are registered up front and map to a verified email.
#[derive(Default)]
pub struct FakeProvider {
    codes: Mutex<HashMap<String, String>>,
}

impl FakeProvider {
    pub fn register(&self, code: &str, email: &str) {
        self.codes
            .lock()
            .unwrap()
            .insert(code.to_string(), email.to_string());
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, state: &str) -> String {
        reqwest::Url::parse_with_params(PROVIDER_AUTH_URL, &[("state", state)])
            .unwrap()
            .to_string()
    }

    async fn exchange(&self, code: &str) -> Result<ProviderToken, ProviderError> {
        match self.codes.lock().unwrap().get(code) {
            Some(email) => Ok(ProviderToken {
                access_token: email.clone(),
            }),
            None => Err(ProviderError::Status(400)),
        }
    }

    async fn fetch_verified_email(&self, token: &ProviderToken) -> Result<String, ProviderError> {
        Ok(token.access_token.clone())
    }
}

/// One object written to the image store
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub key: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory image store
#[derive(Default)]
pub struct FakeImageStore {
    pub stored: Mutex<Vec<StoredImage>>,
}

impl FakeImageStore {
    pub fn stored(&self) -> Vec<StoredImage> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStore for FakeImageStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        self.stored.lock().unwrap().push(StoredImage {
            key: key.to_string(),
            data,
            content_type: content_type.to_string(),
        });
        Ok(format!("{IMAGE_PUBLIC_URL}/{key}"))
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    pub images: Arc<FakeImageStore>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Bind first so the public URL is known
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
                public_url: addr_str.clone(),
            },
            frontend: config::FrontendConfig {
                url: FRONTEND_URL.to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_max_age: 86400,
                provider_timeout_seconds: 5,
                google: config::GoogleOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                },
            },
            session: config::SessionConfig {
                cleanup_interval_seconds: 600,
            },
            storage: config::StorageConfig {
                images: config::ImageStorageConfig {
                    bucket: "foliopage-images".to_string(),
                    region: "us-east-1".to_string(),
                    endpoint_url: None,
                    public_url: IMAGE_PUBLIC_URL.to_string(),
                    access_key_id: String::new(),
                    secret_access_key: String::new(),
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let provider = Arc::new(FakeProvider::default());
        let images = Arc::new(FakeImageStore::default());
        let state = AppState::with_provider(config, provider.clone())
            .await
            .unwrap()
            .with_image_store(images.clone());

        // HTTP client that leaves redirects to the test
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Spawn server in background
        let app = foliopage::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr: addr_str,
            state,
            provider,
            images,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST a raw body with a content type and optional session cookie
    pub async fn post_bytes(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
        cookie: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .post(self.url(path))
            .header("content-type", content_type)
            .body(body);
        if let Some(cookie) = cookie {
            request = request.header("cookie", format!("session={cookie}"));
        }
        request.send().await.unwrap()
    }

    /// Run the whole signup flow for `handle`, returning the session cookie
    pub async fn sign_up(&self, handle: &str, email: &str) -> String {
        let code = format!("code-{handle}");
        self.provider.register(&code, email);

        let response = self
            .client
            .get(self.url(&format!("/auth/google/signup?username={handle}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 307);
        let state = state_param(location(&response));

        let response = self.callback(&state, &code, None).await;
        assert_eq!(location(&response), format!("{FRONTEND_URL}/editor"));
        session_cookie(&response).expect("session cookie after signup")
    }

    /// Run the login flow for an email, returning the callback response
    pub async fn log_in(&self, email: &str) -> reqwest::Response {
        let code = format!("login-{email}");
        self.provider.register(&code, email);

        let response = self
            .client
            .get(self.url("/auth/google/login"))
            .send()
            .await
            .unwrap();
        let state = state_param(location(&response));
        self.callback(&state, &code, None).await
    }

    pub async fn callback(
        &self,
        state: &str,
        code: &str,
        cookie: Option<&str>,
    ) -> reqwest::Response {
        let url = reqwest::Url::parse_with_params(
            &self.url("/auth/google/callback"),
            &[("state", state), ("code", code)],
        )
        .unwrap();

        let mut request = self.client.get(url);
        if let Some(cookie) = cookie {
            request = request.header("cookie", format!("session={cookie}"));
        }
        request.send().await.unwrap()
    }

    /// GET with an optional session cookie
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("cookie", format!("session={cookie}"));
        }
        request.send().await.unwrap()
    }
}

pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
}

/// `state` query parameter of a provider authorization URL
pub fn state_param(location: &str) -> String {
    let url = reqwest::Url::parse(location).expect("absolute location");
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state parameter")
}

/// Value of the `session` cookie set by the response, if any
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("session="))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use serde_json::json;
use smartbudget::modules::auth::{
    memory::{MemoryRefreshTokenStore, MemoryUserStore},
    AuthRepositories, AuthService,
};
use smartbudget::modules::category::memory::MemoryCategoryStore;
use smartbudget::services::{
    email::{EmailKind, EmailLinks, EmailMessage, MailError, Mailer},
    hashing::{PasswordCost, PasswordHasher},
    jwt::JwtService,
    rate_limit::{create_rate_limiter, RateLimitConfig},
};
use smartbudget::config::DbPool;
use smartbudget::{AppState, HttpOptions};
use std::sync::{Arc, Mutex};

pub const JWT_SECRET: &str = "test-secret-key-for-testing-only";

/// Keeps every message so tests can pull tokens out of the links.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

#[allow(dead_code)]
impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Raw token from the most recent email of `kind` sent to `to`.
    pub fn last_token(&self, kind: EmailKind, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .and_then(|m| m.link.split("token=").nth(1))
            .map(str::to_string)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError("smtp unavailable".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestOptions {
    pub rate_limit: RateLimitConfig,
    pub failing_mailer: bool,
    pub access_token_ttl: chrono::Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                max_requests: 1_000,
                ..RateLimitConfig::default()
            },
            failing_mailer: false,
            access_token_ttl: chrono::Duration::minutes(15),
        }
    }
}

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
pub struct TestContext {
    pub server: TestServer,
    pub users: Arc<MemoryUserStore>,
    pub refresh_tokens: Arc<MemoryRefreshTokenStore>,
    pub categories: Arc<MemoryCategoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

#[allow(dead_code)]
impl TestContext {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let refresh_tokens = Arc::new(MemoryRefreshTokenStore::new());
        let categories = Arc::new(MemoryCategoryStore::new());
        let mailer = Arc::new(if options.failing_mailer {
            RecordingMailer::failing()
        } else {
            RecordingMailer::default()
        });

        let auth = AuthService::new(
            AuthRepositories {
                users: users.clone(),
                refresh_tokens: refresh_tokens.clone(),
                categories: categories.clone(),
            },
            JwtService::with_duration(JWT_SECRET, options.access_token_ttl),
            PasswordHasher::new(PasswordCost::new(1024, 1, 1)).expect("hasher"),
            mailer.clone(),
            EmailLinks::default(),
        );

        let app = smartbudget::create_app(
            AppState {
                auth,
                cookie_secure: false,
            },
            create_rate_limiter(&options.rate_limit),
            HttpOptions {
                trust_forwarded_for: options.rate_limit.trust_forwarded_for,
                allowed_origins: vec!["http://localhost:5173".into()],
            },
        );
        let server = TestServer::new(app).expect("Failed to create test server");

        Self {
            server,
            users,
            refresh_tokens,
            categories,
            mailer,
        }
    }

    pub async fn register(&self, email: &str, username: &str) -> TestResponse {
        self.server
            .post("/auth/register")
            .json(&json!({
                "email": email,
                "username": username,
                "password": test_password(),
            }))
            .await
    }

    /// Registers and follows the emailed verification link.
    pub async fn create_verified_user(&self) -> String {
        let email = test_email();
        self.register(&email, &test_username())
            .await
            .assert_status(StatusCode::CREATED);

        let token = self
            .mailer
            .last_token(EmailKind::Verification, &email)
            .expect("verification email");
        self.server
            .get("/auth/verify-email")
            .add_query_param("token", &token)
            .await
            .assert_status_ok();

        email
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.server
            .post("/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .await
    }

    /// Verified user plus a live session: (email, access token, refresh token).
    pub async fn create_logged_in_user(&self) -> (String, String, String) {
        let email = self.create_verified_user().await;
        let response = self.login(&email, test_password()).await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        let access = body["data"]["token"].as_str().expect("access token").to_string();
        let refresh = response.cookie("refreshToken").value().to_string();
        (email, access, refresh)
    }

    pub async fn user_id(&self, email: &str) -> String {
        use smartbudget::modules::auth::interface::UserRepository;

        self.users
            .find_by_email(email)
            .await
            .unwrap()
            .expect("user exists")
            .id
    }
}

/// Migrated pool on `TEST_DATABASE_URL`, or `None` when no test database is
/// configured so the MySQL-backed tests skip instead of failing.
#[allow(dead_code)]
pub async fn mysql_pool() -> Option<DbPool> {
    dotenvy::dotenv().ok();

    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping MySQL repository test");
        return None;
    };

    let db = sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run migrations");

    Some(db)
}

// Helper to generate unique test email
#[allow(dead_code)]
pub fn test_email() -> String {
    format!("test_{}@example.com", uuid::Uuid::new_v4().simple())
}

#[allow(dead_code)]
pub fn test_username() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("user_{}", &id[..12])
}

// Helper to generate test password
#[allow(dead_code)]
pub fn test_password() -> &'static str {
    "Passw0rd!"
}

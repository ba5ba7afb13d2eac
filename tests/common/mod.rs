#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::OnceLock;

use blog::core::db::init_db;
use blog::core::helpers::hash_password;
use reqwest::redirect::Policy;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

/// argon2 is slow, so every test shares one hash per seeded password.
fn seeded_hashes() -> &'static (String, String) {
    static HASHES: OnceLock<(String, String)> = OnceLock::new();
    HASHES.get_or_init(|| {
        (
            hash_password("test").expect("hash test password"),
            hash_password("other").expect("hash other password"),
        )
    })
}

/// Starts the server on a random port against a private in-memory database
/// holding users `test`/`test` and `other`/`other`, and one post by `test`.
pub async fn spawn_app() -> TestApp {
    blog::telemetry::init_for_tests();

    // one connection keeps the in-memory database alive and shared
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    init_db(&pool).await.expect("Failed to create schema");
    seed(&pool).await;

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let server = blog::run(listener, pool.clone()).expect("Failed to build server");
    actix_web::rt::spawn(server);

    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .cookie_store(true)
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client,
    }
}

async fn seed(pool: &SqlitePool) {
    let (test_hash, other_hash) = seeded_hashes();

    sqlx::query("INSERT INTO user (username, password) VALUES ('test', ?), ('other', ?)")
        .bind(test_hash)
        .bind(other_hash)
        .execute(pool)
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO post (title, body, author_id, created) \
         VALUES ('test title', 'test' || char(10) || 'body', 1, '2018-01-01 00:00:00')",
    )
    .execute(pool)
    .await
    .unwrap();
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// A POST with no body at all.
    pub async fn post_empty(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login_as(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_form(
            "/auth/login",
            &[("username", username), ("password", password)],
        )
        .await
    }

    pub async fn login(&self) {
        let resp = self.login_as("test", "test").await;
        assert_eq!(resp.status(), 302, "login as test failed");
    }

    pub async fn post_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(id) FROM post")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

pub fn location(resp: &reqwest::Response) -> &str {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .expect("response has no Location header")
        .to_str()
        .unwrap()
}

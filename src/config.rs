pub const SESSION_COOKIE: &str = "session";
pub const MAX_DB_CONNECTIONS: u32 = 5;

pub fn database_url() -> String {
    std::env::var("BLOG_DATABASE_URL").unwrap_or_else(|_| "sqlite://blog.sqlite".to_string())
}

pub fn bind_addr() -> String {
    std::env::var("BLOG_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string())
}

pub fn session_expiration_hours() -> i64 {
    std::env::var("BLOG_SESSION_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

mod common;

use common::{location, spawn_app};

#[actix_web::test]
async fn test_register() {
    let app = spawn_app().await;
    assert_eq!(app.get("/auth/register").await.status(), 200);

    let resp = app
        .post_form("/auth/register", &[("username", "a"), ("password", "a")])
        .await;
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), app.url("/auth/login"));

    let password: String = sqlx::query_scalar("SELECT password FROM user WHERE username = 'a'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert!(blog::core::helpers::verify_password("a", &password));
}

#[actix_web::test]
async fn test_register_validate_input() {
    let app = spawn_app().await;

    let cases = [
        ("", "", "Username is required."),
        ("a", "", "Password is required."),
        ("test", "test", "User test is already registered."),
    ];

    for (username, password, message) in cases {
        let resp = app
            .post_form(
                "/auth/register",
                &[("username", username), ("password", password)],
            )
            .await;
        assert_eq!(resp.status(), 200, "{message}");
        assert!(resp.text().await.unwrap().contains(message), "{message}");
    }

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(users, 2);
}

#[actix_web::test]
async fn test_login() {
    let app = spawn_app().await;
    assert_eq!(app.get("/auth/login").await.status(), 200);

    let resp = app.login_as("test", "test").await;
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), app.url("/"));
    assert!(resp.cookies().any(|c| c.name() == "session" && c.http_only()));

    let page = app.get("/").await.text().await.unwrap();
    assert!(page.contains("<span>test</span>"));
    assert!(page.contains(r#"href="/create""#));
}

#[actix_web::test]
async fn test_login_validate_input() {
    let app = spawn_app().await;

    let cases = [
        ("a", "test", "Incorrect username."),
        ("test", "a", "Incorrect password."),
    ];

    for (username, password, message) in cases {
        let resp = app.login_as(username, password).await;
        assert_eq!(resp.status(), 200, "{message}");
        assert!(resp.text().await.unwrap().contains(message), "{message}");
    }

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(sessions, 0);
}

#[actix_web::test]
async fn test_logout() {
    let app = spawn_app().await;
    app.login().await;

    let resp = app.get("/auth/logout").await;
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), app.url("/"));

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(sessions, 0);

    let page = app.get("/").await.text().await.unwrap();
    assert!(page.contains("Log in"));

    let resp = app.post_empty("/create").await;
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), app.url("/auth/login"));
}

#[actix_web::test]
async fn test_relogin_replaces_session() {
    let app = spawn_app().await;
    app.login().await;
    app.login().await;

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(sessions, 1);
}

#[actix_web::test]
async fn test_stale_session_is_anonymous() {
    let app = spawn_app().await;
    app.login().await;

    sqlx::query("UPDATE session SET created = '2000-01-01 00:00:00'")
        .execute(&app.pool)
        .await
        .unwrap();

    let resp = app.post_empty("/create").await;
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), app.url("/auth/login"));
}

#[actix_web::test]
async fn test_session_expires_within_the_hour() {
    let app = spawn_app().await;
    app.login().await;

    // still inside the default 24 hours
    sqlx::query("UPDATE session SET created = datetime('now', '-23 hours', '-30 minutes')")
        .execute(&app.pool)
        .await
        .unwrap();
    let page = app.get("/").await.text().await.unwrap();
    assert!(page.contains("Log out"));

    sqlx::query("UPDATE session SET created = datetime('now', '-24 hours', '-30 minutes')")
        .execute(&app.pool)
        .await
        .unwrap();
    let resp = app
        .post_form("/create", &[("title", "late"), ("body", "too late")])
        .await;
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), app.url("/auth/login"));
    assert_eq!(app.post_count().await, 1);
}

#[actix_web::test]
async fn test_unknown_session_token_is_anonymous() {
    let app = spawn_app().await;

    let resp = app
        .client
        .post(app.url("/create"))
        .header(reqwest::header::COOKIE, "session=not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), app.url("/auth/login"));
}

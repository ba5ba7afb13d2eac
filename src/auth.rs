use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use chrono::Duration;
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::config::{session_expiration_hours, SESSION_COOKIE};
use crate::core::db::Db;
use crate::core::errors::BlogError;
use crate::core::form::Form;
use crate::core::helpers::{absolute_url, hash_password, html, now, redirect, verify_password};
use crate::models::models::{Session, User};
use crate::templates::{render_auth_form, AuthAction, AuthFormView};

pub fn scope() -> actix_web::Scope {
    web::scope("/auth")
        .service(
            web::resource("/register")
                .route(web::get().to(register_form))
                .route(web::post().to(register)),
        )
        .service(
            web::resource("/login")
                .route(web::get().to(login_form))
                .route(web::post().to(login)),
        )
        .route("/logout", web::get().to(logout))
}

/// The user the request's session cookie belongs to, if any.
///
/// Resolved once per request and cached in the request extensions.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl FromRequest for CurrentUser {
    type Error = BlogError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            if let Some(current) = req.extensions().get::<CurrentUser>() {
                return Ok(current.clone());
            }

            let user = match req.cookie(SESSION_COOKIE) {
                Some(cookie) => {
                    let db = Db::for_request(&req)?;
                    load_logged_in_user(&db, cookie.value()).await?
                }
                None => None,
            };

            let current = CurrentUser(user);
            req.extensions_mut().insert(current.clone());
            Ok(current)
        })
    }
}

/// A logged-in user. Extracting it from an anonymous request fails with a
/// redirect to the login page, so the handler never runs.
#[derive(Debug, Clone)]
pub struct LoginRequired(pub User);

impl FromRequest for LoginRequired {
    type Error = BlogError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            match CurrentUser::extract(&req).await?.0 {
                Some(user) => Ok(LoginRequired(user)),
                None => Err(BlogError::AuthenticationRequired {
                    login_url: absolute_url(&req, "/auth/login"),
                }),
            }
        })
    }
}

async fn load_logged_in_user(db: &Db, token: &str) -> Result<Option<User>, BlogError> {
    let mut conn = db.get().await?;

    let session = sqlx::query_as::<_, Session>(
        "SELECT token, user_id, created FROM session WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    let age = now() - session.created;
    if age > Duration::hours(session_expiration_hours()) {
        tracing::debug!(
            user_id = session.user_id,
            age_minutes = age.num_minutes(),
            "session expired"
        );
        return Ok(None);
    }

    let user = sqlx::query_as::<_, User>("SELECT id, username, password FROM user WHERE id = ?")
        .bind(session.user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(user)
}

async fn register_form() -> Result<HttpResponse, BlogError> {
    Ok(html(render_auth_form(&AuthFormView {
        action: AuthAction::Register,
        username: "",
        error: None,
    })?))
}

#[tracing::instrument(skip_all)]
async fn register(req: HttpRequest, db: Db, body: web::Bytes) -> Result<HttpResponse, BlogError> {
    let form = Form::parse(&body);
    let username = form.field("username");
    let password = form.field("password");

    let error = if username.is_empty() {
        Some("Username is required.".to_string())
    } else if password.is_empty() {
        Some("Password is required.".to_string())
    } else {
        let hash = hash_password(password)?;
        let mut conn = db.get().await?;

        let inserted = sqlx::query("INSERT INTO user (username, password) VALUES (?, ?)")
            .bind(username)
            .bind(&hash)
            .execute(&mut *conn)
            .await;

        match inserted {
            Ok(_) => {
                tracing::info!(username, "registered user");
                return Ok(redirect(&req, "/auth/login"));
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Some(format!("User {username} is already registered."))
            }
            Err(e) => return Err(e.into()),
        }
    };

    Ok(html(render_auth_form(&AuthFormView {
        action: AuthAction::Register,
        username,
        error: error.as_deref(),
    })?))
}

async fn login_form() -> Result<HttpResponse, BlogError> {
    Ok(html(render_auth_form(&AuthFormView {
        action: AuthAction::Login,
        username: "",
        error: None,
    })?))
}

#[tracing::instrument(skip_all)]
async fn login(req: HttpRequest, db: Db, body: web::Bytes) -> Result<HttpResponse, BlogError> {
    let form = Form::parse(&body);
    let username = form.field("username");
    let password = form.field("password");

    let mut conn = db.get().await?;
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password FROM user WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(&mut *conn)
    .await?;

    let user = match user {
        None => Err("Incorrect username."),
        Some(u) if !verify_password(password, &u.password) => Err("Incorrect password."),
        Some(u) => Ok(u),
    };

    let user = match user {
        Ok(user) => user,
        Err(error) => {
            tracing::debug!(username, error, "login rejected");
            return Ok(html(render_auth_form(&AuthFormView {
                action: AuthAction::Login,
                username,
                error: Some(error),
            })?));
        }
    };

    // a fresh login never reuses the old session
    if let Some(old) = req.cookie(SESSION_COOKIE) {
        sqlx::query("DELETE FROM session WHERE token = ?")
            .bind(old.value())
            .execute(&mut *conn)
            .await?;
    }

    let token = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO session (token, user_id, created) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user.id)
        .bind(now())
        .execute(&mut *conn)
        .await?;

    tracing::info!(user_id = user.id, "user logged in");

    let mut resp = redirect(&req, "/");
    resp.add_cookie(&session_cookie(token))
        .map_err(|e| BlogError::Internal(e.to_string()))?;
    Ok(resp)
}

#[tracing::instrument(skip_all)]
async fn logout(req: HttpRequest, db: Db) -> Result<HttpResponse, BlogError> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        let mut conn = db.get().await?;
        sqlx::query("DELETE FROM session WHERE token = ?")
            .bind(cookie.value())
            .execute(&mut *conn)
            .await?;
    }

    let mut removal = session_cookie(String::new());
    removal.make_removal();

    let mut resp = redirect(&req, "/");
    resp.add_cookie(&removal)
        .map_err(|e| BlogError::Internal(e.to_string()))?;
    Ok(resp)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::Connection;

use crate::auth::{CurrentUser, LoginRequired};
use crate::core::db::Db;
use crate::core::errors::BlogError;
use crate::core::form::Form;
use crate::core::helpers::{html, redirect};
use crate::models::models::{Post, User};
use crate::templates::{render_index, render_post_form, IndexView, PostFormView};

const SELECT_POST: &str = "SELECT p.id, title, body, created, author_id, username \
     FROM post p JOIN user u ON p.author_id = u.id";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .service(
            web::resource("/create")
                .route(web::get().to(create_form))
                .route(web::post().to(create)),
        )
        .service(
            web::resource(r"/{id:\d+}/update")
                .route(web::get().to(update_form))
                .route(web::post().to(update)),
        )
        .route(r"/{id:\d+}/delete", web::post().to(delete));
}

/// Checks a submitted post. Blank and whitespace-only fields count as missing.
pub fn validate_post(title: &str, body: &str) -> Option<&'static str> {
    if title.trim().is_empty() {
        Some("Title is required.")
    } else if body.trim().is_empty() {
        Some("Body is required.")
    } else {
        None
    }
}

/// Loads a post with its author. An unknown id is a 404 even when the post
/// would not have belonged to `user`; only existing posts get the ownership
/// check, which fails with 403.
pub async fn get_post(db: &Db, id: i64, user: &User) -> Result<Post, BlogError> {
    let mut conn = db.get().await?;
    let post = sqlx::query_as::<_, Post>(&format!("{SELECT_POST} WHERE p.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| BlogError::NotFound(format!("Post id {id} doesn't exist.")))?;

    if post.author_id != user.id {
        tracing::debug!(post_id = id, user_id = user.id, "not the author");
        return Err(BlogError::Forbidden);
    }

    Ok(post)
}

#[tracing::instrument(skip_all)]
pub async fn index(db: Db, current: CurrentUser) -> Result<HttpResponse, BlogError> {
    let posts = {
        let mut conn = db.get().await?;
        sqlx::query_as::<_, Post>(&format!("{SELECT_POST} ORDER BY created DESC, p.id DESC"))
            .fetch_all(&mut *conn)
            .await?
    };

    Ok(html(render_index(&IndexView {
        user: current.user(),
        posts: &posts,
    })?))
}

async fn create_form(LoginRequired(user): LoginRequired) -> Result<HttpResponse, BlogError> {
    Ok(html(render_post_form(&PostFormView {
        user: &user,
        post: None,
        title: "",
        body: "",
        error: None,
    })?))
}

#[tracing::instrument(skip_all)]
pub async fn create(
    LoginRequired(user): LoginRequired,
    req: HttpRequest,
    db: Db,
    body: web::Bytes,
) -> Result<HttpResponse, BlogError> {
    let form = Form::parse(&body);
    let title = form.field("title");
    let body = form.field("body");

    if let Some(error) = validate_post(title, body) {
        return Ok(html(render_post_form(&PostFormView {
            user: &user,
            post: None,
            title,
            body,
            error: Some(error),
        })?));
    }

    let mut conn = db.get().await?;
    let mut tx = conn.begin().await?;
    let id = sqlx::query("INSERT INTO post (title, body, author_id) VALUES (?, ?, ?)")
        .bind(title)
        .bind(body)
        .bind(user.id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
    tx.commit().await?;

    tracing::info!(post_id = id, user_id = user.id, "created post");
    Ok(redirect(&req, "/"))
}

async fn update_form(
    LoginRequired(user): LoginRequired,
    db: Db,
    path: web::Path<i64>,
) -> Result<HttpResponse, BlogError> {
    let post = get_post(&db, path.into_inner(), &user).await?;

    Ok(html(render_post_form(&PostFormView {
        user: &user,
        post: Some(&post),
        title: &post.title,
        body: &post.body,
        error: None,
    })?))
}

#[tracing::instrument(skip_all)]
pub async fn update(
    LoginRequired(user): LoginRequired,
    req: HttpRequest,
    db: Db,
    path: web::Path<i64>,
    body: web::Bytes,
) -> Result<HttpResponse, BlogError> {
    let post = get_post(&db, path.into_inner(), &user).await?;

    let form = Form::parse(&body);
    let title = form.field("title");
    let body = form.field("body");

    if let Some(error) = validate_post(title, body) {
        return Ok(html(render_post_form(&PostFormView {
            user: &user,
            post: Some(&post),
            title,
            body,
            error: Some(error),
        })?));
    }

    let mut conn = db.get().await?;
    let mut tx = conn.begin().await?;
    sqlx::query("UPDATE post SET title = ?, body = ? WHERE id = ?")
        .bind(title)
        .bind(body)
        .bind(post.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(post_id = post.id, user_id = user.id, "updated post");
    Ok(redirect(&req, "/"))
}

#[tracing::instrument(skip_all)]
pub async fn delete(
    LoginRequired(user): LoginRequired,
    req: HttpRequest,
    db: Db,
    path: web::Path<i64>,
) -> Result<HttpResponse, BlogError> {
    let post = get_post(&db, path.into_inner(), &user).await?;

    let mut conn = db.get().await?;
    let mut tx = conn.begin().await?;
    sqlx::query("DELETE FROM post WHERE id = ?")
        .bind(post.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(post_id = post.id, user_id = user.id, "deleted post");
    Ok(redirect(&req, "/"))
}

#[cfg(test)]
mod tests {
    use super::validate_post;

    #[test]
    fn title_is_checked_before_body() {
        assert_eq!(validate_post("", ""), Some("Title is required."));
        assert_eq!(validate_post("test", ""), Some("Body is required."));
        assert_eq!(validate_post("test", "body"), None);
    }

    #[test]
    fn whitespace_only_counts_as_missing() {
        assert_eq!(validate_post("  \t", "body"), Some("Title is required."));
        assert_eq!(validate_post("title", "\n \n"), Some("Body is required."));
    }
}

use actix_web::http::StatusCode;
use html_escape::{encode_double_quoted_attribute, encode_text};
use rust_embed::RustEmbed;

use crate::core::errors::BlogError;
use crate::models::models::{Post, User};

#[derive(RustEmbed)]
#[folder = "templates"]
struct Templates;

pub struct IndexView<'a> {
    pub user: Option<&'a User>,
    pub posts: &'a [Post],
}

pub struct PostFormView<'a> {
    pub user: &'a User,
    /// `None` while creating, the stored post being edited otherwise.
    pub post: Option<&'a Post>,
    pub title: &'a str,
    pub body: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Register,
    Login,
}

impl AuthAction {
    fn label(self) -> &'static str {
        match self {
            AuthAction::Register => "Register",
            AuthAction::Login => "Log In",
        }
    }
}

pub struct AuthFormView<'a> {
    pub action: AuthAction,
    pub username: &'a str,
    pub error: Option<&'a str>,
}

pub fn render_index(view: &IndexView<'_>) -> Result<String, BlogError> {
    let post_template = load("blog/post.html")?;

    let posts: Vec<String> = view
        .posts
        .iter()
        .map(|post| {
            let owned = view.user.is_some_and(|u| u.id == post.author_id);
            let edit = if owned {
                format!(r#"<a class="action" href="/{}/update">Edit</a>"#, post.id)
            } else {
                String::new()
            };
            let created = post.created.format("%Y-%m-%d").to_string();

            fill(
                &post_template,
                &[
                    ("title", &*encode_text(&post.title)),
                    ("username", &*encode_text(&post.username)),
                    ("created", created.as_str()),
                    ("edit", edit.as_str()),
                    ("body", &*encode_text(&post.body)),
                ],
            )
        })
        .collect();

    let mut header = String::from("<h1>Posts</h1>");
    if view.user.is_some() {
        header.push_str(r#"<a class="action" href="/create">New</a>"#);
    }

    layout("Posts", view.user, &header, None, &posts.join("\n<hr>\n"))
}

pub fn render_post_form(view: &PostFormView<'_>) -> Result<String, BlogError> {
    // the heading names the stored post, not what was just submitted
    let (page_title, header, delete) = match view.post {
        None => ("New Post", "<h1>New Post</h1>".to_string(), String::new()),
        Some(post) => (
            "Edit",
            format!("<h1>Edit \"{}\"</h1>", encode_text(&post.title)),
            format!(
                r#"<hr>
<form action="/{}/delete" method="post">
  <input class="danger" type="submit" value="Delete" onclick="return confirm('Are you sure?');">
</form>"#,
                post.id
            ),
        ),
    };

    let content = fill(
        &load("blog/form.html")?,
        &[
            ("title", &*encode_double_quoted_attribute(view.title)),
            ("body", &*encode_text(view.body)),
            ("delete", delete.as_str()),
        ],
    );

    layout(page_title, Some(view.user), &header, view.error, &content)
}

pub fn render_auth_form(view: &AuthFormView<'_>) -> Result<String, BlogError> {
    let label = view.action.label();
    let content = fill(
        &load("auth/form.html")?,
        &[
            ("username", &*encode_double_quoted_attribute(view.username)),
            ("submit", label),
        ],
    );

    layout(label, None, &format!("<h1>{label}</h1>"), view.error, &content)
}

/// Renders an error page. Falls back to plain text, since this runs while
/// already handling a failure.
pub fn render_error(status: StatusCode, message: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("Error");
    let header = format!("<h1>{} {}</h1>", status.as_u16(), reason);
    let content = format!("<p>{}</p>", encode_text(message));

    layout(reason, None, &header, None, &content)
        .unwrap_or_else(|_| format!("{} {}: {}", status.as_u16(), reason, message))
}

fn layout(
    page_title: &str,
    user: Option<&User>,
    header: &str,
    flash: Option<&str>,
    content: &str,
) -> Result<String, BlogError> {
    let nav = match user {
        Some(user) => format!(
            r#"<li><span>{}</span>
      <li><a href="/auth/logout">Log out</a>"#,
            encode_text(&user.username)
        ),
        None => r#"<li><a href="/auth/register">Register</a>
      <li><a href="/auth/login">Log in</a>"#
            .to_string(),
    };
    let flash = flash
        .map(|msg| format!(r#"<div class="flash">{}</div>"#, encode_text(msg)))
        .unwrap_or_default();

    Ok(fill(
        &load("base.html")?,
        &[
            ("page_title", &*encode_text(page_title)),
            ("nav", nav.as_str()),
            ("header", header),
            ("flash", flash.as_str()),
            ("content", content),
        ],
    ))
}

fn load(name: &str) -> Result<String, BlogError> {
    let file = Templates::get(name)
        .ok_or_else(|| BlogError::Internal(format!("template {name} is not embedded")))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|e| BlogError::Internal(format!("template {name} is not utf-8: {e}")))
}

/// Substitutes `{{key}}` markers in one pass. Substituted values are never
/// scanned again, and unknown markers are left as they are.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };

        let key = after[..end].trim();
        match values.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

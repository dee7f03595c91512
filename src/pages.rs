use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use lazy_static::lazy_static;
use minijinja::{context, default_auto_escape_callback, Environment, Value};
use reqwest::Url;
use time::{macros::format_description, OffsetDateTime};
use tracing::error;

lazy_static! {
    static ref TEMPLATES: Environment<'static> = {
        let mut env = Environment::new();
        env.set_auto_escape_callback(default_auto_escape_callback);
        env.set_loader(embedded_template_loader);
        env
    };
}

fn embedded_template_loader(name: &str) -> Result<Option<String>, minijinja::Error> {
    let source = match name {
        "base.html" => Some(include_str!("../templates/base.html")),
        "login.html" => Some(include_str!("../templates/login.html")),
        "register.html" => Some(include_str!("../templates/register.html")),
        "listing.html" => Some(include_str!("../templates/listing.html")),
        "entry.html" => Some(include_str!("../templates/entry.html")),
        "new_entry.html" => Some(include_str!("../templates/new_entry.html")),
        "search.html" => Some(include_str!("../templates/search.html")),
        "403.html" => Some(include_str!("../templates/403.html")),
        "404.html" => Some(include_str!("../templates/404.html")),
        "500.html" => Some(include_str!("../templates/500.html")),
        _ => None,
    };
    Ok(source.map(str::to_string))
}

pub fn render(name: &str, ctx: Value) -> Response {
    render_with_status(StatusCode::OK, name, ctx)
}

pub fn render_with_status(status: StatusCode, name: &str, ctx: Value) -> Response {
    match TEMPLATES.get_template(name).and_then(|t| t.render(ctx)) {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!(error = %e, template = name, "template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Fixed error pages (forbidden, not found, server error).
pub fn status_page(status: StatusCode, name: &str, title: &str) -> Response {
    render_with_status(status, name, context! { title })
}

/// `<base>/<segment>` with the segment percent-encoded, so `/` and `?` stay inside it.
pub fn segment_path(base: &str, segment: &str) -> Option<String> {
    let mut url = Url::parse("http://squirrel.invalid/").ok()?.join(base).ok()?;
    url.path_segments_mut().ok()?.push(segment);
    Some(url.path().to_string())
}

/// `dd/mm/YYYY at HH:MM:SS`, the format shown next to an entry and returned by field updates.
pub fn display_timestamp(ts: OffsetDateTime) -> String {
    ts.format(format_description!(
        "[day]/[month]/[year] at [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| ts.to_string())
}

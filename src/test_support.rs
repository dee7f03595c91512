//! Request builders and response helpers for router tests.

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, request::Builder, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::{
    auth::{
        password::hash_password,
        repo_types::User,
        session::{SessionKeys, SESSION_COOKIE},
    },
    state::AppState,
};

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("router is infallible")
}

pub async fn body_text(res: Response<Body>) -> String {
    let bytes = res.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn with_cookie(builder: Builder, cookie: Option<&str>) -> Builder {
    match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    with_cookie(Request::get(uri), cookie)
        .header(header::HOST, "localhost")
        .body(Body::empty())
        .unwrap()
}

pub fn form_post(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    post_as(uri, cookie, "application/x-www-form-urlencoded", body)
}

pub fn post_as(uri: &str, cookie: Option<&str>, content_type: &str, body: &str) -> Request<Body> {
    with_cookie(Request::post(uri), cookie)
        .header(header::HOST, "localhost")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self { boundary: "squirrel-test-boundary", body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str, cookie: Option<&str>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        with_cookie(Request::post(uri), cookie)
            .header(header::HOST, "localhost")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

pub fn location(res: &Response<Body>) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn set_cookies(res: &Response<Body>) -> Vec<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Creates a user named after the email's local part and returns a
/// `Cookie` header value carrying their session.
pub async fn sign_in(state: &AppState, email: &str) -> (User, String) {
    let username = email.split('@').next().unwrap_or("user");
    let hash = hash_password("hazelnut").unwrap();
    let user = state
        .users
        .create(username, email, &hash)
        .await
        .unwrap()
        .expect("fresh email");
    let cookie = SessionKeys::from_ref(state).login_cookie(user.id, false).unwrap();
    (user, format!("{SESSION_COOKIE}={}", cookie.value()))
}

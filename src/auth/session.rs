use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    auth::repo_types::Principal,
    config::SessionConfig,
    error::AppError,
    flash::{self, Flash},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "squirrel_session";

/// Browser sessions end with the browser; remembered ones outlive it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Browser,
    Remembered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: SessionKind,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    browser_ttl: Duration,
    remember_ttl: Duration,
    secure: bool,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            remember_ttl_days,
            secure_cookies,
        } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            browser_ttl: Duration::from_secs(ttl_minutes.max(1) as u64 * 60),
            remember_ttl: Duration::from_secs(remember_ttl_days.max(1) as u64 * 24 * 60 * 60),
            secure: secure_cookies,
        }
    }
}

impl SessionKeys {
    pub fn sign(&self, user_id: Uuid, kind: SessionKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            SessionKind::Browser => self.browser_ttl,
            SessionKind::Remembered => self.remember_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "session signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Session cookie for a freshly authenticated user. Without `remember`
    /// the cookie carries no Max-Age and dies with the browser session.
    pub fn login_cookie(&self, user_id: Uuid, remember: bool) -> anyhow::Result<Cookie<'static>> {
        let kind = if remember {
            SessionKind::Remembered
        } else {
            SessionKind::Browser
        };
        let token = self.sign(user_id, kind)?;
        let mut cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax);
        if remember {
            cookie = cookie.max_age(TimeDuration::seconds(self.remember_ttl.as_secs() as i64));
        }
        Ok(cookie.build())
    }
}

/// Adds a session cookie for `user_id` to the jar.
pub fn establish(
    jar: CookieJar,
    state: &AppState,
    user_id: Uuid,
    remember: bool,
) -> Result<CookieJar, AppError> {
    let cookie = SessionKeys::from_ref(state).login_cookie(user_id, remember)?;
    Ok(jar.add(cookie))
}

pub fn clear(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

async fn resolve_principal(
    parts: &Parts,
    state: &AppState,
) -> anyhow::Result<Option<Principal>> {
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        return Ok(None);
    };
    let claims = match SessionKeys::from_ref(state).verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "ignoring invalid session cookie");
            return Ok(None);
        }
    };
    let user = state.users.find_by_id(claims.sub).await?;
    Ok(user.map(Principal::from))
}

/// `/login?next=<target>` with the target query-encoded.
pub fn login_redirect_url(target: &str) -> String {
    let Ok(mut url) = Url::parse("http://squirrel.invalid/login") else {
        return "/login".into();
    };
    url.query_pairs_mut().append_pair("next", target);
    match url.query() {
        Some(query) => format!("/login?{query}"),
        None => "/login".into(),
    }
}

/// Principal required. Anonymous requests are sent to the login page with
/// the original target in `next`.
pub struct CurrentUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_principal(parts, state).await {
            Ok(Some(principal)) => Ok(CurrentUser(principal)),
            Ok(None) => {
                let target = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_owned())
                    .unwrap_or_else(|| "/listing".into());
                let jar = flash::push(
                    CookieJar::from_headers(&parts.headers),
                    Flash::info("Please log in to access this page."),
                );
                Err((jar, Redirect::to(&login_redirect_url(&target))).into_response())
            }
            Err(e) => {
                error!(error = %e, "session lookup failed");
                Err(AppError::Internal(e).into_response())
            }
        }
    }
}

/// Principal if the request carries a valid session.
pub struct MaybeUser(pub Option<Principal>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_principal(parts, state)
            .await
            .map(MaybeUser)
            .map_err(|e| AppError::Internal(e).into_response())
    }
}

use axum::{
    extract::{Query, State},
    http::{header::HOST, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginForm, NextQuery, RegisterForm},
        redirect::is_safe_url,
        services,
        session::{self, MaybeUser},
    },
    error::AppError,
    flash::{self, Flash},
    pages,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(login_page).post(login))
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", get(logout))
}

fn login_form(jar: CookieJar, email: &str, error: Option<String>) -> Response {
    let (jar, mut flashes) = flash::take(jar);
    flashes.extend(error.map(Flash::danger));
    let page = pages::render("login.html", context! { title => "Login", flashes, email });
    (jar, page).into_response()
}

fn register_form(jar: CookieJar, form: &RegisterForm, error: Option<String>) -> Response {
    let (jar, mut flashes) = flash::take(jar);
    flashes.extend(error.map(Flash::danger));
    let page = pages::render(
        "register.html",
        context! {
            title => "Registration",
            flashes,
            form_username => form.username,
            email => form.email,
        },
    );
    (jar, page).into_response()
}

#[instrument(skip_all)]
pub async fn login_page(MaybeUser(user): MaybeUser, jar: CookieJar) -> Response {
    if user.is_some() {
        return Redirect::to("/listing").into_response();
    }
    login_form(jar, "", None)
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(mut form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/listing").into_response());
    }

    form.normalize();
    if let Err(message) = form.validate() {
        return Ok(login_form(jar, &form.email, Some(message)));
    }

    let user = match services::authenticate(state.users.as_ref(), &form.email, &form.password).await
    {
        Ok(user) => user,
        Err(AppError::InvalidCredentials) => {
            return Ok(login_form(
                jar,
                &form.email,
                Some("Login unsucessful, please check email and password.".into()),
            ));
        }
        Err(e) => return Err(e),
    };

    let jar = session::establish(jar, &state, user.id, form.remember)?;
    let jar = flash::push(jar, Flash::success(format!("Welcome to squirrel, {}.", user.username)));

    let host = headers.get(HOST).and_then(|h| h.to_str().ok());
    let target = match query.next.as_deref() {
        Some(next) if is_safe_url(next, host) => next.trim().to_string(),
        _ => "/listing".to_string(),
    };

    info!(user_id = %user.id, remember = form.remember, "user logged in");
    Ok((jar, Redirect::to(&target)).into_response())
}

#[instrument(skip_all)]
pub async fn register_page(MaybeUser(user): MaybeUser, jar: CookieJar) -> Response {
    if user.is_some() {
        return Redirect::to("/listing").into_response();
    }
    register_form(jar, &RegisterForm::default(), None)
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    jar: CookieJar,
    Form(mut form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/listing").into_response());
    }

    form.normalize();
    if let Err(message) = form.validate() {
        return Ok(register_form(jar, &form, Some(message)));
    }

    let user = match services::register(state.users.as_ref(), &form).await {
        Ok(user) => user,
        Err(AppError::DuplicateEmail) => {
            return Ok(register_form(
                jar,
                &form,
                Some("Something went wrong with the information provided.".into()),
            ));
        }
        Err(e) => return Err(e),
    };

    let jar = session::establish(jar, &state, user.id, false)?;
    let jar = flash::push(jar, Flash::success(format!("Account created for {}.", user.username)));
    Ok((jar, Redirect::to("/listing")).into_response())
}

#[instrument(skip_all)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = flash::push(session::clear(jar), Flash::success("Sucessfully logged out."));
    (jar, Redirect::to("/login"))
}

#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};

    use crate::{
        app::build_app,
        auth::session::SESSION_COOKIE,
        state::AppState,
        test_support::{body_text, form_post, get, location, send, set_cookies, sign_in},
    };

    const REGISTRATION: &str =
        "username=ana&email=Ana%40example.com&password=hazelnut&confirm_password=hazelnut";

    #[tokio::test]
    async fn register_logs_in_and_redirects_to_listing() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let res = send(&app, form_post("/register", None, REGISTRATION)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/listing");
        assert!(set_cookies(&res).iter().any(|c| c.starts_with(SESSION_COOKIE)));

        let stored = state.users.find_by_email("ana@example.com").await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn duplicate_registration_rerenders_form() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        send(&app, form_post("/register", None, REGISTRATION)).await;

        let res = send(&app, form_post("/register", None, REGISTRATION)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_text(res).await;
        assert!(body.contains("Something went wrong with the information provided."));
    }

    #[tokio::test]
    async fn login_with_wrong_password_shows_message() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        send(&app, form_post("/register", None, REGISTRATION)).await;

        let res = send(
            &app,
            form_post("/login", None, "email=ana%40example.com&password=walnut"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(res).await.contains("Login unsucessful"));
    }

    #[tokio::test]
    async fn login_follows_safe_next_and_ignores_foreign_one() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        send(&app, form_post("/register", None, REGISTRATION)).await;
        let creds = "email=ana%40example.com&password=hazelnut&remember=y";

        let res = send(&app, form_post("/login?next=%2Flisting%2Framen", None, creds)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/listing/ramen");
        let session = set_cookies(&res)
            .into_iter()
            .find(|c| c.starts_with(SESSION_COOKIE))
            .expect("session cookie");
        assert!(session.contains("Max-Age"));

        let res = send(
            &app,
            form_post("/login?next=https%3A%2F%2Fevil.com%2F", None, creds),
        )
        .await;
        assert_eq!(location(&res), "/listing");
    }

    #[tokio::test]
    async fn authenticated_user_is_bounced_from_login_and_register() {
        let state = AppState::fake();
        let (_, cookie) = sign_in(&state, "bo@example.com").await;
        let app = build_app(state);

        for path in ["/", "/login", "/register"] {
            let res = send(&app, get(path, Some(cookie.as_str()))).await;
            assert_eq!(res.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(location(&res), "/listing");
        }
    }

    #[tokio::test]
    async fn logout_clears_session_and_redirects() {
        let state = AppState::fake();
        let (_, cookie) = sign_in(&state, "bo@example.com").await;
        let app = build_app(state);

        let res = send(&app, get("/logout", Some(cookie.as_str()))).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");
        let cleared = set_cookies(&res)
            .into_iter()
            .find(|c| c.starts_with(SESSION_COOKIE))
            .expect("session cookie removal");
        assert!(cleared.contains("Max-Age=0"));
        assert!(res.headers().get(header::LOCATION).is_some());
    }
}

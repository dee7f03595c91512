use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::{context, Value};
use tracing::{info, instrument};

use crate::{
    auth::{repo_types::Principal, session::CurrentUser},
    entries::{
        dto::{
            DescriptionForm, EntryView, FavForm, FieldForm, FieldRejected, FieldUpdated, NameForm,
            NewEntryForm, PageQuery, RatingForm, SearchForm, TagsForm,
        },
        pagination::parse_page,
        repo_types::{EntryFilter, FieldUpdate},
        services,
    },
    error::AppError,
    flash::{self, Flash},
    images::services::{upload_image, UploadItem},
    pages,
    state::AppState,
};

const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/listing", get(listing))
        .route("/listing/:tag", get(listing_tag))
        .route("/entry/:id", get(entry_detail))
        .route("/search/", post(search_submit))
        .route("/search/:term", get(search_results).post(search_results))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/update_fav/:id", post(update_fav))
        .route("/update_name/:id", post(update_name))
        .route("/update_description/:id", post(update_description))
        .route("/update_rating/:id", post(update_rating))
        .route("/update_tags/:id", post(update_tags))
        .route("/update_image/:id", post(update_image))
        .route("/add", get(new_entry_page).post(new_entry))
        .route("/delete/:id", get(delete_entry))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
}

/// Renders an authenticated page, draining pending flashes.
fn page(jar: CookieJar, user: &Principal, template: &str, title: &str, extra: Value) -> Response {
    let (jar, flashes) = flash::take(jar);
    let body = pages::render(
        template,
        context! { title, flashes, username => user.username, ..extra },
    );
    (jar, body).into_response()
}

fn search_path(term: &str) -> Option<String> {
    pages::segment_path("/search", term)
}

async fn show_listing(
    state: AppState,
    user: Principal,
    jar: CookieJar,
    uri: Uri,
    tag: Option<String>,
    query: PageQuery,
) -> Result<Response, AppError> {
    let filter = EntryFilter { user_id: user.id, tag };
    let page_no = parse_page(query.page.as_deref());
    let listing = services::list_page(state.entries.as_ref(), &filter, page_no).await?;

    let path = uri.path();
    let entries: Vec<EntryView> = listing.entries.iter().map(EntryView::from).collect();
    Ok(page(
        jar,
        &user,
        "listing.html",
        "Listing",
        context! {
            entries,
            tag => filter.tag,
            entry_count => listing.total,
            next_url => listing.window.next_url(path),
            prev_url => listing.window.prev_url(path),
        },
    ))
}

#[instrument(skip_all)]
pub async fn listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
    uri: Uri,
    jar: CookieJar,
) -> Result<Response, AppError> {
    show_listing(state, user, jar, uri, None, query).await
}

#[instrument(skip_all)]
pub async fn listing_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tag): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
    jar: CookieJar,
) -> Result<Response, AppError> {
    show_listing(state, user, jar, uri, Some(tag), query).await
}

#[instrument(skip_all)]
pub async fn entry_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let id = services::parse_entry_id(&id)?;
    let entry = services::load_owned(state.entries.as_ref(), id, user.id).await?;
    let view = EntryView::from(&entry);
    Ok(page(
        jar,
        &user,
        "entry.html",
        "Entry",
        context! {
            rating => entry.rating.to_string(),
            hidden_tags => view.hidden_tags,
            entry => view,
        },
    ))
}

/// Ownership first, then the body is read and validated, then the write.
async fn apply_update<F: FieldForm>(
    state: &AppState,
    user: &Principal,
    raw_id: &str,
    request: Request,
    success_message: &str,
    message_class: &str,
) -> Result<Response, AppError> {
    let id = services::parse_entry_id(raw_id)?;
    let entry = services::load_owned(state.entries.as_ref(), id, user.id).await?;
    let update = match Form::<F>::from_request(request, state).await {
        Ok(Form(form)) => form.into_update(),
        Err(rejection) => Err(rejection.body_text()),
    };
    let update = match update {
        Ok(update) => update,
        Err(message) => return Ok(FieldRejected::new(message).into_response()),
    };
    let at = services::update_field(state.entries.as_ref(), &entry, update).await?;
    Ok(Json(FieldUpdated {
        updated_on: pages::display_timestamp(at),
        success_message: success_message.to_string(),
        message_class: message_class.to_string(),
        new_image: None,
    })
    .into_response())
}

#[instrument(skip_all)]
pub async fn update_fav(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    apply_update::<FavForm>(
        &state,
        &user,
        &id,
        request,
        "Review sucessfully updated.",
        "alert-success",
    )
    .await
}

#[instrument(skip_all)]
pub async fn update_name(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    apply_update::<NameForm>(&state, &user, &id, request, "Name sucessfully updated.", "valid-update")
        .await
}

#[instrument(skip_all)]
pub async fn update_description(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    apply_update::<DescriptionForm>(
        &state,
        &user,
        &id,
        request,
        "Description sucessfully updated.",
        "valid-update",
    )
    .await
}

#[instrument(skip_all)]
pub async fn update_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    apply_update::<RatingForm>(&state, &user, &id, request, "Rating sucessfully updated.", "valid-update")
        .await
}

#[instrument(skip_all)]
pub async fn update_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    apply_update::<TagsForm>(&state, &user, &id, request, "Tags sucessfully updated.", "valid-update")
        .await
}

#[instrument(skip_all)]
pub async fn update_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let id = services::parse_entry_id(&id)?;
    let entry = services::load_owned(state.entries.as_ref(), id, user.id).await?;
    let mut multipart = match Multipart::from_request(request, &state).await {
        Ok(multipart) => multipart,
        Err(rejection) => return Ok(FieldRejected::new(rejection.body_text()).into_response()),
    };

    let mut item = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        match UploadItem::from_field(field).await {
            Ok(found) => item = found,
            Err(AppError::Validation(message)) => {
                return Ok(FieldRejected::new(message).into_response())
            }
            Err(e) => return Err(e),
        }
        break;
    }
    let Some(item) = item else {
        return Ok(FieldRejected::new("Please choose an image to upload.").into_response());
    };

    let url = upload_image(state.images.as_ref(), item).await?;
    let at =
        services::update_field(state.entries.as_ref(), &entry, FieldUpdate::Image(url.clone()))
            .await?;
    Ok(Json(FieldUpdated {
        updated_on: pages::display_timestamp(at),
        success_message: "Image sucessfully updated.".into(),
        message_class: "valid-update".into(),
        new_image: Some(url),
    })
    .into_response())
}

fn new_entry_form(
    jar: CookieJar,
    user: &Principal,
    form: &NewEntryForm,
    error: Option<String>,
) -> Response {
    let (jar, mut flashes) = flash::take(jar);
    flashes.extend(error.map(Flash::danger));
    let body = pages::render(
        "new_entry.html",
        context! {
            title => "New Entry",
            flashes,
            username => user.username,
            name => form.name,
            description => form.description,
            rating => form.rating,
            is_fav => form.is_fav,
            hidden_tags => form.hidden_tags,
        },
    );
    (jar, body).into_response()
}

#[instrument(skip_all)]
pub async fn new_entry_page(CurrentUser(user): CurrentUser, jar: CookieJar) -> Response {
    let form = NewEntryForm::with_rating("3");
    new_entry_form(jar, &user, &form, None)
}

#[instrument(skip_all)]
pub async fn new_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = NewEntryForm::from_multipart(multipart).await?;
    if let Err(message) = form.validate() {
        return Ok(new_entry_form(jar, &user, &form, Some(message)));
    }

    let name = form.name.clone();
    let id = services::create_entry(state.entries.as_ref(), state.images.as_ref(), user.id, form)
        .await?;
    let jar = flash::push(jar, Flash::success(format!("Review for “{name}” created successfully.")));
    Ok((jar, Redirect::to(&format!("/entry/{id}"))).into_response())
}

#[instrument(skip_all)]
pub async fn delete_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let id = services::parse_entry_id(&id)?;
    let entry = services::load_owned(state.entries.as_ref(), id, user.id).await?;
    services::delete_entry(state.entries.as_ref(), &entry).await?;

    let jar = flash::push(jar, Flash::success(format!("Review for “{}” was deleted.", entry.name)));
    Ok((jar, Redirect::to("/listing")).into_response())
}

#[instrument(skip_all)]
pub async fn search_submit(
    CurrentUser(_user): CurrentUser,
    Form(form): Form<SearchForm>,
) -> Redirect {
    let term = form.search_field.trim();
    match search_path(term) {
        Some(path) if !term.is_empty() => Redirect::to(&path),
        _ => Redirect::to("/listing"),
    }
}

#[instrument(skip_all)]
pub async fn search_results(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(term): Path<String>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let found = services::search(state.entries.as_ref(), user.id, &term).await?;
    info!(user_id = %user.id, hits = found.len(), "search");

    let entries: Vec<EntryView> = found.iter().map(EntryView::from).collect();
    Ok(page(
        jar,
        &user,
        "search.html",
        &format!("Results for {term}"),
        context! { num_entries => entries.len(), entries, search_term => term },
    ))
}

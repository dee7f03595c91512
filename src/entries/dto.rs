use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    entries::{
        repo_types::{Entry, FieldUpdate},
        tags::{join_tags, normalize_tags},
    },
    error::AppError,
    forms::{checkbox, checkbox_value, length_between},
    images::services::UploadItem,
    pages::{display_timestamp, segment_path},
};

pub const NAME_MAX: usize = 30;
pub const DESCRIPTION_MAX: usize = 2000;
pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 5;

fn validate_name(name: &str) -> Result<(), String> {
    if length_between(name, 1, NAME_MAX) {
        Ok(())
    } else {
        Err(format!("Name must be between 1 and {NAME_MAX} characters."))
    }
}

fn validate_description(description: &str) -> Result<(), String> {
    if length_between(description, 1, DESCRIPTION_MAX) {
        Ok(())
    } else {
        Err(format!(
            "Description must be between 1 and {DESCRIPTION_MAX} characters."
        ))
    }
}

pub fn parse_rating(raw: &str) -> Result<i32, String> {
    match raw.trim().parse::<i32>() {
        Ok(r) if (RATING_MIN..=RATING_MAX).contains(&r) => Ok(r),
        _ => Err(format!(
            "Rating must be a whole number from {RATING_MIN} to {RATING_MAX}."
        )),
    }
}

/// Multipart body of `POST /add`.
#[derive(Debug, Default)]
pub struct NewEntryForm {
    pub name: String,
    pub description: String,
    pub rating: String,
    pub is_fav: bool,
    pub hidden_tags: String,
    pub image: Option<UploadItem>,
    image_error: Option<String>,
}

impl NewEntryForm {
    /// Blank form with a preselected rating.
    pub fn with_rating(rating: impl Into<String>) -> Self {
        Self { rating: rating.into(), ..Self::default() }
    }

    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "image" {
                match UploadItem::from_field(field).await {
                    Ok(item) => form.image = item,
                    Err(AppError::Validation(message)) => form.image_error = Some(message),
                    Err(e) => return Err(e),
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            match name.as_str() {
                "name" => form.name = value,
                "description" => form.description = value,
                "rating" => form.rating = value,
                "is_fav" => form.is_fav = checkbox_value(&value),
                "hidden_tags" => form.hidden_tags = value,
                _ => {}
            }
        }
        Ok(form)
    }

    /// First violation, in form order.
    pub fn validate(&self) -> Result<i32, String> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        let rating = parse_rating(&self.rating)?;
        if let Some(message) = &self.image_error {
            return Err(message.clone());
        }
        Ok(rating)
    }
}

/// Urlencoded body of one in-place field update.
pub trait FieldForm: DeserializeOwned + Send {
    fn into_update(self) -> Result<FieldUpdate, String>;
}

#[derive(Debug, Deserialize)]
pub struct FavForm {
    #[serde(default, deserialize_with = "checkbox")]
    pub is_fav: bool,
}

impl FieldForm for FavForm {
    fn into_update(self) -> Result<FieldUpdate, String> {
        Ok(FieldUpdate::Favorite(self.is_fav))
    }
}

#[derive(Debug, Deserialize)]
pub struct NameForm {
    #[serde(default)]
    pub name: String,
}

impl FieldForm for NameForm {
    fn into_update(self) -> Result<FieldUpdate, String> {
        validate_name(&self.name)?;
        Ok(FieldUpdate::Name(self.name))
    }
}

#[derive(Debug, Deserialize)]
pub struct DescriptionForm {
    #[serde(default)]
    pub description: String,
}

impl FieldForm for DescriptionForm {
    fn into_update(self) -> Result<FieldUpdate, String> {
        validate_description(&self.description)?;
        Ok(FieldUpdate::Description(self.description))
    }
}

#[derive(Debug, Deserialize)]
pub struct RatingForm {
    #[serde(default)]
    pub rating: String,
}

impl FieldForm for RatingForm {
    fn into_update(self) -> Result<FieldUpdate, String> {
        parse_rating(&self.rating).map(FieldUpdate::Rating)
    }
}

#[derive(Debug, Deserialize)]
pub struct TagsForm {
    #[serde(default)]
    pub tags: String,
}

impl FieldForm for TagsForm {
    /// Empty input clears the tags.
    fn into_update(self) -> Result<FieldUpdate, String> {
        Ok(FieldUpdate::Tags(normalize_tags(&self.tags)))
    }
}

/// Success payload of the in-place field updates.
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldUpdated {
    pub updated_on: String,
    pub success_message: String,
    pub message_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldRejected {
    pub error_message: String,
    pub message_class: String,
}

impl FieldRejected {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            message_class: "invalid-update".into(),
        }
    }
}

impl IntoResponse for FieldRejected {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(self)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub search_field: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TagLink {
    pub name: String,
    pub href: String,
}

impl TagLink {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            href: segment_path("/listing", name).unwrap_or_else(|| "/listing".into()),
        }
    }
}

/// Template-facing shape of an entry, timestamps already formatted.
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rating: i32,
    pub is_fav: bool,
    pub image: String,
    pub tags: Vec<TagLink>,
    pub hidden_tags: String,
    pub created_on: String,
    pub updated_on: Option<String>,
    pub sort_date: String,
}

impl From<&Entry> for EntryView {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id.to_string(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            rating: entry.rating,
            is_fav: entry.is_fav,
            image: entry.image.clone(),
            tags: entry.tags.iter().flatten().map(|t| TagLink::new(t)).collect(),
            hidden_tags: join_tags(entry.tags.as_deref()),
            created_on: display_timestamp(entry.created_on),
            updated_on: entry.updated_on.map(display_timestamp),
            sort_date: display_timestamp(entry.effective_timestamp()),
        }
    }
}

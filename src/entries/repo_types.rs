use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A review document owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub rating: i32,
    pub is_fav: bool,
    pub image: String,
    pub tags: Option<Vec<String>>, // NULL when the entry has no tags
    pub created_on: OffsetDateTime,
    pub updated_on: Option<OffsetDateTime>, // NULL until the first mutation
}

impl Entry {
    /// Sort key for listings.
    pub fn effective_timestamp(&self) -> OffsetDateTime {
        self.updated_on.unwrap_or(self.created_on)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ScoredEntry {
    #[sqlx(flatten)]
    pub entry: Entry,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub rating: i32,
    pub is_fav: bool,
    pub image: String,
    pub tags: Option<Vec<String>>,
}

/// One validated single-field mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Favorite(bool),
    Name(String),
    Description(String),
    Rating(i32),
    Tags(Option<Vec<String>>),
    Image(String),
}

/// Listing filter: one owner, optionally one tag.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    pub user_id: Uuid,
    pub tag: Option<String>,
}

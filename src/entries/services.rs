use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    entries::{
        dto::NewEntryForm,
        pagination::{PageWindow, PAGE_SIZE},
        repo::EntryRepo,
        repo_types::{Entry, EntryFilter, FieldUpdate, NewEntry},
        tags::normalize_tags,
    },
    error::AppError,
    images::{host::ImageHost, services::resolve_image},
};

/// Malformed ids can never match a stored entry.
pub fn parse_entry_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

/// Loads an entry for `owner`; someone else's entry is `Forbidden`.
pub async fn load_owned(entries: &dyn EntryRepo, id: Uuid, owner: Uuid) -> Result<Entry, AppError> {
    let entry = entries.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    if entry.user_id != owner {
        warn!(entry_id = %id, user_id = %owner, "access to foreign entry refused");
        return Err(AppError::Forbidden);
    }
    Ok(entry)
}

pub async fn create_entry(
    entries: &dyn EntryRepo,
    images: &dyn ImageHost,
    owner: Uuid,
    form: NewEntryForm,
) -> Result<Uuid, AppError> {
    let rating = form.validate().map_err(AppError::Validation)?;
    let image = resolve_image(images, form.image).await?;

    let id = entries
        .insert(NewEntry {
            user_id: owner,
            name: form.name,
            description: form.description,
            rating,
            is_fav: form.is_fav,
            image,
            tags: normalize_tags(&form.hidden_tags),
        })
        .await?;

    info!(entry_id = %id, user_id = %owner, "entry created");
    Ok(id)
}

/// Applies one field change to an entry already loaded through [`load_owned`].
/// Returns the new `updated_on`.
pub async fn update_field(
    entries: &dyn EntryRepo,
    entry: &Entry,
    update: FieldUpdate,
) -> Result<OffsetDateTime, AppError> {
    let at = OffsetDateTime::now_utc();
    if !entries.update_field(entry.id, entry.user_id, update, at).await? {
        // deleted between load and update
        return Err(AppError::NotFound);
    }
    info!(entry_id = %entry.id, "entry updated");
    Ok(at)
}

pub async fn delete_entry(entries: &dyn EntryRepo, entry: &Entry) -> Result<(), AppError> {
    if !entries.delete(entry.id, entry.user_id).await? {
        return Err(AppError::NotFound);
    }
    info!(entry_id = %entry.id, user_id = %entry.user_id, "entry deleted");
    Ok(())
}

pub struct ListingPage {
    pub entries: Vec<Entry>,
    pub window: PageWindow,
    pub total: i64,
}

pub async fn list_page(
    entries: &dyn EntryRepo,
    filter: &EntryFilter,
    page: i64,
) -> Result<ListingPage, AppError> {
    let total = entries.count_matching(filter).await?;
    let window = PageWindow::new(total, PAGE_SIZE, page)?;
    let rows = if total == 0 {
        Vec::new()
    } else {
        entries
            .page_matching(filter, window.limit, window.offset)
            .await?
    };
    Ok(ListingPage { entries: rows, window, total })
}

/// Owner's entries matching `term`, best match first.
pub async fn search(entries: &dyn EntryRepo, owner: Uuid, term: &str) -> Result<Vec<Entry>, AppError> {
    let hits = entries.search(owner, term).await?;
    Ok(hits.into_iter().map(|hit| hit.entry).collect())
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use super::*;
    use crate::{
        entries::repo::MemoryEntryRepo,
        images::services::{FakeImageHost, UploadItem, PLACEHOLDER_IMAGE},
    };

    fn form(name: &str) -> NewEntryForm {
        let mut form = NewEntryForm::with_rating("3");
        form.name = name.into();
        form.description = format!("{name} review");
        form
    }

    async fn seed(repo: &MemoryEntryRepo, owner: Uuid, name: &str) -> Uuid {
        create_entry(repo, &FakeImageHost, owner, form(name)).await.unwrap()
    }

    #[tokio::test]
    async fn creation_resolves_image_and_tags() {
        let repo = MemoryEntryRepo::default();
        let owner = Uuid::new_v4();

        let mut plain = form("Pho");
        plain.hidden_tags = "Soup,SOUP,noodles".into();
        let id = create_entry(&repo, &FakeImageHost, owner, plain).await.unwrap();
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.image, PLACEHOLDER_IMAGE);
        assert_eq!(stored.tags, Some(vec!["soup".into(), "noodles".into()]));
        assert!(stored.updated_on.is_none());

        let mut with_image = form("Ramen");
        with_image.image = Some(UploadItem {
            body: bytes::Bytes::from_static(b"png"),
            content_type: "image/png".into(),
            file_name: "ramen.png".into(),
        });
        let id = create_entry(&repo, &FakeImageHost, owner, with_image).await.unwrap();
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.image, "https://res.cloudinary.test/squirrel/ramen.png");
        assert_eq!(stored.tags, None);
    }

    #[tokio::test]
    async fn invalid_form_is_rejected_before_insert() {
        let repo = MemoryEntryRepo::default();
        let owner = Uuid::new_v4();
        let mut bad = form("Pho");
        bad.rating = "7".into();

        let err = create_entry(&repo, &FakeImageHost, owner, bad).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let filter = EntryFilter { user_id: owner, tag: None };
        assert_eq!(repo.count_matching(&filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn foreign_entry_is_forbidden_and_unchanged() {
        let repo = MemoryEntryRepo::default();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let id = seed(&repo, alice, "Pho").await;

        let err = load_owned(&repo, id, bob).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        // the store itself refuses a mismatched owner
        let touched = repo
            .update_field(id, bob, FieldUpdate::Name("Hijacked".into()), OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(!touched);
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Pho");
        assert!(stored.updated_on.is_none());

        assert!(matches!(
            load_owned(&repo, Uuid::new_v4(), alice).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_stamps_updated_on() {
        let repo = MemoryEntryRepo::default();
        let owner = Uuid::new_v4();
        let id = seed(&repo, owner, "Pho").await;

        let entry = load_owned(&repo, id, owner).await.unwrap();
        let at = update_field(&repo, &entry, FieldUpdate::Rating(5)).await.unwrap();
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.rating, 5);
        assert_eq!(stored.updated_on, Some(at));
    }

    #[tokio::test]
    async fn paginates_twenty_five_entries() {
        let repo = MemoryEntryRepo::default();
        let owner = Uuid::new_v4();
        for i in 0..25 {
            seed(&repo, owner, &format!("Entry {i}")).await;
        }
        let filter = EntryFilter { user_id: owner, tag: None };

        let first = list_page(&repo, &filter, 1).await.unwrap();
        assert_eq!(first.total, 25);
        assert_eq!(first.entries.len(), 12);
        assert_eq!(first.window.max_page, 3);

        let last = list_page(&repo, &filter, 3).await.unwrap();
        assert_eq!(last.entries.len(), 1);

        assert!(matches!(list_page(&repo, &filter, 4).await, Err(AppError::PageNotFound)));
        assert!(matches!(list_page(&repo, &filter, 0).await, Err(AppError::PageNotFound)));
    }

    #[tokio::test]
    async fn empty_listing_accepts_any_page() {
        let repo = MemoryEntryRepo::default();
        let filter = EntryFilter { user_id: Uuid::new_v4(), tag: None };
        let page = list_page(&repo, &filter, 5).await.unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn tag_filter_limits_listing() {
        let repo = MemoryEntryRepo::default();
        let owner = Uuid::new_v4();
        let mut tagged = form("Pho");
        tagged.hidden_tags = "soup".into();
        create_entry(&repo, &FakeImageHost, owner, tagged).await.unwrap();
        seed(&repo, owner, "Burger").await;

        let filter = EntryFilter { user_id: owner, tag: Some("soup".into()) };
        let page = list_page(&repo, &filter, 1).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].name, "Pho");
    }

    #[tokio::test]
    async fn listing_orders_by_effective_timestamp() {
        let repo = MemoryEntryRepo::default();
        let owner = Uuid::new_v4();
        let older = seed(&repo, owner, "Older").await;
        seed(&repo, owner, "Newer").await;
        let filter = EntryFilter { user_id: owner, tag: None };

        // an update dated before the other entry's creation still becomes the sort key
        repo.update_field(older, owner, FieldUpdate::Favorite(true), datetime!(2000-01-01 0:00 UTC))
            .await
            .unwrap();
        let names: Vec<String> = list_page(&repo, &filter, 1)
            .await
            .unwrap()
            .entries
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["Newer", "Older"]);

        let later = OffsetDateTime::now_utc() + Duration::hours(1);
        repo.update_field(older, owner, FieldUpdate::Favorite(false), later)
            .await
            .unwrap();
        let names: Vec<String> = list_page(&repo, &filter, 1)
            .await
            .unwrap()
            .entries
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["Older", "Newer"]);
    }

    #[tokio::test]
    async fn search_is_scoped_to_owner_and_ranked() {
        let repo = MemoryEntryRepo::default();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let mut strong = form("Ramen house");
        strong.description = "Best ramen, rich ramen broth".into();
        create_entry(&repo, &FakeImageHost, alice, strong).await.unwrap();
        let mut weak = form("Noodle bar");
        weak.hidden_tags = "ramen".into();
        create_entry(&repo, &FakeImageHost, alice, weak).await.unwrap();
        seed(&repo, alice, "Taco stand").await;
        seed(&repo, bob, "Ramen shop").await;

        let hits = search(&repo, alice, "ramen").await.unwrap();
        let names: Vec<&str> = hits.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Ramen house", "Noodle bar"]);
        assert!(hits.iter().all(|e| e.user_id == alice));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let repo = MemoryEntryRepo::default();
        let owner = Uuid::new_v4();
        let id = seed(&repo, owner, "Pho").await;
        let entry = load_owned(&repo, id, owner).await.unwrap();

        delete_entry(&repo, &entry).await.unwrap();
        assert!(repo.find_by_id(id).await.unwrap().is_none());
        assert!(matches!(delete_entry(&repo, &entry).await, Err(AppError::NotFound)));
    }
}

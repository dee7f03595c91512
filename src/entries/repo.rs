use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

use crate::entries::repo_types::{Entry, EntryFilter, FieldUpdate, NewEntry, ScoredEntry};

/// Storage of review documents. Ownership is part of every mutating
/// statement so a mismatched owner never touches a row.
#[async_trait]
pub trait EntryRepo: Send + Sync {
    /// Assigns id and creation time, returns the id.
    async fn insert(&self, entry: NewEntry) -> anyhow::Result<Uuid>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Entry>>;

    /// Applies `update` and stamps `updated_on = at`. `false` when no entry
    /// with that id belongs to `owner`.
    async fn update_field(
        &self,
        id: Uuid,
        owner: Uuid,
        update: FieldUpdate,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    async fn delete(&self, id: Uuid, owner: Uuid) -> anyhow::Result<bool>;

    async fn count_matching(&self, filter: &EntryFilter) -> anyhow::Result<i64>;

    /// Newest effective timestamp first.
    async fn page_matching(
        &self,
        filter: &EntryFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Entry>>;

    /// Full-text search over one owner's entries, best match first.
    async fn search(&self, owner: Uuid, term: &str) -> anyhow::Result<Vec<ScoredEntry>>;
}

const ENTRY_COLUMNS: &str =
    "id, user_id, name, description, rating, is_fav, image, tags, created_on, updated_on";

pub struct PgEntryRepo {
    db: PgPool,
    search_index: OnceCell<()>,
}

impl PgEntryRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db, search_index: OnceCell::new() }
    }

    /// Creates the text index on first use. Idempotent.
    async fn ensure_search_index(&self) -> anyhow::Result<()> {
        self.search_index
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS entries_search_idx
                    ON entries USING GIN (entry_search_document(name, description, tags))
                    "#,
                )
                .execute(&self.db)
                .await
                .context("create search index")?;
                info!("search index ready");
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EntryRepo for PgEntryRepo {
    async fn insert(&self, entry: NewEntry) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO entries
                (id, user_id, name, description, rating, is_fav, image, tags, created_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(entry.user_id)
        .bind(entry.name)
        .bind(entry.description)
        .bind(entry.rating)
        .bind(entry.is_fav)
        .bind(entry.image)
        .bind(entry.tags)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db)
        .await
        .context("insert entry")?;
        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Entry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1");
        let entry = sqlx::query_as::<_, Entry>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find entry by id")?;
        Ok(entry)
    }

    async fn update_field(
        &self,
        id: Uuid,
        owner: Uuid,
        update: FieldUpdate,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let sql = match &update {
            FieldUpdate::Favorite(_) => {
                "UPDATE entries SET is_fav = $1, updated_on = $2 WHERE id = $3 AND user_id = $4"
            }
            FieldUpdate::Name(_) => {
                "UPDATE entries SET name = $1, updated_on = $2 WHERE id = $3 AND user_id = $4"
            }
            FieldUpdate::Description(_) => {
                "UPDATE entries SET description = $1, updated_on = $2 WHERE id = $3 AND user_id = $4"
            }
            FieldUpdate::Rating(_) => {
                "UPDATE entries SET rating = $1, updated_on = $2 WHERE id = $3 AND user_id = $4"
            }
            FieldUpdate::Tags(_) => {
                "UPDATE entries SET tags = $1, updated_on = $2 WHERE id = $3 AND user_id = $4"
            }
            FieldUpdate::Image(_) => {
                "UPDATE entries SET image = $1, updated_on = $2 WHERE id = $3 AND user_id = $4"
            }
        };
        let query = sqlx::query(sql);
        let query = match update {
            FieldUpdate::Favorite(v) => query.bind(v),
            FieldUpdate::Rating(v) => query.bind(v),
            FieldUpdate::Tags(v) => query.bind(v),
            FieldUpdate::Name(v) | FieldUpdate::Description(v) | FieldUpdate::Image(v) => {
                query.bind(v)
            }
        };
        let res = query
            .bind(at)
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("update entry field")?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid, owner: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete entry")?;
        Ok(res.rows_affected() == 1)
    }

    async fn count_matching(&self, filter: &EntryFilter) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM entries
            WHERE user_id = $1 AND ($2::text IS NULL OR $2 = ANY(tags))
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.tag.as_deref())
        .fetch_one(&self.db)
        .await
        .context("count entries")?;
        Ok(count)
    }

    async fn page_matching(
        &self,
        filter: &EntryFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Entry>> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM entries
            WHERE user_id = $1 AND ($2::text IS NULL OR $2 = ANY(tags))
            ORDER BY COALESCE(updated_on, created_on) DESC
            LIMIT $3 OFFSET $4
            "#
        );
        let rows = sqlx::query_as::<_, Entry>(&sql)
            .bind(filter.user_id)
            .bind(filter.tag.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("page entries")?;
        Ok(rows)
    }

    async fn search(&self, owner: Uuid, term: &str) -> anyhow::Result<Vec<ScoredEntry>> {
        self.ensure_search_index().await?;
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS},
                   ts_rank(entry_search_document(name, description, tags), q) AS score
            FROM entries, websearch_to_tsquery('english', $2) AS q
            WHERE user_id = $1
              AND entry_search_document(name, description, tags) @@ q
            ORDER BY score DESC
            "#
        );
        let rows = sqlx::query_as::<_, ScoredEntry>(&sql)
            .bind(owner)
            .bind(term)
            .fetch_all(&self.db)
            .await
            .context("search entries")?;
        Ok(rows)
    }
}

#[cfg(test)]
pub use memory::MemoryEntryRepo;

//! PostgreSQL document store.
//!
//! Each [`WriteBatch`] runs in one transaction. Order-index uniqueness per
//! scope is a deferred constraint, so intermediate states inside a batch may
//! collide as long as the committed state does not.
//!
//! Inserts and scope-count checks lock the scope's parent row (the owning
//! user or page) first, so writers to one scope are serialized and a count
//! taken under the lock stays valid until commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    Collection, DocumentStore, Scope, StoreError, StoreResult, Visibility, WriteBatch, WriteOp,
};
use crate::db;
use crate::models::{Page, Post, User};

const USER_COLUMNS: &str = "id, username, email, pass, info_text, created";

const PAGE_COLUMNS: &str =
    "id, owner_id, slug, order_index, title, description, thumbnail, is_private, info_text, created";

const POST_COLUMNS: &str = "id, page_id, slug, order_index, title, description, content_type, content, thumbnail, created";

/// Document store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

/// Database row for post.
#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    page_id: Uuid,
    slug: String,
    order_index: i32,
    title: String,
    description: String,
    content_type: String,
    content: String,
    thumbnail: Option<String>,
    created: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let content_type = row
            .content_type
            .parse()
            .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))?;

        Ok(Self {
            id: row.id,
            page_id: row.page_id,
            slug: row.slug,
            order_index: row.order_index,
            title: row.title,
            description: row.description,
            content_type,
            content: row.content,
            thumbnail: row.thumbnail,
            created: row.created,
        })
    }
}

/// Map unique violations to conflicts; everything else stays a database error.
fn map_write_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.message().to_string());
        }
    }
    StoreError::Database(err)
}

/// Lock the parent row of `scope`, then return its record count and last index.
async fn lock_scope(conn: &mut PgConnection, scope: Scope) -> StoreResult<(i64, i32)> {
    let (lock_sql, stats_sql) = match scope {
        Scope::UserPages(_) => (
            "SELECT id FROM users WHERE id = $1 FOR UPDATE",
            "SELECT COUNT(*), COALESCE(MAX(order_index), 0) FROM pages WHERE owner_id = $1",
        ),
        Scope::PagePosts(_) => (
            "SELECT id FROM pages WHERE id = $1 FOR UPDATE",
            "SELECT COUNT(*), COALESCE(MAX(order_index), 0) FROM posts WHERE page_id = $1",
        ),
    };
    sqlx::query(lock_sql)
        .bind(scope.parent_id())
        .fetch_optional(&mut *conn)
        .await?;
    let stats: (i64, i32) = sqlx::query_as(stats_sql)
        .bind(scope.parent_id())
        .fetch_one(&mut *conn)
        .await?;

    Ok(stats)
}

/// Fail unless `order_index` is one past the scope's last index.
async fn check_append(conn: &mut PgConnection, scope: Scope, order_index: i32) -> StoreResult<()> {
    let (_, last) = lock_scope(conn, scope).await?;
    let next = last.saturating_add(1);
    if order_index != next {
        return Err(StoreError::Conflict(format!(
            "{} order_index {order_index} is not the next index {next}",
            scope.collection().as_str()
        )));
    }
    Ok(())
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_posts(&self, sql: &str, id: Uuid, slug: Option<&str>) -> StoreResult<Vec<Post>> {
        let mut query = sqlx::query_as::<_, PostRow>(sql).bind(id);
        if let Some(slug) = slug {
            query = query.bind(slug);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Post::try_from).collect()
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, pass, info_text, created)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.pass)
        .bind(&user.info_text)
        .bind(user.created)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_user_info_text(&self, id: Uuid, info_text: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET info_text = $1 WHERE id = $2")
            .bind(info_text)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_pages(&self, owner_id: Uuid, visibility: Visibility) -> StoreResult<Vec<Page>> {
        let filter = match visibility {
            Visibility::All => "",
            Visibility::PublicOnly => " AND is_private = FALSE",
        };
        let pages = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE owner_id = $1{filter} ORDER BY order_index ASC, created ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pages)
    }

    async fn find_page(&self, id: Uuid) -> StoreResult<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(page)
    }

    async fn find_page_by_slug(&self, owner_id: Uuid, slug: &str) -> StoreResult<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE owner_id = $1 AND slug = $2"
        ))
        .bind(owner_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(page)
    }

    async fn insert_page(&self, page: &Page) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        check_append(&mut tx, Scope::UserPages(page.owner_id), page.order_index).await?;

        sqlx::query(&format!(
            "INSERT INTO pages ({PAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(page.id)
        .bind(page.owner_id)
        .bind(&page.slug)
        .bind(page.order_index)
        .bind(&page.title)
        .bind(&page.description)
        .bind(&page.thumbnail)
        .bind(page.is_private)
        .bind(&page.info_text)
        .bind(page.created)
        .execute(&mut *tx)
        .await
        .map_err(map_write_err)?;

        tx.commit().await.map_err(map_write_err)?;
        Ok(())
    }

    async fn list_posts(&self, page_id: Uuid) -> StoreResult<Vec<Post>> {
        self.fetch_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE page_id = $1 ORDER BY order_index ASC, created ASC"
            ),
            page_id,
            None,
        )
        .await
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let posts = self
            .fetch_posts(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"),
                id,
                None,
            )
            .await?;
        Ok(posts.into_iter().next())
    }

    async fn find_post_by_slug(&self, page_id: Uuid, slug: &str) -> StoreResult<Option<Post>> {
        let posts = self
            .fetch_posts(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE page_id = $1 AND slug = $2"),
                page_id,
                Some(slug),
            )
            .await?;
        Ok(posts.into_iter().next())
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        check_append(&mut tx, Scope::PagePosts(post.page_id), post.order_index).await?;

        sqlx::query(&format!(
            "INSERT INTO posts ({POST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(post.id)
        .bind(post.page_id)
        .bind(&post.slug)
        .bind(post.order_index)
        .bind(&post.title)
        .bind(&post.description)
        .bind(post.content_type.as_str())
        .bind(&post.content)
        .bind(&post.thumbnail)
        .bind(post.created)
        .execute(&mut *tx)
        .await
        .map_err(map_write_err)?;

        tx.commit().await.map_err(map_write_err)?;
        Ok(())
    }

    async fn slug_exists(&self, scope: Scope, slug: &str) -> StoreResult<bool> {
        let sql = match scope {
            Scope::UserPages(_) => {
                "SELECT EXISTS(SELECT 1 FROM pages WHERE owner_id = $1 AND slug = $2)"
            }
            Scope::PagePosts(_) => {
                "SELECT EXISTS(SELECT 1 FROM posts WHERE page_id = $1 AND slug = $2)"
            }
        };
        let exists: bool = sqlx::query_scalar(sql)
            .bind(scope.parent_id())
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;

        for op in batch.into_ops() {
            match op {
                WriteOp::SetOrderIndex {
                    collection,
                    id,
                    expected,
                    order_index,
                } => {
                    let result = sqlx::query(&format!(
                        "UPDATE {} SET order_index = $1 WHERE id = $2 AND order_index = $3",
                        collection.as_str()
                    ))
                    .bind(order_index)
                    .bind(id)
                    .bind(expected)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_write_err)?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::Conflict(format!(
                            "{} record {id} is no longer at index {expected}",
                            collection.as_str()
                        )));
                    }
                }
                WriteOp::PutPage(page) => {
                    let result = sqlx::query(
                        r#"
                        UPDATE pages
                        SET title = $1, description = $2, thumbnail = $3, is_private = $4, info_text = $5
                        WHERE id = $6
                        "#,
                    )
                    .bind(&page.title)
                    .bind(&page.description)
                    .bind(&page.thumbnail)
                    .bind(page.is_private)
                    .bind(&page.info_text)
                    .bind(page.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_write_err)?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::NotFound);
                    }
                }
                WriteOp::PutPost(post) => {
                    let result = sqlx::query(
                        r#"
                        UPDATE posts
                        SET title = $1, description = $2, content_type = $3, content = $4, thumbnail = $5
                        WHERE id = $6
                        "#,
                    )
                    .bind(&post.title)
                    .bind(&post.description)
                    .bind(post.content_type.as_str())
                    .bind(&post.content)
                    .bind(&post.thumbnail)
                    .bind(post.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_write_err)?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::NotFound);
                    }
                }
                WriteOp::Delete { collection, id } => {
                    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", collection.as_str()))
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .map_err(map_write_err)?;
                }
                WriteOp::DeleteAt {
                    collection,
                    id,
                    expected,
                } => {
                    let result = sqlx::query(&format!(
                        "DELETE FROM {} WHERE id = $1 AND order_index = $2",
                        collection.as_str()
                    ))
                    .bind(id)
                    .bind(expected)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_write_err)?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::Conflict(format!(
                            "{} record {id} is no longer at index {expected}",
                            collection.as_str()
                        )));
                    }
                }
                WriteOp::ExpectCount { scope, count } => {
                    let (current, _) = lock_scope(&mut tx, scope).await?;
                    if i64::try_from(count).ok() != Some(current) {
                        return Err(StoreError::Conflict(format!(
                            "{} scope {} holds {current} records, expected {count}",
                            scope.collection().as_str(),
                            scope.parent_id()
                        )));
                    }
                }
            }
        }

        // Deferred constraints are checked here.
        tx.commit().await.map_err(map_write_err)?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        db::check_health(&self.pool).await
    }
}

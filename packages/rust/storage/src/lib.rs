//! libSQL storage layer (embedded, offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding articles,
//! categories, the article/category link table and a mirror of authors.
//! It implements the repository traits from `folio-shared`.
//!
//! **Access rules:**
//! - `folio serve` / `folio migrate`: read-write via [`Storage::open`]
//! - `folio category tree`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_shared::{
    Article, ArticleId, ArticleRepository, Author, AuthorId, AuthorRepository, Category,
    CategoryId, CategoryRepository, FolioError, Result,
};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ARTICLE_COLUMNS: &str = "id, title, slug, content, thumbnail, image, short_description, \
     meta_description, keywords, tags, author_id, reading_time_minutes, views, likes, comments, \
     published, published_at, created_at, updated_at";

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, image, parent_id, created_at, updated_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FolioError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = configure(db.connect().map_err(db_err)?).await?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FolioError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = configure(db.connect().map_err(db_err)?).await?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        FolioError::Storage(format!("migration v{} failed: {e}", migration.version))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    pub async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Latest schema version this build knows how to apply.
    pub fn latest_schema_version() -> u32 {
        migrations::latest_version()
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(FolioError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    /// A dedicated connection for multi-statement transactions, so they
    /// never interleave with statements on the shared connection.
    async fn transaction_conn(&self) -> Result<Connection> {
        configure(self.db.connect().map_err(db_err)?).await
    }

    // -----------------------------------------------------------------------
    // Author operations
    // -----------------------------------------------------------------------

    /// Insert an author record. Authors are managed elsewhere; this exists
    /// for seeding the local mirror.
    pub async fn insert_author(&self, author: &Author) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO author (id, name, email, bio, avatar, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    author.id.to_string(),
                    author.name.as_str(),
                    author.email.as_str(),
                    author.bio.as_str(),
                    author.avatar.as_str(),
                    author.created_at.to_rfc3339(),
                    author.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Query helpers
    // -----------------------------------------------------------------------

    async fn query_articles(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Article>> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_article(&row)?);
        }
        Ok(results)
    }

    async fn query_categories(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Category>> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_category(&row)?);
        }
        Ok(results)
    }

    async fn slug_taken(&self, table: &str, slug: &str, exclude: Option<Uuid>) -> Result<bool> {
        let exclude = exclude.map(|id| id.to_string()).unwrap_or_default();
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE slug = ?1 AND id != ?2");
        let mut rows = self
            .conn
            .query(&sql, params![slug, exclude.as_str()])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? > 0),
            None => Ok(false),
        }
    }
}

/// Per-connection settings: foreign keys on, bounded lock wait.
async fn configure(conn: Connection) -> Result<Connection> {
    conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .await
        .map_err(db_err)?;
    Ok(conn)
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

#[async_trait]
impl ArticleRepository for Storage {
    async fn fetch_page(&self, cursor: Option<ArticleId>, limit: u32) -> Result<Vec<Article>> {
        match cursor {
            Some(cursor) => {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM article WHERE id > ?1 ORDER BY id LIMIT ?2"
                );
                self.query_articles(&sql, params![cursor.to_string(), i64::from(limit)])
                    .await
            }
            None => {
                let sql = format!("SELECT {ARTICLE_COLUMNS} FROM article ORDER BY id LIMIT ?1");
                self.query_articles(&sql, params![i64::from(limit)]).await
            }
        }
    }

    async fn get_by_id(&self, id: ArticleId) -> Result<Article> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM article WHERE id = ?1");
        self.query_articles(&sql, params![id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::not_found("article", id))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Article> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM article WHERE slug = ?1");
        self.query_articles(&sql, params![slug])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::not_found("article", slug))
    }

    async fn store(&self, article: &Article) -> Result<()> {
        self.check_writable()?;
        insert_article(&self.conn, article).await
    }

    async fn update(&self, article: &Article) -> Result<()> {
        self.check_writable()?;
        update_article(&self.conn, article).await
    }

    async fn store_with_categories(
        &self,
        article: &Article,
        category_ids: &[CategoryId],
    ) -> Result<()> {
        self.check_writable()?;
        let conn = self.transaction_conn().await?;
        let tx = conn.transaction().await.map_err(db_err)?;

        // An early return drops `tx`, which rolls back.
        insert_article(&tx, article).await?;
        replace_links(&tx, article.id, category_ids).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::debug!(article_id = %article.id, count = category_ids.len(), "stored article with links");
        Ok(())
    }

    async fn update_with_categories(
        &self,
        article: &Article,
        category_ids: Option<&[CategoryId]>,
    ) -> Result<()> {
        self.check_writable()?;
        let conn = self.transaction_conn().await?;
        let tx = conn.transaction().await.map_err(db_err)?;

        update_article(&tx, article).await?;
        if let Some(ids) = category_ids {
            replace_links(&tx, article.id, ids).await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, id: ArticleId) -> Result<()> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute("DELETE FROM article WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(db_err)?;

        if affected == 0 {
            return Err(FolioError::not_found("article", id));
        }
        Ok(())
    }

    async fn slug_exists_excluding_id(
        &self,
        slug: &str,
        exclude: Option<ArticleId>,
    ) -> Result<bool> {
        self.slug_taken("article", slug, exclude.map(|id| id.0)).await
    }

    async fn set_categories(
        &self,
        article_id: ArticleId,
        category_ids: &[CategoryId],
    ) -> Result<()> {
        self.check_writable()?;
        let conn = self.transaction_conn().await?;
        let tx = conn.transaction().await.map_err(db_err)?;
        replace_links(&tx, article_id, category_ids).await?;
        tx.commit().await.map_err(db_err)?;
        tracing::debug!(article_id = %article_id, count = category_ids.len(), "linked categories");
        Ok(())
    }
}

async fn insert_article(conn: &Connection, article: &Article) -> Result<()> {
    let sql = format!(
        "INSERT INTO article ({ARTICLE_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
    );
    conn.execute(
        &sql,
        params![
            article.id.to_string(),
            article.title.as_str(),
            article.slug.as_str(),
            article.content.as_str(),
            article.thumbnail.as_str(),
            article.image.as_str(),
            article.short_description.as_str(),
            article.meta_description.as_str(),
            to_json(&article.keywords)?,
            to_json(&article.tags)?,
            article.author.id.to_string(),
            i64::from(article.reading_time_minutes),
            to_i64(article.views),
            to_i64(article.likes),
            to_i64(article.comments),
            i64::from(article.published),
            article.published_at.map(|t| t.to_rfc3339()),
            article.created_at.to_rfc3339(),
            article.updated_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_article(conn: &Connection, article: &Article) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE article SET
               title = ?2, slug = ?3, content = ?4, thumbnail = ?5, image = ?6,
               short_description = ?7, meta_description = ?8, keywords = ?9, tags = ?10,
               author_id = ?11, reading_time_minutes = ?12, views = ?13, likes = ?14,
               comments = ?15, published = ?16, published_at = ?17, updated_at = ?18
             WHERE id = ?1",
            params![
                article.id.to_string(),
                article.title.as_str(),
                article.slug.as_str(),
                article.content.as_str(),
                article.thumbnail.as_str(),
                article.image.as_str(),
                article.short_description.as_str(),
                article.meta_description.as_str(),
                to_json(&article.keywords)?,
                to_json(&article.tags)?,
                article.author.id.to_string(),
                i64::from(article.reading_time_minutes),
                to_i64(article.views),
                to_i64(article.likes),
                to_i64(article.comments),
                i64::from(article.published),
                article.published_at.map(|t| t.to_rfc3339()),
                article.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(db_err)?;

    if affected == 0 {
        return Err(FolioError::not_found("article", article.id));
    }
    Ok(())
}

/// Replace every link of `article_id`. Duplicate ids are ignored.
async fn replace_links(
    conn: &Connection,
    article_id: ArticleId,
    category_ids: &[CategoryId],
) -> Result<()> {
    let article = article_id.to_string();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "DELETE FROM article_category WHERE article_id = ?1",
        params![article.as_str()],
    )
    .await
    .map_err(db_err)?;

    for category_id in category_ids {
        conn.execute(
            "INSERT OR IGNORE INTO article_category (article_id, category_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![article.as_str(), category_id.to_string(), now.as_str()],
        )
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[async_trait]
impl CategoryRepository for Storage {
    async fn fetch_page(&self, cursor: Option<CategoryId>, limit: u32) -> Result<Vec<Category>> {
        match cursor {
            Some(cursor) => {
                let sql = format!(
                    "SELECT {CATEGORY_COLUMNS} FROM category WHERE id > ?1 ORDER BY id LIMIT ?2"
                );
                self.query_categories(&sql, params![cursor.to_string(), i64::from(limit)])
                    .await
            }
            None => {
                let sql = format!("SELECT {CATEGORY_COLUMNS} FROM category ORDER BY id LIMIT ?1");
                self.query_categories(&sql, params![i64::from(limit)]).await
            }
        }
    }

    async fn get_by_id(&self, id: CategoryId) -> Result<Category> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE id = ?1");
        self.query_categories(&sql, params![id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::not_found("category", id))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Category> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE slug = ?1");
        self.query_categories(&sql, params![slug])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::not_found("category", slug))
    }

    async fn get_by_ids(&self, ids: &[CategoryId]) -> Result<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id IN ({placeholders}) ORDER BY name"
        );
        let values: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.query_categories(&sql, libsql::params_from_iter(values))
            .await
    }

    async fn store(&self, category: &Category) -> Result<()> {
        self.check_writable()?;
        let sql = format!(
            "INSERT INTO category ({CATEGORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        );
        self.conn
            .execute(
                &sql,
                params![
                    category.id.to_string(),
                    category.name.as_str(),
                    category.slug.as_str(),
                    category.description.as_str(),
                    category.image.as_str(),
                    category.parent_id.map(|p| p.to_string()),
                    category.created_at.to_rfc3339(),
                    category.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update(&self, category: &Category) -> Result<()> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                "UPDATE category SET
                   name = ?2, slug = ?3, description = ?4, image = ?5, parent_id = ?6,
                   updated_at = ?7
                 WHERE id = ?1",
                params![
                    category.id.to_string(),
                    category.name.as_str(),
                    category.slug.as_str(),
                    category.description.as_str(),
                    category.image.as_str(),
                    category.parent_id.map(|p| p.to_string()),
                    category.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;

        if affected == 0 {
            return Err(FolioError::not_found("category", category.id));
        }
        Ok(())
    }

    async fn delete(&self, id: CategoryId) -> Result<()> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute("DELETE FROM category WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(db_err)?;

        if affected == 0 {
            return Err(FolioError::not_found("category", id));
        }
        Ok(())
    }

    async fn slug_exists_excluding_id(
        &self,
        slug: &str,
        exclude: Option<CategoryId>,
    ) -> Result<bool> {
        self.slug_taken("category", slug, exclude.map(|id| id.0)).await
    }

    async fn categories_for_article(&self, article_id: ArticleId) -> Result<Vec<Category>> {
        self.query_categories(
            "SELECT c.id, c.name, c.slug, c.description, c.image, c.parent_id, c.created_at, c.updated_at
             FROM category c
             JOIN article_category ac ON ac.category_id = c.id
             WHERE ac.article_id = ?1
             ORDER BY c.name",
            params![article_id.to_string()],
        )
        .await
    }

    async fn children(&self, parent_id: CategoryId) -> Result<Vec<Category>> {
        let sql =
            format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE parent_id = ?1 ORDER BY name");
        self.query_categories(&sql, params![parent_id.to_string()])
            .await
    }

    async fn roots(&self) -> Result<Vec<Category>> {
        let sql =
            format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE parent_id IS NULL ORDER BY name");
        self.query_categories(&sql, params![]).await
    }

    async fn all(&self) -> Result<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM category ORDER BY name");
        self.query_categories(&sql, params![]).await
    }
}

// ---------------------------------------------------------------------------
// Authors
// ---------------------------------------------------------------------------

#[async_trait]
impl AuthorRepository for Storage {
    async fn get_by_id(&self, id: AuthorId) -> Result<Author> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, email, bio, avatar, created_at, updated_at
                 FROM author WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => row_to_author(&row),
            None => Err(FolioError::not_found("author", id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Map a libSQL error, turning constraint violations into domain errors.
fn db_err(e: libsql::Error) -> FolioError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        if message.contains(".slug") {
            FolioError::conflict("slug is already taken")
        } else {
            FolioError::conflict(message)
        }
    } else if message.contains("FOREIGN KEY constraint failed") {
        FolioError::bad_input("referenced entity does not exist")
    } else {
        FolioError::Storage(message)
    }
}

fn text(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(db_err)
}

fn int(row: &libsql::Row, idx: i32) -> Result<i64> {
    row.get::<i64>(idx).map_err(db_err)
}

fn uuid_col(row: &libsql::Row, idx: i32) -> Result<Uuid> {
    let s = text(row, idx)?;
    Uuid::parse_str(&s).map_err(|e| FolioError::Storage(format!("invalid id '{s}': {e}")))
}

fn timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FolioError::Storage(format!("invalid date: {e}")))
}

fn string_list(row: &libsql::Row, idx: i32) -> Result<Vec<String>> {
    let raw = text(row, idx)?;
    serde_json::from_str(&raw).map_err(|e| FolioError::Storage(format!("invalid list: {e}")))
}

fn to_json(list: &[String]) -> Result<String> {
    serde_json::to_string(list).map_err(|e| FolioError::Storage(e.to_string()))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Convert a database row to an [`Article`]. Categories are loaded separately
/// and the author carries only its id.
fn row_to_article(row: &libsql::Row) -> Result<Article> {
    Ok(Article {
        id: ArticleId(uuid_col(row, 0)?),
        title: text(row, 1)?,
        slug: text(row, 2)?,
        content: text(row, 3)?,
        thumbnail: text(row, 4)?,
        image: text(row, 5)?,
        short_description: text(row, 6)?,
        meta_description: text(row, 7)?,
        keywords: string_list(row, 8)?,
        tags: string_list(row, 9)?,
        categories: Vec::new(),
        author: Author::reference(AuthorId(uuid_col(row, 10)?)),
        reading_time_minutes: u32::try_from(int(row, 11)?).unwrap_or(0),
        views: u64::try_from(int(row, 12)?).unwrap_or(0),
        likes: u64::try_from(int(row, 13)?).unwrap_or(0),
        comments: u64::try_from(int(row, 14)?).unwrap_or(0),
        published: int(row, 15)? != 0,
        published_at: match row.get::<String>(16).ok() {
            Some(s) => Some(timestamp(&s)?),
            None => None,
        },
        created_at: timestamp(&text(row, 17)?)?,
        updated_at: timestamp(&text(row, 18)?)?,
    })
}

/// Convert a database row to a [`Category`].
fn row_to_category(row: &libsql::Row) -> Result<Category> {
    let parent_id = match row.get::<String>(5).ok() {
        Some(s) => Some(CategoryId(Uuid::parse_str(&s).map_err(|e| {
            FolioError::Storage(format!("invalid parent id '{s}': {e}"))
        })?)),
        None => None,
    };

    Ok(Category {
        id: CategoryId(uuid_col(row, 0)?),
        name: text(row, 1)?,
        slug: text(row, 2)?,
        description: text(row, 3)?,
        image: text(row, 4)?,
        parent_id,
        created_at: timestamp(&text(row, 6)?)?,
        updated_at: timestamp(&text(row, 7)?)?,
        ..Default::default()
    })
}

/// Convert a database row to an [`Author`].
fn row_to_author(row: &libsql::Row) -> Result<Author> {
    Ok(Author {
        id: AuthorId(uuid_col(row, 0)?),
        name: text(row, 1)?,
        email: text(row, 2)?,
        bio: text(row, 3)?,
        avatar: text(row, 4)?,
        created_at: timestamp(&text(row, 5)?)?,
        updated_at: timestamp(&text(row, 6)?)?,
    })
}

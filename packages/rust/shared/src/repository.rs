//! Repository contracts consumed by the services and implemented by storage.
//!
//! Every lookup by key returns [`FolioError::NotFound`](crate::FolioError::NotFound)
//! when the entity is absent; `update` and `delete` do the same when no row
//! was affected.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Article, ArticleId, Author, AuthorId, Category, CategoryId};

/// Persistence for articles and their category links.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Up to `limit` articles with ids greater than `cursor`, ordered by id.
    async fn fetch_page(&self, cursor: Option<ArticleId>, limit: u32) -> Result<Vec<Article>>;

    async fn get_by_id(&self, id: ArticleId) -> Result<Article>;

    async fn get_by_slug(&self, slug: &str) -> Result<Article>;

    /// Insert a new article row without touching category links.
    async fn store(&self, article: &Article) -> Result<()>;

    async fn update(&self, article: &Article) -> Result<()>;

    /// Insert a new article row and link it to `category_ids` in one
    /// transaction. On error neither the row nor any link is kept.
    async fn store_with_categories(
        &self,
        article: &Article,
        category_ids: &[CategoryId],
    ) -> Result<()>;

    /// Update an article row and, when `category_ids` is given, replace its
    /// links, in one transaction.
    async fn update_with_categories(
        &self,
        article: &Article,
        category_ids: Option<&[CategoryId]>,
    ) -> Result<()>;

    async fn delete(&self, id: ArticleId) -> Result<()>;

    async fn slug_exists_excluding_id(
        &self,
        slug: &str,
        exclude: Option<ArticleId>,
    ) -> Result<bool>;

    /// Replace the full set of categories linked to `article_id`.
    async fn set_categories(&self, article_id: ArticleId, category_ids: &[CategoryId])
        -> Result<()>;
}

/// Persistence for categories.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Up to `limit` categories with ids greater than `cursor`, ordered by id.
    async fn fetch_page(&self, cursor: Option<CategoryId>, limit: u32) -> Result<Vec<Category>>;

    async fn get_by_id(&self, id: CategoryId) -> Result<Category>;

    async fn get_by_slug(&self, slug: &str) -> Result<Category>;

    /// Categories whose id is in `ids`. Unknown ids are skipped.
    async fn get_by_ids(&self, ids: &[CategoryId]) -> Result<Vec<Category>>;

    async fn store(&self, category: &Category) -> Result<()>;

    async fn update(&self, category: &Category) -> Result<()>;

    async fn delete(&self, id: CategoryId) -> Result<()>;

    async fn slug_exists_excluding_id(
        &self,
        slug: &str,
        exclude: Option<CategoryId>,
    ) -> Result<bool>;

    /// Categories linked to an article, ordered by name.
    async fn categories_for_article(&self, article_id: ArticleId) -> Result<Vec<Category>>;

    /// Direct children of `parent_id`, ordered by name.
    async fn children(&self, parent_id: CategoryId) -> Result<Vec<Category>>;

    /// Categories without a parent, ordered by name.
    async fn roots(&self) -> Result<Vec<Category>>;

    /// Every category, ordered by name.
    async fn all(&self) -> Result<Vec<Category>>;
}

/// Read-only access to authors, which Folio does not own.
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn get_by_id(&self, id: AuthorId) -> Result<Author>;
}

// ---------------------------------------------------------------------------
// Slug lookup
// ---------------------------------------------------------------------------

/// Existence check used by the slug uniqueness resolver.
#[async_trait]
pub trait SlugLookup: Send + Sync {
    /// Whether `slug` is taken by any entity other than `exclude`.
    async fn slug_exists_excluding_id(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool>;
}

/// Slug lookup over the article table.
pub struct ArticleSlugs<'a>(pub &'a dyn ArticleRepository);

#[async_trait]
impl SlugLookup for ArticleSlugs<'_> {
    async fn slug_exists_excluding_id(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool> {
        self.0
            .slug_exists_excluding_id(slug, exclude.map(ArticleId))
            .await
    }
}

/// Slug lookup over the category table.
pub struct CategorySlugs<'a>(pub &'a dyn CategoryRepository);

#[async_trait]
impl SlugLookup for CategorySlugs<'_> {
    async fn slug_exists_excluding_id(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool> {
        self.0
            .slug_exists_excluding_id(slug, exclude.map(CategoryId))
            .await
    }
}

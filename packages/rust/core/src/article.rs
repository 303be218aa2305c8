//! Article service: listing, lookup and lifecycle of articles.
//!
//! Reads are assembled per request: the stored article, its resolved author,
//! its categories and a breadcrumb. Writes normalize and uniquify slugs
//! before anything reaches storage.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use folio_shared::{
    Article, ArticleId, ArticlePatch, ArticleRepository, ArticleResponse, ArticleSlugs,
    AuthorRepository, Category, CategoryId, CategoryRepository, FolioError, Page, Result,
    ServiceConfig,
};

use crate::breadcrumb::generate_breadcrumb;
use crate::enrichment::enrich_authors;
use crate::pagination::{next_cursor, page_size, parse_cursor};
use crate::slug::{ensure_unique_slug, slug_base};
use crate::validation::validate_article;

/// Orchestrates article reads and writes over the repositories.
#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    categories: Arc<dyn CategoryRepository>,
    authors: Arc<dyn AuthorRepository>,
    config: ServiceConfig,
}

impl ArticleService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        categories: Arc<dyn CategoryRepository>,
        authors: Arc<dyn AuthorRepository>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            articles,
            categories,
            authors,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// One page of articles with authors, categories and breadcrumbs.
    ///
    /// Any failure along the way fails the whole page; no cursor is returned.
    #[instrument(skip_all, fields(cursor = ?cursor, limit = ?limit))]
    pub async fn fetch(
        &self,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ArticleResponse>> {
        let cursor = parse_cursor::<ArticleId>(cursor)?;
        let limit = page_size(limit, self.config.article_page_size);

        let mut articles = self.articles.fetch_page(cursor, limit).await?;
        let next = next_cursor(&articles, limit, |a| a.id);

        enrich_authors(
            Arc::clone(&self.authors),
            &mut articles,
            self.config.author_lookup_concurrency,
        )
        .await?;

        let mut items = Vec::with_capacity(articles.len());
        for article in articles {
            items.push(self.with_categories(article).await?);
        }

        debug!(count = items.len(), has_more = next.is_some(), "fetched articles");
        Ok(Page::new(items, next))
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn get_by_id(&self, id: ArticleId) -> Result<ArticleResponse> {
        let article = self.articles.get_by_id(id).await?;
        self.respond(article).await
    }

    #[instrument(skip_all, fields(slug = %slug))]
    pub async fn get_by_slug(&self, slug: &str) -> Result<ArticleResponse> {
        let article = self.articles.get_by_slug(slug).await?;
        self.respond(article).await
    }

    /// Author, categories and breadcrumb for a single article.
    async fn respond(&self, article: Article) -> Result<ArticleResponse> {
        let mut batch = [article];
        enrich_authors(Arc::clone(&self.authors), &mut batch, 1).await?;
        let [article] = batch;
        self.with_categories(article).await
    }

    async fn with_categories(&self, mut article: Article) -> Result<ArticleResponse> {
        let categories = self.categories.categories_for_article(article.id).await?;
        let breadcrumb = generate_breadcrumb(&article, &categories);
        article.categories = categories;
        Ok(ArticleResponse {
            article,
            breadcrumb,
        })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Create an article.
    ///
    /// A caller-supplied slug that is already taken is a conflict; an empty
    /// slug is derived from the title and made unique.
    #[instrument(skip_all, fields(title = %article.title))]
    pub async fn store(&self, mut article: Article) -> Result<Article> {
        validate_article(&article)?;
        self.require_author(&article).await?;
        let categories = self.resolve_categories(&article.category_ids()).await?;

        if article.slug.is_empty() {
            article.slug = self.unique_slug(&slug_base(&article.title), None).await?;
        } else {
            self.reject_taken_slug(&article.slug).await?;
        }

        if article.id.is_nil() {
            article.id = ArticleId::new();
        }
        let now = Utc::now();
        article.created_at = now;
        article.updated_at = now;
        stamp_publication(&mut article);

        self.articles
            .store_with_categories(&article, &ids_of(&categories))
            .await?;
        article.categories = categories;

        info!(id = %article.id, slug = %article.slug, "article stored");
        Ok(article)
    }

    /// Replace an article in full. Categories are replaced too.
    #[instrument(skip_all, fields(id = %article.id))]
    pub async fn update(&self, mut article: Article) -> Result<Article> {
        validate_article(&article)?;
        let existing = self.articles.get_by_id(article.id).await?;
        self.require_author(&article).await?;
        let categories = self.resolve_categories(&article.category_ids()).await?;

        let base = if article.slug.is_empty() {
            slug_base(&article.title)
        } else {
            article.slug.clone()
        };
        article.slug = self.unique_slug(&base, Some(article.id)).await?;

        article.created_at = existing.created_at;
        article.updated_at = Utc::now();
        stamp_publication(&mut article);

        self.articles
            .update_with_categories(&article, Some(ids_of(&categories).as_slice()))
            .await?;
        article.categories = categories;

        info!(id = %article.id, slug = %article.slug, "article updated");
        Ok(article)
    }

    /// Apply the fields present in `patch` and return the fresh response.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn update_partial(&self, id: ArticleId, patch: ArticlePatch) -> Result<ArticleResponse> {
        let mut article = self.articles.get_by_id(id).await?;
        let previous_slug = article.slug.clone();

        patch.apply_to(&mut article);
        validate_article(&article)?;
        if patch.author.is_some() {
            self.require_author(&article).await?;
        }

        let categories = match &patch.categories {
            Some(refs) => {
                let ids: Vec<CategoryId> = refs.iter().map(|c| c.id).collect();
                Some(self.resolve_categories(&ids).await?)
            }
            None => None,
        };

        if article.slug.is_empty() {
            article.slug = self.unique_slug(&slug_base(&article.title), Some(id)).await?;
        } else if article.slug != previous_slug {
            let requested = article.slug.clone();
            article.slug = self.unique_slug(&requested, Some(id)).await?;
        }

        article.updated_at = Utc::now();
        stamp_publication(&mut article);

        let category_ids = categories.as_deref().map(ids_of);
        self.articles
            .update_with_categories(&article, category_ids.as_deref())
            .await?;

        info!(id = %id, slug = %article.slug, "article patched");
        self.respond(article).await
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn delete(&self, id: ArticleId) -> Result<()> {
        self.articles.get_by_id(id).await?;
        self.articles.delete(id).await?;
        info!(id = %id, "article deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn unique_slug(&self, base: &str, exclude: Option<ArticleId>) -> Result<String> {
        let lookup = ArticleSlugs(self.articles.as_ref());
        let resolution = ensure_unique_slug(
            &lookup,
            base,
            exclude.map(|id| id.0),
            self.config.max_slug_attempts,
        )
        .await?;
        Ok(resolution.into_slug())
    }

    /// A caller-supplied slug must be free. If the check itself fails, the
    /// UNIQUE index on `article.slug` has the final say.
    async fn reject_taken_slug(&self, slug: &str) -> Result<()> {
        match self.articles.slug_exists_excluding_id(slug, None).await {
            Ok(true) => Err(FolioError::conflict(format!("slug '{slug}' is already taken"))),
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(slug, error = %e, "slug existence check failed; relying on the unique index");
                Ok(())
            }
        }
    }

    /// The referenced author must exist. A nil author id is allowed.
    async fn require_author(&self, article: &Article) -> Result<()> {
        let id = article.author.id;
        if id.is_nil() {
            return Ok(());
        }
        match self.authors.get_by_id(id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                Err(FolioError::bad_input(format!("unknown author {id}")))
            }
            Err(e) => Err(e),
        }
    }

    /// Load the categories for `ids`, failing on any unknown id.
    async fn resolve_categories(&self, ids: &[CategoryId]) -> Result<Vec<Category>> {
        let mut wanted: Vec<CategoryId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !wanted.contains(id) {
                wanted.push(*id);
            }
        }
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let found = self.categories.get_by_ids(&wanted).await?;
        if let Some(missing) = wanted.iter().find(|id| !found.iter().any(|c| c.id == **id)) {
            return Err(FolioError::bad_input(format!("unknown category {missing}")));
        }
        Ok(found)
    }
}

fn ids_of(categories: &[Category]) -> Vec<CategoryId> {
    categories.iter().map(|c| c.id).collect()
}

/// Published articles without a publication time get the current one.
fn stamp_publication(article: &mut Article) {
    if article.published && article.published_at.is_none() {
        article.published_at = Some(article.updated_at);
    }
}

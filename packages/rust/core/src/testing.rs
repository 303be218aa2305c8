//! In-memory repositories for service tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use folio_shared::{
    Article, ArticleId, ArticleRepository, Author, AuthorId, AuthorRepository, Category,
    CategoryId, CategoryRepository, FolioError, Result,
};

#[derive(Default)]
pub(crate) struct MemoryStore {
    articles: Mutex<Vec<Article>>,
    categories: Mutex<Vec<Category>>,
    authors: Mutex<HashMap<AuthorId, Author>>,
    links: Mutex<Vec<(ArticleId, CategoryId)>>,
    failing_authors: Mutex<HashSet<AuthorId>>,
    pub author_lookups: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub author_delay: Option<Duration>,
    pub fail_slug_checks: bool,
    /// Makes every write that touches category links fail with a storage error.
    pub fail_link_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_author(&self, name: &str) -> AuthorId {
        let id = AuthorId::new();
        let now = Utc::now();
        self.authors.lock().unwrap().insert(
            id,
            Author {
                id,
                name: name.into(),
                created_at: now,
                updated_at: now,
                ..Default::default()
            },
        );
        id
    }

    pub fn fail_author(&self, id: AuthorId) {
        self.failing_authors.lock().unwrap().insert(id);
    }

    pub fn add_category(&self, name: &str, slug: &str, parent: Option<CategoryId>) -> CategoryId {
        let id = CategoryId::new();
        self.categories.lock().unwrap().push(Category {
            id,
            name: name.into(),
            slug: slug.into(),
            parent_id: parent,
            ..Default::default()
        });
        id
    }

    pub fn add_article(&self, title: &str, slug: &str, author: AuthorId) -> ArticleId {
        let id = ArticleId::new();
        self.articles.lock().unwrap().push(Article {
            id,
            title: title.into(),
            slug: slug.into(),
            content: "Body".into(),
            author: Author::reference(author),
            ..Default::default()
        });
        id
    }

    pub fn link(&self, article: ArticleId, category: CategoryId) {
        self.links.lock().unwrap().push((article, category));
    }

    pub fn article_count(&self) -> usize {
        self.articles.lock().unwrap().len()
    }

    pub fn category(&self, id: CategoryId) -> Option<Category> {
        self.categories
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn linked_ids(&self, article: ArticleId) -> Vec<CategoryId> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == article)
            .map(|(_, c)| *c)
            .collect()
    }
}

impl MemoryStore {
    fn check_link_writes(&self) -> Result<()> {
        if self.fail_link_writes.load(Ordering::SeqCst) {
            return Err(FolioError::Storage("database is locked".into()));
        }
        Ok(())
    }
}

fn by_name(mut categories: Vec<Category>) -> Vec<Category> {
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    categories
}

#[async_trait]
impl ArticleRepository for MemoryStore {
    async fn fetch_page(&self, cursor: Option<ArticleId>, limit: u32) -> Result<Vec<Article>> {
        let mut articles = self.articles.lock().unwrap().clone();
        articles.sort_by_key(|a| a.id);
        Ok(articles
            .into_iter()
            .filter(|a| cursor.is_none_or(|c| a.id > c))
            .take(limit as usize)
            .collect())
    }

    async fn get_by_id(&self, id: ArticleId) -> Result<Article> {
        self.articles
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| FolioError::not_found("article", id))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Article> {
        self.articles
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.slug == slug)
            .cloned()
            .ok_or_else(|| FolioError::not_found("article", slug))
    }

    async fn store(&self, article: &Article) -> Result<()> {
        let mut articles = self.articles.lock().unwrap();
        if articles.iter().any(|a| a.slug == article.slug) {
            return Err(FolioError::conflict("slug is already taken"));
        }
        let mut stored = article.clone();
        stored.categories.clear();
        articles.push(stored);
        Ok(())
    }

    async fn update(&self, article: &Article) -> Result<()> {
        let mut articles = self.articles.lock().unwrap();
        match articles.iter_mut().find(|a| a.id == article.id) {
            Some(existing) => {
                *existing = article.clone();
                existing.categories.clear();
                Ok(())
            }
            None => Err(FolioError::not_found("article", article.id)),
        }
    }

    async fn store_with_categories(
        &self,
        article: &Article,
        category_ids: &[CategoryId],
    ) -> Result<()> {
        self.check_link_writes()?;
        ArticleRepository::store(self, article).await?;
        self.set_categories(article.id, category_ids).await
    }

    async fn update_with_categories(
        &self,
        article: &Article,
        category_ids: Option<&[CategoryId]>,
    ) -> Result<()> {
        if category_ids.is_some() {
            self.check_link_writes()?;
        }
        ArticleRepository::update(self, article).await?;
        match category_ids {
            Some(ids) => self.set_categories(article.id, ids).await,
            None => Ok(()),
        }
    }

    async fn delete(&self, id: ArticleId) -> Result<()> {
        let mut articles = self.articles.lock().unwrap();
        let before = articles.len();
        articles.retain(|a| a.id != id);
        if articles.len() == before {
            return Err(FolioError::not_found("article", id));
        }
        self.links.lock().unwrap().retain(|(a, _)| *a != id);
        Ok(())
    }

    async fn slug_exists_excluding_id(
        &self,
        slug: &str,
        exclude: Option<ArticleId>,
    ) -> Result<bool> {
        if self.fail_slug_checks {
            return Err(FolioError::Storage("slug check unavailable".into()));
        }
        Ok(self
            .articles
            .lock()
            .unwrap()
            .iter()
            .any(|a| a.slug == slug && Some(a.id) != exclude))
    }

    async fn set_categories(
        &self,
        article_id: ArticleId,
        category_ids: &[CategoryId],
    ) -> Result<()> {
        self.check_link_writes()?;
        let mut links = self.links.lock().unwrap();
        links.retain(|(a, _)| *a != article_id);
        for id in category_ids {
            if !links.contains(&(article_id, *id)) {
                links.push((article_id, *id));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn fetch_page(&self, cursor: Option<CategoryId>, limit: u32) -> Result<Vec<Category>> {
        let mut categories = self.categories.lock().unwrap().clone();
        categories.sort_by_key(|c| c.id);
        Ok(categories
            .into_iter()
            .filter(|c| cursor.is_none_or(|cur| c.id > cur))
            .take(limit as usize)
            .collect())
    }

    async fn get_by_id(&self, id: CategoryId) -> Result<Category> {
        self.category(id)
            .ok_or_else(|| FolioError::not_found("category", id))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Category> {
        self.categories
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.slug == slug)
            .cloned()
            .ok_or_else(|| FolioError::not_found("category", slug))
    }

    async fn get_by_ids(&self, ids: &[CategoryId]) -> Result<Vec<Category>> {
        let categories = self.categories.lock().unwrap();
        Ok(by_name(
            categories
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect(),
        ))
    }

    async fn store(&self, category: &Category) -> Result<()> {
        let mut categories = self.categories.lock().unwrap();
        if categories.iter().any(|c| c.slug == category.slug) {
            return Err(FolioError::conflict("slug is already taken"));
        }
        categories.push(category.clone());
        Ok(())
    }

    async fn update(&self, category: &Category) -> Result<()> {
        let mut categories = self.categories.lock().unwrap();
        match categories.iter_mut().find(|c| c.id == category.id) {
            Some(existing) => {
                *existing = category.clone();
                Ok(())
            }
            None => Err(FolioError::not_found("category", category.id)),
        }
    }

    async fn delete(&self, id: CategoryId) -> Result<()> {
        let mut categories = self.categories.lock().unwrap();
        let before = categories.len();
        categories.retain(|c| c.id != id);
        if categories.len() == before {
            return Err(FolioError::not_found("category", id));
        }
        for c in categories.iter_mut() {
            if c.parent_id == Some(id) {
                c.parent_id = None;
            }
        }
        self.links.lock().unwrap().retain(|(_, c)| *c != id);
        Ok(())
    }

    async fn slug_exists_excluding_id(
        &self,
        slug: &str,
        exclude: Option<CategoryId>,
    ) -> Result<bool> {
        if self.fail_slug_checks {
            return Err(FolioError::Storage("slug check unavailable".into()));
        }
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.slug == slug && Some(c.id) != exclude))
    }

    async fn categories_for_article(&self, article_id: ArticleId) -> Result<Vec<Category>> {
        let ids = self.linked_ids(article_id);
        CategoryRepository::get_by_ids(self, &ids).await
    }

    async fn children(&self, parent_id: CategoryId) -> Result<Vec<Category>> {
        let categories = self.categories.lock().unwrap();
        Ok(by_name(
            categories
                .iter()
                .filter(|c| c.parent_id == Some(parent_id))
                .cloned()
                .collect(),
        ))
    }

    async fn roots(&self) -> Result<Vec<Category>> {
        let categories = self.categories.lock().unwrap();
        Ok(by_name(
            categories
                .iter()
                .filter(|c| c.parent_id.is_none())
                .cloned()
                .collect(),
        ))
    }

    async fn all(&self) -> Result<Vec<Category>> {
        Ok(by_name(self.categories.lock().unwrap().clone()))
    }
}

#[async_trait]
impl AuthorRepository for MemoryStore {
    async fn get_by_id(&self, id: AuthorId) -> Result<Author> {
        self.author_lookups.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.author_delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing_authors.lock().unwrap().contains(&id) {
            return Err(FolioError::Storage(format!("author service down for {id}")));
        }
        self.authors
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| FolioError::not_found("author", id))
    }
}

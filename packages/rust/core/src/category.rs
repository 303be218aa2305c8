//! Category service: hierarchy queries and category lifecycle.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use folio_shared::{
    Category, CategoryId, CategoryRepository, CategorySlugs, FolioError, Page, Result,
    ServiceConfig,
};

use crate::pagination::{next_cursor, page_size, parse_cursor};
use crate::slug::{ensure_unique_slug, slug_base};
use crate::tree::build_tree;
use crate::validation::validate_category;

/// Upper bound on parent hops when checking for cycles.
const MAX_ANCESTOR_WALK: usize = 10_000;

/// Orchestrates category reads and writes over the repository.
#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
    config: ServiceConfig,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryRepository>, config: ServiceConfig) -> Self {
        Self { categories, config }
    }

    #[instrument(skip_all, fields(cursor = ?cursor, num = ?num))]
    pub async fn fetch(&self, cursor: Option<&str>, num: Option<u32>) -> Result<Page<Category>> {
        let cursor = parse_cursor::<CategoryId>(cursor)?;
        let limit = page_size(num, self.config.category_page_size);

        let items = self.categories.fetch_page(cursor, limit).await?;
        let next = next_cursor(&items, limit, |c| c.id);
        debug!(count = items.len(), has_more = next.is_some(), "fetched categories");
        Ok(Page::new(items, next))
    }

    pub async fn get_by_id(&self, id: CategoryId) -> Result<Category> {
        self.categories.get_by_id(id).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Category> {
        self.categories.get_by_slug(slug).await
    }

    /// The category for `slug` with its direct children attached.
    #[instrument(skip_all, fields(slug = %slug))]
    pub async fn get_with_children(&self, slug: &str) -> Result<Category> {
        let mut category = self.categories.get_by_slug(slug).await?;
        category.children = self.categories.children(category.id).await?;
        Ok(category)
    }

    pub async fn children(&self, parent_id: CategoryId) -> Result<Vec<Category>> {
        self.categories.children(parent_id).await
    }

    /// Direct children of the category identified by `slug`.
    pub async fn children_of_slug(&self, slug: &str) -> Result<Vec<Category>> {
        let parent = self.categories.get_by_slug(slug).await?;
        self.categories.children(parent.id).await
    }

    pub async fn roots(&self) -> Result<Vec<Category>> {
        self.categories.roots().await
    }

    /// The full category forest.
    #[instrument(skip_all)]
    pub async fn tree(&self) -> Result<Vec<Category>> {
        let flat = self.categories.all().await?;
        Ok(build_tree(flat))
    }

    /// Create a category. The parent, when given, must already exist.
    #[instrument(skip_all, fields(name = %category.name))]
    pub async fn store(&self, mut category: Category) -> Result<Category> {
        validate_category(&category)?;

        if let Some(parent) = category.parent_id {
            self.require_parent(parent).await?;
        }

        if category.slug.is_empty() {
            category.slug = self.unique_slug(&slug_base(&category.name), None).await?;
        } else {
            match self
                .categories
                .slug_exists_excluding_id(&category.slug, None)
                .await
            {
                Ok(true) => {
                    return Err(FolioError::conflict(format!(
                        "slug '{}' is already taken",
                        category.slug
                    )));
                }
                Ok(false) => {}
                Err(e) => warn!(
                    slug = %category.slug,
                    error = %e,
                    "slug existence check failed; relying on the unique index"
                ),
            }
        }

        if category.id.is_nil() {
            category.id = CategoryId::new();
        }
        let now = Utc::now();
        category.created_at = now;
        category.updated_at = now;
        clear_derived(&mut category);

        self.categories.store(&category).await?;
        info!(id = %category.id, slug = %category.slug, "category stored");
        Ok(category)
    }

    /// Replace a category. It may not become its own ancestor.
    #[instrument(skip_all, fields(id = %category.id))]
    pub async fn update(&self, mut category: Category) -> Result<Category> {
        validate_category(&category)?;
        let existing = self.categories.get_by_id(category.id).await?;

        if let Some(parent) = category.parent_id {
            self.check_reparent(category.id, parent).await?;
        }

        let base = if category.slug.is_empty() {
            slug_base(&category.name)
        } else {
            category.slug.clone()
        };
        category.slug = self.unique_slug(&base, Some(category.id)).await?;

        category.created_at = existing.created_at;
        category.updated_at = Utc::now();
        clear_derived(&mut category);

        self.categories.update(&category).await?;
        info!(id = %category.id, slug = %category.slug, "category updated");
        Ok(category)
    }

    /// Delete a category. Its children become roots.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn delete(&self, id: CategoryId) -> Result<()> {
        self.categories.get_by_id(id).await?;
        self.categories.delete(id).await?;
        info!(id = %id, "category deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn unique_slug(&self, base: &str, exclude: Option<CategoryId>) -> Result<String> {
        let lookup = CategorySlugs(self.categories.as_ref());
        let resolution = ensure_unique_slug(
            &lookup,
            base,
            exclude.map(|id| id.0),
            self.config.max_slug_attempts,
        )
        .await?;
        Ok(resolution.into_slug())
    }

    async fn require_parent(&self, parent: CategoryId) -> Result<Category> {
        match self.categories.get_by_id(parent).await {
            Ok(category) => Ok(category),
            Err(e) if e.is_not_found() => Err(FolioError::bad_input(format!(
                "parent category {parent} does not exist"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Reject a parent that is `id` itself or one of its descendants.
    async fn check_reparent(&self, id: CategoryId, parent: CategoryId) -> Result<()> {
        if parent == id {
            return Err(FolioError::bad_input("a category cannot be its own parent"));
        }

        let mut current = self.require_parent(parent).await?;
        let mut seen = HashSet::new();
        for _ in 0..MAX_ANCESTOR_WALK {
            let Some(next) = current.parent_id else {
                return Ok(());
            };
            if next == id {
                return Err(FolioError::bad_input(format!(
                    "category {parent} is a descendant of {id}"
                )));
            }
            if !seen.insert(next) {
                // Pre-existing cycle above the new parent; it cannot involve `id`.
                return Ok(());
            }
            current = self.categories.get_by_id(next).await?;
        }
        Err(FolioError::bad_input("category hierarchy is too deep"))
    }
}

fn clear_derived(category: &mut Category) {
    category.children.clear();
    category.level = 0;
    category.path.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::MemoryStore;

    fn service(store: &Arc<MemoryStore>) -> CategoryService {
        CategoryService::new(store.clone(), ServiceConfig::default())
    }

    fn named(name: &str) -> Category {
        Category {
            name: name.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn store_generates_slug_and_checks_parent() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);

        let tech = svc.store(named("Tech News")).await.unwrap();
        assert_eq!(tech.slug, "tech-news");

        let dup = svc.store(named("Tech News!")).await.unwrap();
        assert_eq!(dup.slug, "tech-news-1");

        let mut orphan = named("Orphan");
        orphan.parent_id = Some(CategoryId::new());
        let err = svc.store(orphan).await.unwrap_err();
        assert!(matches!(err, FolioError::BadInput { .. }));

        let mut child = named("Rust");
        child.parent_id = Some(tech.id);
        assert!(svc.store(child).await.is_ok());
    }

    #[tokio::test]
    async fn store_conflicts_on_taken_slug() {
        let store = Arc::new(MemoryStore::new());
        store.add_category("Tech", "tech", None);

        let mut category = named("Technology");
        category.slug = "tech".into();
        let err = service(&store).store(category).await.unwrap_err();
        assert!(matches!(err, FolioError::Conflict { .. }));
    }

    #[tokio::test]
    async fn supplied_slug_survives_failing_slug_check() {
        let mut store = MemoryStore::new();
        store.fail_slug_checks = true;
        let store = Arc::new(store);
        let svc = service(&store);

        let mut category = named("Technology");
        category.slug = "tech".into();
        let stored = svc.store(category).await.unwrap();
        assert_eq!(stored.slug, "tech");

        let mut dup = named("Tech again");
        dup.slug = "tech".into();
        let err = svc.store(dup).await.unwrap_err();
        assert!(matches!(err, FolioError::Conflict { .. }));
    }

    #[tokio::test]
    async fn category_cannot_become_its_own_ancestor() {
        let store = Arc::new(MemoryStore::new());
        let root = store.add_category("Root", "root", None);
        let mid = store.add_category("Mid", "mid", Some(root));
        let leaf = store.add_category("Leaf", "leaf", Some(mid));
        let svc = service(&store);

        let mut own = store.category(root).unwrap();
        own.parent_id = Some(root);
        assert!(matches!(
            svc.update(own).await.unwrap_err(),
            FolioError::BadInput { .. }
        ));

        let mut under_leaf = store.category(root).unwrap();
        under_leaf.parent_id = Some(leaf);
        assert!(matches!(
            svc.update(under_leaf).await.unwrap_err(),
            FolioError::BadInput { .. }
        ));

        // Moving the leaf under the root is fine.
        let mut moved = store.category(leaf).unwrap();
        moved.parent_id = Some(root);
        let updated = svc.update(moved).await.unwrap();
        assert_eq!(updated.parent_id, Some(root));
        assert_eq!(updated.slug, "leaf");
    }

    #[tokio::test]
    async fn tree_nests_all_levels() {
        let store = Arc::new(MemoryStore::new());
        let tech = store.add_category("Tech", "tech", None);
        let lang = store.add_category("Languages", "languages", Some(tech));
        store.add_category("Rust", "rust", Some(lang));
        store.add_category("Life", "life", None);

        let tree = service(&store).tree().await.unwrap();
        assert_eq!(tree.len(), 2);
        let tech_node = tree.iter().find(|c| c.id == tech).unwrap();
        let rust = &tech_node.children[0].children[0];
        assert_eq!(rust.path, "tech/languages/rust");
        assert_eq!(rust.level, 2);
    }

    #[tokio::test]
    async fn get_with_children_attaches_direct_children() {
        let store = Arc::new(MemoryStore::new());
        let tech = store.add_category("Tech", "tech", None);
        let lang = store.add_category("Languages", "languages", Some(tech));
        store.add_category("Rust", "rust", Some(lang));
        store.add_category("AI", "ai", Some(tech));
        let svc = service(&store);

        let category = svc.get_with_children("tech").await.unwrap();
        let names: Vec<_> = category.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["AI", "Languages"]);
        assert!(category.children.iter().all(|c| c.children.is_empty()));

        assert_eq!(svc.children_of_slug("languages").await.unwrap().len(), 1);
        assert_eq!(svc.roots().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_pages_by_cursor() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..3 {
            store.add_category(&format!("C{i}"), &format!("c{i}"), None);
        }
        let svc = service(&store);

        let page = svc.fetch(None, Some(2)).await.unwrap();
        assert_eq!(page.items.len(), 2);
        let rest = svc
            .fetch(page.next_cursor.as_deref(), Some(2))
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        assert!(svc.delete(CategoryId::new()).await.unwrap_err().is_not_found());

        let root = store.add_category("Root", "root", None);
        let child = store.add_category("Child", "child", Some(root));
        svc.delete(root).await.unwrap();
        assert!(store.category(child).unwrap().parent_id.is_none());
    }
}

//! Concurrent author enrichment.
//!
//! Articles come out of storage carrying only their author id. This module
//! looks up each distinct author once, in parallel, and merges the results
//! back only when every lookup succeeded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use folio_shared::{Article, Author, AuthorId, AuthorRepository, FolioError, Result};

/// Look up the author of every article, at most `max_concurrency` at a time.
///
/// Each distinct author id is fetched exactly once. Articles with an
/// unassigned (nil) author are skipped. The first failed lookup aborts the
/// remaining ones and is returned as the error.
#[instrument(skip_all, fields(articles = articles.len(), max_concurrency = max_concurrency))]
pub async fn resolve_authors(
    repo: Arc<dyn AuthorRepository>,
    articles: &[Article],
    max_concurrency: usize,
) -> Result<HashMap<AuthorId, Author>> {
    let ids: HashSet<AuthorId> = articles
        .iter()
        .map(|a| a.author.id)
        .filter(|id| !id.is_nil())
        .collect();

    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut lookups = JoinSet::new();

    for id in ids {
        let repo = Arc::clone(&repo);
        let sem = Arc::clone(&semaphore);
        lookups.spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| FolioError::Storage(format!("author lookup gate closed: {e}")))?;
            repo.get_by_id(id).await.map(|author| (id, author))
        });
    }

    let mut authors = HashMap::with_capacity(lookups.len());
    while let Some(joined) = lookups.join_next().await {
        match joined {
            Ok(Ok((id, author))) => {
                authors.insert(id, author);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "author lookup failed, aborting remaining lookups");
                lookups.abort_all();
                return Err(e);
            }
            Err(e) => {
                lookups.abort_all();
                return Err(FolioError::Storage(format!("author lookup task failed: {e}")));
            }
        }
    }

    debug!(authors = authors.len(), "authors resolved");
    Ok(authors)
}

/// Replace each article's author reference with the resolved author.
pub fn apply_authors(articles: &mut [Article], authors: &HashMap<AuthorId, Author>) {
    for article in articles {
        if let Some(author) = authors.get(&article.author.id) {
            article.author = author.clone();
        }
    }
}

/// Resolve and apply authors in one step. On error `articles` is untouched.
pub async fn enrich_authors(
    repo: Arc<dyn AuthorRepository>,
    articles: &mut [Article],
    max_concurrency: usize,
) -> Result<()> {
    let authors = resolve_authors(repo, articles, max_concurrency).await?;
    apply_authors(articles, &authors);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use folio_shared::ArticleId;

    use crate::testing::MemoryStore;

    fn article(author: AuthorId) -> Article {
        Article {
            id: ArticleId::new(),
            author: Author::reference(author),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn each_author_is_looked_up_once() {
        let store = Arc::new(MemoryStore::new());
        let x = store.add_author("X");
        let y = store.add_author("Y");
        let mut articles = vec![article(x), article(x), article(y)];

        enrich_authors(store.clone(), &mut articles, 8).await.unwrap();

        assert_eq!(store.author_lookups.load(Ordering::SeqCst), 2);
        assert_eq!(articles[0].author.name, "X");
        assert_eq!(articles[1].author.name, "X");
        assert_eq!(articles[2].author.name, "Y");
    }

    #[tokio::test]
    async fn failed_lookup_fails_the_batch() {
        let store = Arc::new(MemoryStore::new());
        let x = store.add_author("X");
        let y = store.add_author("Y");
        store.fail_author(y);
        let mut articles = vec![article(x), article(x), article(y)];

        let err = enrich_authors(store.clone(), &mut articles, 8)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("author service down"));
        // Nothing was merged.
        assert!(articles.iter().all(|a| a.author.name.is_empty()));
    }

    #[tokio::test]
    async fn unknown_author_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let articles = vec![article(AuthorId::new())];
        let err = resolve_authors(store, &articles, 4).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let mut store = MemoryStore::new();
        store.author_delay = Some(Duration::from_millis(20));
        let store = Arc::new(store);
        let articles: Vec<_> = (0..10)
            .map(|i| article(store.add_author(&format!("A{i}"))))
            .collect();

        let authors = resolve_authors(store.clone(), &articles, 3).await.unwrap();

        assert_eq!(authors.len(), 10);
        assert!(store.peak_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn nil_authors_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let articles = vec![article(AuthorId::nil())];
        let authors = resolve_authors(store.clone(), &articles, 4).await.unwrap();
        assert!(authors.is_empty());
        assert_eq!(store.author_lookups.load(Ordering::SeqCst), 0);
    }
}

//! Field validation for incoming articles and categories.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use folio_shared::{Article, Category, FolioError, Result};

/// Whether `slug` only contains ASCII letters, digits and hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    static SLUG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("valid regex"));
    SLUG_RE.is_match(slug)
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FolioError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn optional_slug(slug: &str) -> Result<()> {
    if !slug.is_empty() && !is_valid_slug(slug) {
        return Err(FolioError::validation(format!(
            "slug '{slug}' may only contain letters, digits and hyphens"
        )));
    }
    Ok(())
}

fn optional_url(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(FolioError::validation(format!(
            "{field} must be an http(s) URL, got scheme '{}'",
            url.scheme()
        ))),
        Err(e) => Err(FolioError::validation(format!("{field} is not a valid URL: {e}"))),
    }
}

/// Check the fields an article must carry before it is persisted.
pub fn validate_article(article: &Article) -> Result<()> {
    require("title", &article.title)?;
    require("content", &article.content)?;
    optional_slug(&article.slug)?;
    optional_url("thumbnail", &article.thumbnail)?;
    optional_url("image", &article.image)
}

/// Check the fields a category must carry before it is persisted.
pub fn validate_category(category: &Category) -> Result<()> {
    require("name", &category.name)?;
    optional_slug(&category.slug)?;
    optional_url("image", &category.image)
}

//! Slug generation and uniqueness resolution.
//!
//! [`generate_slug`] turns a title into a URL-safe base slug;
//! [`ensure_unique_slug`] appends `-1`, `-2`, ... until the candidate is free.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use folio_shared::{FolioError, Result, SlugLookup};

/// Base slug used when a title yields no usable characters.
pub const FALLBACK_SLUG: &str = "untitled";

/// Turn a title into a lower-case, hyphen-separated slug.
///
/// Only ASCII letters, digits, ASCII whitespace and hyphens survive the first
/// pass, so accented letters and Unicode spaces such as NBSP are dropped
/// rather than transliterated. The result may be empty.
pub fn generate_slug(title: &str) -> String {
    // `\s` is Unicode-aware in `regex`; spell out the ASCII set instead.
    static DISALLOWED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9\t\n\x0C\r -]").expect("valid regex"));
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\t\n\x0C\r ]+").expect("valid regex"));
    static HYPHENS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("valid regex"));

    let lower = title.to_lowercase();
    let stripped = DISALLOWED_RE.replace_all(&lower, "");
    let hyphenated = WHITESPACE_RE.replace_all(&stripped, "-");
    let collapsed = HYPHENS_RE.replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}

/// Slug base for `title`, falling back to [`FALLBACK_SLUG`] when empty.
pub fn slug_base(title: &str) -> String {
    let slug = generate_slug(title);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Outcome of [`ensure_unique_slug`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugResolution {
    /// The slug was confirmed free.
    Unique(String),
    /// The existence check failed; the slug is the last candidate tried and
    /// the storage UNIQUE constraint is left to catch a collision.
    Unchecked { slug: String, error: String },
}

impl SlugResolution {
    pub fn slug(&self) -> &str {
        match self {
            Self::Unique(slug) | Self::Unchecked { slug, .. } => slug,
        }
    }

    pub fn into_slug(self) -> String {
        match self {
            Self::Unique(slug) | Self::Unchecked { slug, .. } => slug,
        }
    }
}

/// Find a slug derived from `base` that no entity other than `exclude` uses.
///
/// Tries `base`, then `base-1` up to `base-{max_attempts}`. Running out of
/// candidates is a [`FolioError::Conflict`]. A failing existence check stops
/// the search and yields [`SlugResolution::Unchecked`] instead of an error.
pub async fn ensure_unique_slug(
    repo: &dyn SlugLookup,
    base: &str,
    exclude: Option<Uuid>,
    max_attempts: u32,
) -> Result<SlugResolution> {
    let mut candidate = base.to_string();
    let mut counter: u32 = 1;

    loop {
        match repo.slug_exists_excluding_id(&candidate, exclude).await {
            Ok(false) => {
                debug!(slug = %candidate, attempts = counter, "slug resolved");
                return Ok(SlugResolution::Unique(candidate));
            }
            Ok(true) => {}
            Err(e) => {
                warn!(slug = %candidate, error = %e, "slug existence check failed, using candidate unchecked");
                return Ok(SlugResolution::Unchecked {
                    slug: candidate,
                    error: e.to_string(),
                });
            }
        }

        if counter > max_attempts {
            return Err(FolioError::conflict(format!(
                "no free slug for '{base}' after {max_attempts} attempts"
            )));
        }
        candidate = format!("{base}-{counter}");
        counter += 1;
    }
}

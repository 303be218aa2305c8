//! Core domain types for Folio articles, categories and authors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-sortable identifier (UUID v7).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// The "not assigned" identifier.
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Whether this identifier is still unassigned.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Article identifier.
    ArticleId
);
entity_id!(
    /// Category identifier.
    CategoryId
);
entity_id!(
    /// Author identifier.
    AuthorId
);

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

/// An article author. Owned by an external collaborator; Folio only reads it.
///
/// Articles loaded from storage carry an `Author` with only `id` set until
/// the author details are resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bio: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub avatar: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Author {
    /// An author reference carrying only its identifier.
    pub fn reference(id: AuthorId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A node in the category hierarchy.
///
/// `children`, `level` and `path` are derived when a tree is built and are
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CategoryId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Category>,
    #[serde(skip_serializing_if = "is_zero")]
    pub level: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// A published or draft article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub thumbnail: String,
    pub image: String,
    pub short_description: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub categories: Vec<Category>,
    pub author: Author,
    pub reading_time_minutes: u32,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Identifiers of the categories attached to this article.
    pub fn category_ids(&self) -> Vec<CategoryId> {
        self.categories.iter().map(|c| c.id).collect()
    }
}

/// A single navigation step in an article breadcrumb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadcrumbItem {
    pub name: String,
    pub link: String,
}

impl BreadcrumbItem {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
        }
    }
}

/// Read-only view of an article with its derived breadcrumb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleResponse {
    #[serde(flatten)]
    pub article: Article,
    pub breadcrumb: Vec<BreadcrumbItem>,
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// Reference to an author by identifier, as sent in update payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: AuthorId,
}

/// Reference to a category by identifier, as sent in update payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
}

/// A partial article update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub thumbnail: Option<String>,
    pub image: Option<String>,
    pub short_description: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<CategoryRef>>,
    pub author: Option<AuthorRef>,
    pub reading_time_minutes: Option<u32>,
    pub views: Option<u64>,
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    pub published: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ArticlePatch {
    /// Apply every present field onto `article`.
    pub fn apply_to(&self, article: &mut Article) {
        macro_rules! assign {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &self.$field {
                    article.$field = value.clone();
                })*
            };
        }
        assign!(
            title,
            slug,
            content,
            thumbnail,
            image,
            short_description,
            meta_description,
            keywords,
            tags,
            reading_time_minutes,
            views,
            likes,
            comments,
            published,
        );
        if let Some(published_at) = self.published_at {
            article.published_at = Some(published_at);
        }
        if let Some(author) = self.author {
            article.author = Author::reference(author.id);
        }
        if let Some(categories) = &self.categories {
            article.categories = categories
                .iter()
                .map(|c| Category {
                    id: c.id,
                    ..Default::default()
                })
                .collect();
        }
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// One page of a keyset-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page; `None` when this page is the last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }
}

//! Shared types, error model, configuration and repository contracts for Folio.
//!
//! This crate is the foundation depended on by all other Folio crates.
//! It provides:
//! - [`FolioError`], the unified error type
//! - Domain types ([`Article`], [`Category`], [`Author`], [`ArticleResponse`])
//! - Configuration ([`AppConfig`], [`ServiceConfig`], config loading)
//! - Repository traits implemented by `folio-storage`

pub mod config;
pub mod error;
pub mod repository;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatabaseConfig, ServerConfig, ServiceConfig, ServiceSettings, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{FolioError, Result};
pub use repository::{
    ArticleRepository, ArticleSlugs, AuthorRepository, CategoryRepository, CategorySlugs,
    SlugLookup,
};
pub use types::{
    Article, ArticleId, ArticlePatch, ArticleResponse, Author, AuthorId, AuthorRef,
    BreadcrumbItem, Category, CategoryId, CategoryRef, Page,
};

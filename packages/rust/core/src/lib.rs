//! Domain logic for Folio.
//!
//! This crate holds the slug generator and uniqueness resolver, the category
//! tree builder, breadcrumb generation, concurrent author enrichment, and the
//! article and category services that compose them over the repository
//! traits from `folio-shared`.

pub mod article;
pub mod breadcrumb;
pub mod category;
pub mod enrichment;
pub mod pagination;
pub mod slug;
pub mod tree;
pub mod validation;

#[cfg(test)]
mod testing;

pub use article::ArticleService;
pub use category::CategoryService;
pub use slug::{SlugResolution, ensure_unique_slug, generate_slug};
pub use tree::{CategoryForest, assemble_tree, build_tree};

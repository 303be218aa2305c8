//! Breadcrumb navigation for article pages.

use folio_shared::{Article, BreadcrumbItem, Category};

/// Build `Home > categories... > article` for `article`.
///
/// Categories are used as given: no ancestor walk and no deduplication.
pub fn generate_breadcrumb(article: &Article, categories: &[Category]) -> Vec<BreadcrumbItem> {
    let mut crumbs = Vec::with_capacity(categories.len() + 2);
    crumbs.push(BreadcrumbItem::new("Home", "/"));
    crumbs.extend(
        categories
            .iter()
            .map(|c| BreadcrumbItem::new(c.name.clone(), format!("/categories/{}", c.slug))),
    );
    crumbs.push(BreadcrumbItem::new(
        article.title.clone(),
        format!("/articles/{}", article.slug),
    ));
    crumbs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article {
            title: "A".into(),
            slug: "a".into(),
            ..Default::default()
        }
    }

    fn category(name: &str, slug: &str) -> Category {
        Category {
            name: name.into(),
            slug: slug.into(),
            ..Default::default()
        }
    }

    #[test]
    fn no_categories_gives_home_and_article() {
        let crumbs = generate_breadcrumb(&article(), &[]);
        assert_eq!(
            crumbs,
            vec![
                BreadcrumbItem::new("Home", "/"),
                BreadcrumbItem::new("A", "/articles/a"),
            ]
        );
    }

    #[test]
    fn categories_sit_between_home_and_article() {
        let crumbs = generate_breadcrumb(&article(), &[category("Tech", "tech")]);
        assert_eq!(
            crumbs,
            vec![
                BreadcrumbItem::new("Home", "/"),
                BreadcrumbItem::new("Tech", "/categories/tech"),
                BreadcrumbItem::new("A", "/articles/a"),
            ]
        );
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let tech = category("Tech", "tech");
        let crumbs = generate_breadcrumb(&article(), &[tech.clone(), category("Go", "go"), tech]);
        let names: Vec<_> = crumbs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Home", "Tech", "Go", "Tech", "A"]);
    }
}

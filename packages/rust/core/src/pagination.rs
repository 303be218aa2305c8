//! Keyset pagination helpers.
//!
//! The cursor is the textual id of the last item on a page. Ids are UUID v7,
//! so ordering by id follows creation order.

use std::fmt::Display;
use std::str::FromStr;

use folio_shared::{FolioError, Result};

/// Parse an optional client cursor. Empty strings mean "first page".
pub fn parse_cursor<T: FromStr>(raw: Option<&str>) -> Result<Option<T>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| FolioError::bad_input(format!("invalid cursor '{s}'"))),
    }
}

/// Resolve a requested page size, substituting `default` for zero.
pub fn page_size(requested: Option<u32>, default: u32) -> u32 {
    match requested {
        Some(n) if n > 0 => n,
        _ => default.max(1),
    }
}

/// Cursor for the page after `items`, present only when the page is full.
pub fn next_cursor<T, K: Display>(items: &[T], limit: u32, key: impl Fn(&T) -> K) -> Option<String> {
    if items.len() < limit as usize {
        return None;
    }
    items.last().map(|item| key(item).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_shared::ArticleId;

    #[test]
    fn cursor_parsing() {
        assert_eq!(parse_cursor::<ArticleId>(None).unwrap(), None);
        assert_eq!(parse_cursor::<ArticleId>(Some("")).unwrap(), None);

        let id = ArticleId::new();
        let parsed = parse_cursor::<ArticleId>(Some(&id.to_string())).unwrap();
        assert_eq!(parsed, Some(id));

        let err = parse_cursor::<ArticleId>(Some("not-a-uuid")).unwrap_err();
        assert!(matches!(err, FolioError::BadInput { .. }));
    }

    #[test]
    fn page_size_defaults() {
        assert_eq!(page_size(None, 10), 10);
        assert_eq!(page_size(Some(0), 10), 10);
        assert_eq!(page_size(Some(3), 10), 3);
    }

    #[test]
    fn cursor_only_for_full_pages() {
        let items = vec![1, 2, 3];
        assert_eq!(next_cursor(&items, 3, |i| *i), Some("3".to_string()));
        assert_eq!(next_cursor(&items, 4, |i| *i), None);
        assert_eq!(next_cursor::<i32, i32>(&[], 1, |i| *i), None);
    }
}

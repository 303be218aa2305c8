//! Category tree builder.
//!
//! Turns the flat category list from storage into a forest of roots with
//! children nested to full depth, filling the derived `level` and `path`.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use folio_shared::{Category, CategoryId};

/// A built category forest plus the nodes that could not be placed.
#[derive(Debug, Clone, Default)]
pub struct CategoryForest {
    /// Root categories in input order, children nested.
    pub roots: Vec<Category>,
    /// Categories unreachable from any root: orphans whose parent is missing
    /// and members of parent cycles.
    pub dropped: Vec<CategoryId>,
}

/// Build the category forest from a flat list.
///
/// Siblings keep their relative input order. A category whose parent id does
/// not appear in `flat` is dropped, not promoted to a root.
pub fn assemble_tree(flat: Vec<Category>) -> CategoryForest {
    let mut roots = Vec::new();
    let mut children_of: HashMap<CategoryId, Vec<Category>> = HashMap::new();

    for mut category in flat {
        category.children.clear();
        match category.parent_id {
            None => roots.push(category),
            Some(parent) => children_of.entry(parent).or_default().push(category),
        }
    }

    let roots: Vec<Category> = roots
        .into_iter()
        .map(|root| attach_children(root, &mut children_of))
        .collect();

    // Anything still waiting for a parent was never reached from a root.
    let mut dropped: Vec<CategoryId> = children_of
        .into_values()
        .flatten()
        .map(|c| c.id)
        .collect();
    dropped.sort();

    CategoryForest { roots, dropped }
}

/// Build the category forest, logging any dropped nodes.
#[instrument(skip_all, fields(count = flat.len()))]
pub fn build_tree(flat: Vec<Category>) -> Vec<Category> {
    let forest = assemble_tree(flat);
    if !forest.dropped.is_empty() {
        warn!(
            dropped = forest.dropped.len(),
            ids = ?forest.dropped,
            "categories unreachable from any root were left out of the tree"
        );
    }
    debug!(roots = forest.roots.len(), "category tree built");
    forest.roots
}

/// Nest every descendant of `root`, filling `level` and `path`.
///
/// Works on an explicit stack so hierarchy depth is bounded by memory, not
/// by the call stack. Removing each entry from `children_of` means a node is
/// attached at most once.
fn attach_children(
    mut root: Category,
    children_of: &mut HashMap<CategoryId, Vec<Category>>,
) -> Category {
    root.level = 0;
    root.path = root.slug.clone();

    // Flattened pre-order: `parents[i]` indexes the parent of `nodes[i]`,
    // which always comes earlier.
    let mut nodes: Vec<Option<Category>> = vec![Some(root)];
    let mut parents: Vec<usize> = vec![0];
    let mut pending = vec![0usize];

    while let Some(i) = pending.pop() {
        let Some(node) = nodes[i].as_ref() else {
            continue;
        };
        let (id, level, path) = (node.id, node.level, node.path.clone());
        for mut child in children_of.remove(&id).unwrap_or_default() {
            child.level = level + 1;
            child.path = format!("{path}/{}", child.slug);
            pending.push(nodes.len());
            parents.push(i);
            nodes.push(Some(child));
        }
    }

    // Fold back up. Visiting in reverse collects siblings backwards.
    for i in (1..nodes.len()).rev() {
        if let Some(mut node) = nodes[i].take() {
            node.children.reverse();
            if let Some(parent) = nodes[parents[i]].as_mut() {
                parent.children.push(node);
            }
        }
    }

    let mut root = nodes[0].take().unwrap_or_default();
    root.children.reverse();
    root
}

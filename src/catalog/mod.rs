//! Content catalog boundary
//!
//! The knowledge base itself is an external collaborator; this module only
//! defines the interface the rotation core consumes, plus a JSON file
//! adapter used by the CLI and daemon.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A single publishable piece of the knowledge base
///
/// The `title`/`body` payload is opaque to the rotation core; only the
/// stable `id` and the `category` membership drive scheduling decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable, unique identifier
    pub id: String,

    /// Category this item belongs to (exactly one)
    pub category: String,

    /// Display title
    pub title: String,

    /// Body text
    #[serde(default)]
    pub body: String,
}

impl ContentItem {
    /// Create a new content item
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Read interface over the content catalog
pub trait ContentCatalog: Send + Sync {
    /// All items in the catalog, in stable order
    fn all_items(&self) -> Vec<ContentItem>;

    /// Items grouped by category id, each list in stable order
    fn items_by_category(&self) -> HashMap<String, Vec<ContentItem>>;

    /// Look up a single item by id
    fn item_by_id(&self, id: &str) -> Option<ContentItem> {
        self.all_items().into_iter().find(|item| item.id == id)
    }
}

/// Catalog backed by a JSON document on disk
///
/// The document is a flat array of [`ContentItem`] records. Item order in
/// the file defines the per-category rotation order.
pub struct JsonCatalog {
    items: Vec<ContentItem>,
}

impl JsonCatalog {
    /// Load the catalog from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

        let items: Vec<ContentItem> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;

        Ok(Self { items })
    }

    /// Build a catalog from in-memory items
    pub fn from_items(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    /// Number of items in the catalog
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ContentCatalog for JsonCatalog {
    fn all_items(&self) -> Vec<ContentItem> {
        self.items.clone()
    }

    fn items_by_category(&self) -> HashMap<String, Vec<ContentItem>> {
        let mut map: HashMap<String, Vec<ContentItem>> = HashMap::new();
        for item in &self.items {
            map.entry(item.category.clone())
                .or_default()
                .push(item.clone());
        }
        map
    }

    fn item_by_id(&self, id: &str) -> Option<ContentItem> {
        self.items.iter().find(|item| item.id == id).cloned()
    }
}

/// Immutable snapshot of the catalog shape consumed by the planner
///
/// Holds only item ids, so the planner stays independent of payloads.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    /// Total number of items across all categories
    pub total: usize,

    /// Ordered item ids per category
    by_category: HashMap<String, Vec<String>>,
}

impl CatalogIndex {
    /// Build an index snapshot from a catalog
    pub fn from_catalog(catalog: &dyn ContentCatalog) -> Self {
        let grouped = catalog.items_by_category();
        let total = grouped.values().map(Vec::len).sum();
        let by_category = grouped
            .into_iter()
            .map(|(category, items)| {
                (category, items.into_iter().map(|item| item.id).collect())
            })
            .collect();

        Self { total, by_category }
    }

    /// Ordered item ids for a category (empty slice if unknown)
    pub fn items_in(&self, category: &str) -> &[String] {
        self.by_category
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_items() -> Vec<ContentItem> {
        vec![
            ContentItem::new("a1", "algorithms", "Sorting", "Merge sort basics"),
            ContentItem::new("a2", "algorithms", "Graphs", "BFS and DFS"),
            ContentItem::new("d1", "databases", "Indexes", "B-tree layout"),
        ]
    }

    #[test]
    fn test_json_catalog_from_items() {
        let catalog = JsonCatalog::from_items(sample_items());
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.item_by_id("d1").unwrap().category, "databases");
        assert!(catalog.item_by_id("missing").is_none());
    }

    #[test]
    fn test_items_by_category_preserves_order() {
        let catalog = JsonCatalog::from_items(sample_items());
        let grouped = catalog.items_by_category();

        let algo: Vec<_> = grouped["algorithms"].iter().map(|i| i.id.as_str()).collect();
        assert_eq!(algo, vec!["a1", "a2"]);
    }

    #[test]
    fn test_catalog_index() {
        let catalog = JsonCatalog::from_items(sample_items());
        let index = CatalogIndex::from_catalog(&catalog);

        assert_eq!(index.total, 3);
        assert_eq!(index.items_in("algorithms"), &["a1", "a2"]);
        assert!(index.items_in("unknown").is_empty());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut file = NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&sample_items()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let catalog = JsonCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_from_file_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();

        assert!(JsonCatalog::from_file(file.path()).is_err());
    }
}

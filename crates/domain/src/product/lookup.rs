//! Uniqueness lookup consulted before a product is created.

use std::sync::{PoisonError, RwLock};

use common::AggregateId;

/// A product identity known to the lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductLookupEntry {
    pub product_id: AggregateId,
    pub title: String,
}

/// Lookup of existing products by identifier or title.
pub trait ProductLookup: Send + Sync {
    /// Returns an entry whose identifier or title matches.
    fn find(&self, product_id: &AggregateId, title: &str) -> Option<ProductLookupEntry>;

    /// Records an entry unless one with the same identifier or title is
    /// already present. Returns false when the entry clashes.
    fn claim(&self, entry: ProductLookupEntry) -> bool;

    /// Drops a claim whose creation was not committed.
    fn release(&self, product_id: &AggregateId);
}

/// [`ProductLookup`] backed by an in-process table.
#[derive(Debug, Default)]
pub struct InMemoryProductLookup {
    entries: RwLock<Vec<ProductLookupEntry>>,
}

impl InMemoryProductLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn matches(entry: &ProductLookupEntry, product_id: &AggregateId, title: &str) -> bool {
    &entry.product_id == product_id || entry.title == title
}

impl ProductLookup for InMemoryProductLookup {
    fn find(&self, product_id: &AggregateId, title: &str) -> Option<ProductLookupEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| matches(e, product_id, title))
            .cloned()
    }

    fn claim(&self, entry: ProductLookupEntry) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .iter()
            .any(|e| matches(e, &entry.product_id, &entry.title))
        {
            return false;
        }
        entries.push(entry);
        true
    }

    fn release(&self, product_id: &AggregateId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|e| &e.product_id != product_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str) -> ProductLookupEntry {
        ProductLookupEntry {
            product_id: AggregateId::from(id),
            title: title.to_string(),
        }
    }

    #[test]
    fn find_matches_by_id_or_title() {
        let lookup = InMemoryProductLookup::new();
        assert!(lookup.claim(entry("P-1", "Keyboard")));

        assert!(lookup.find(&AggregateId::from("P-1"), "Other").is_some());
        assert!(lookup.find(&AggregateId::from("P-2"), "Keyboard").is_some());
        assert!(lookup.find(&AggregateId::from("P-2"), "Mouse").is_none());
    }

    #[test]
    fn claim_rejects_clashes_and_release_frees_them() {
        let lookup = InMemoryProductLookup::new();
        assert!(lookup.claim(entry("P-1", "Keyboard")));
        assert!(!lookup.claim(entry("P-2", "Keyboard")));
        assert!(!lookup.claim(entry("P-1", "Mouse")));

        lookup.release(&AggregateId::from("P-1"));
        assert!(lookup.is_empty());
        assert!(lookup.claim(entry("P-2", "Keyboard")));
        assert_eq!(lookup.len(), 1);
    }
}

//! Per-document parse cache
//!
//! The only shared structure in an otherwise pure, call-per-snapshot
//! model: a process-wide map keyed by document identity. Each key holds
//! at most one entry, fingerprinted by content hash and replaced whenever
//! the hash stops matching.

use ledgerlens_parser::{content_hash, Document, LedgerParser};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct CacheEntry {
    hash: String,
    document: Arc<Document>,
}

/// Content-hash keyed cache of parsed documents
#[derive(Default)]
pub struct DocumentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached parse for `key` when the content still matches,
    /// otherwise parse and replace the entry
    pub fn get_or_parse(&self, key: &str, text: &str) -> Arc<Document> {
        let hash = content_hash(text);
        {
            let entries = self.entries.read().unwrap();
            if let Some(entry) = entries.get(key) {
                if entry.hash == hash {
                    log::debug!("cache hit for '{}' ({})", key, hash);
                    return Arc::clone(&entry.document);
                }
            }
        }

        log::debug!("cache miss for '{}' ({})", key, hash);
        let document = Arc::new(LedgerParser::parse(text));
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                hash,
                document: Arc::clone(&document),
            },
        );
        document
    }

    /// Drop the entry for a document, if present
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.write().unwrap().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_returns_same_document() {
        let cache = DocumentCache::new();
        let text = "2024-01-01 Shop\n Expenses:Food  $5.00\n Assets:Cash\n";
        let a = cache.get_or_parse("journal.ledger", text);
        let b = cache.get_or_parse("journal.ledger", text);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_replaces_on_content_change() {
        let cache = DocumentCache::new();
        let a = cache.get_or_parse("journal.ledger", "2024-01-01 One");
        let b = cache.get_or_parse("journal.ledger", "2024-01-01 Two");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.transactions[0].payee, "Two");
        // one entry per key, old snapshot replaced
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_keys_are_independent() {
        let cache = DocumentCache::new();
        cache.get_or_parse("a.ledger", "2024-01-01 A");
        cache.get_or_parse("b.ledger", "2024-01-01 B");
        assert_eq!(cache.len(), 2);
        assert!(cache.invalidate("a.ledger"));
        assert!(!cache.invalidate("a.ledger"));
        assert_eq!(cache.len(), 1);
    }
}

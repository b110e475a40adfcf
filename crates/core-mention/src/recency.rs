use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Default number of recently used items retained.
pub const RECENCY_CAPACITY: usize = 10;

/// A referenceable post. Identity is `id`; the other fields are display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionItem {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl SuggestionItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            slug: slug.into(),
            last_used_at: None,
        }
    }

    /// Case-insensitive substring match on title or slug. `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.slug.to_lowercase().contains(needle)
    }
}

/// Most-recently-used first, unique by id, bounded.
#[derive(Debug, Clone)]
pub struct RecencyCache {
    items: Vec<SuggestionItem>,
    capacity: usize,
}

impl Default for RecencyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RecencyCache {
    pub fn new() -> Self {
        Self::with_capacity(RECENCY_CAPACITY)
    }

    /// A zero capacity is raised to 1 so a committed mention is always remembered.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Seed from persisted records (first occurrence of an id wins, then truncate).
    pub fn from_items(items: Vec<SuggestionItem>, capacity: usize) -> Self {
        let mut cache = Self::with_capacity(capacity);
        for item in items {
            if !cache.contains(&item.id) {
                cache.items.push(item);
            }
        }
        cache.items.truncate(cache.capacity);
        trace!(target: "mention.recency", len = cache.items.len(), "recency_seeded");
        cache
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SuggestionItem] {
        &self.items
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    /// Move (or insert) `item` to the front, stamping it with the current time.
    pub fn record_use(&mut self, item: SuggestionItem) {
        self.record_use_at(item, Utc::now());
    }

    pub fn record_use_at(&mut self, mut item: SuggestionItem, at: DateTime<Utc>) {
        let previous = self.items.iter().position(|i| i.id == item.id);
        if let Some(idx) = previous {
            self.items.remove(idx);
        }
        item.last_used_at = Some(at);
        self.items.insert(0, item);
        let evicted = self.items.len().saturating_sub(self.capacity);
        self.items.truncate(self.capacity);
        debug!(
            target: "mention.recency",
            previous_index = previous,
            evicted,
            len = self.items.len(),
            "recency_recorded"
        );
    }

    /// Recency list followed by the remaining `all` items in their original order.
    pub fn merged(&self, all: &[SuggestionItem]) -> Vec<SuggestionItem> {
        let mut out = self.items.clone();
        out.extend(all.iter().filter(|i| !self.contains(&i.id)).cloned());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn item(n: usize) -> SuggestionItem {
        SuggestionItem::new(format!("id-{n}"), format!("Post {n}"), format!("post-{n}"))
    }

    fn ids(items: &[SuggestionItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn eleven_uses_keep_ten_most_recent() {
        let mut cache = RecencyCache::new();
        for n in 0..11 {
            cache.record_use(item(n));
        }
        assert_eq!(cache.len(), RECENCY_CAPACITY);
        assert_eq!(cache.items()[0].id, "id-10");
        assert_eq!(cache.items()[9].id, "id-1");
        assert!(!cache.contains("id-0"));
    }

    #[test]
    fn reuse_moves_to_front_without_duplicating() {
        let mut cache = RecencyCache::new();
        for n in 0..3 {
            cache.record_use(item(n));
        }
        cache.record_use(item(0));
        assert_eq!(ids(cache.items()), vec!["id-0", "id-2", "id-1"]);
    }

    #[test]
    fn record_use_stamps_timestamp() {
        let mut cache = RecencyCache::new();
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        cache.record_use_at(item(1), at);
        assert_eq!(cache.items()[0].last_used_at, Some(at));
    }

    #[test]
    fn merged_appends_unseen_items_in_catalog_order() {
        let mut cache = RecencyCache::new();
        cache.record_use(item(3));
        cache.record_use(item(1));
        let all: Vec<_> = (0..5).map(item).collect();
        assert_eq!(
            ids(&cache.merged(&all)),
            vec!["id-1", "id-3", "id-0", "id-2", "id-4"]
        );
    }

    #[test]
    fn seeding_dedupes_and_truncates() {
        let mut seed: Vec<_> = (0..12).map(item).collect();
        seed.insert(1, item(0));
        let cache = RecencyCache::from_items(seed, 10);
        assert_eq!(cache.len(), 10);
        assert_eq!(ids(&cache.items()[..2]), vec!["id-0", "id-1"]);
    }

    #[test]
    fn matches_title_or_slug_case_insensitively() {
        let i = SuggestionItem::new("1", "Rust Ownership", "borrow-checker");
        assert!(i.matches("owner"));
        assert!(i.matches("checker"));
        assert!(!i.matches("async"));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut i = item(7);
        i.last_used_at = Some(Utc.with_ymd_and_hms(2026, 5, 6, 7, 8, 9).unwrap());
        let json = serde_json::to_string(&i).unwrap();
        assert!(json.contains("\"lastUsedAt\""));
        let back: SuggestionItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, i);
    }
}

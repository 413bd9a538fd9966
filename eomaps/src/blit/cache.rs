use std::collections::VecDeque;

use ahash::AHashMap;
use log::debug;
use quick_cache::unsync::Cache;

use crate::layer_name::{is_combined, simple_names, ALL_LAYER};
use crate::render::Raster;

/// Default number of composited rasters kept in the combine memo.
pub const DEFAULT_COMBINE_MEMO_CAPACITY: usize = 10;

/// Cached background rasters.
///
/// Keeps one raster per exact layer name and a bounded memo of rasters composited from
/// combined layer names. Replacing or removing the raster of a simple layer clears the whole
/// memo.
///
/// When the memo is full, the least recently used composition is evicted. The `quick_cache`
/// store is sized above the memo capacity so that only the recency list decides evictions.
pub struct BackgroundCache {
    entries: AHashMap<String, Raster>,
    memo: Cache<String, Raster>,
    memo_recency: VecDeque<String>,
    memo_capacity: usize,
}

impl std::fmt::Debug for BackgroundCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundCache")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .field("memo", &self.memo_recency)
            .finish()
    }
}

impl Default for BackgroundCache {
    fn default() -> Self {
        Self::new(DEFAULT_COMBINE_MEMO_CAPACITY)
    }
}

impl BackgroundCache {
    /// Creates an empty cache with the given combine memo capacity.
    pub fn new(memo_capacity: usize) -> Self {
        let memo_capacity = memo_capacity.max(1);
        Self {
            entries: AHashMap::new(),
            memo: Cache::new(2 * memo_capacity),
            memo_recency: VecDeque::with_capacity(memo_capacity + 1),
            memo_capacity,
        }
    }

    /// Cached raster of the layer.
    pub fn get(&self, layer: &str) -> Option<&Raster> {
        self.entries.get(layer)
    }

    /// Returns true if there is a raster for the exact layer name.
    pub fn contains(&self, layer: &str) -> bool {
        self.entries.contains_key(layer)
    }

    /// Stores the raster of the layer.
    pub fn insert(&mut self, layer: &str, raster: Raster) {
        let replaced = self.entries.insert(layer.to_string(), raster).is_some();
        if replaced && !is_combined(layer) {
            self.clear_memo();
        }
    }

    /// Removes the raster of the exact layer name.
    pub fn remove(&mut self, layer: &str) -> Option<Raster> {
        let removed = self.entries.remove(layer);
        if removed.is_some() && !is_combined(layer) {
            self.clear_memo();
        }
        removed
    }

    /// Removes the raster of the simple layer and of every combined layer containing it.
    ///
    /// Invalidating the `all` layer clears the whole cache, since `all` artists are part of
    /// every layer.
    pub fn invalidate_layer(&mut self, layer: &str) {
        if layer == ALL_LAYER {
            self.clear();
            return;
        }

        let targets = simple_names(layer);
        let before = self.entries.len();
        self.entries.retain(|name, _| {
            name != layer && !simple_names(name).iter().any(|n| targets.contains(n))
        });

        if self.entries.len() != before {
            debug!("Invalidated {} cached layers for {layer:?}", before - self.entries.len());
        }
        self.clear_memo();
    }

    /// Removes all rasters and the combine memo.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.clear_memo();
    }

    /// Names of all cached layers.
    pub fn layers(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Number of cached layers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Composited raster of the combined layer. Marks the entry as most recently used.
    pub fn memo_get(&mut self, combined: &str) -> Option<&Raster> {
        if self.memo.peek(combined).is_some() {
            self.touch(combined);
        }
        self.memo.peek(combined)
    }

    /// Composited raster of the combined layer, without changing the eviction order.
    pub fn memo_peek(&self, combined: &str) -> Option<&Raster> {
        self.memo.peek(combined)
    }

    /// Stores a composited raster, evicting the least recently used ones above the capacity.
    pub fn memo_insert(&mut self, combined: &str, raster: Raster) {
        self.memo.insert(combined.to_string(), raster);
        self.touch(combined);

        while self.memo_recency.len() > self.memo_capacity {
            let Some(evicted) = self.memo_recency.pop_front() else {
                break;
            };
            debug!("Combined layer {evicted:?} evicted from the memo");
            self.memo.remove(&evicted);
        }
    }

    fn touch(&mut self, combined: &str) {
        if let Some(position) = self.memo_recency.iter().position(|name| name == combined) {
            self.memo_recency.remove(position);
        }
        self.memo_recency.push_back(combined.to_string());
    }

    /// Number of composited rasters in the memo.
    pub fn memo_len(&self) -> usize {
        self.memo_recency.len()
    }

    /// Capacity of the combine memo.
    pub fn memo_capacity(&self) -> usize {
        self.memo_capacity
    }

    /// Drops all composited rasters.
    pub fn clear_memo(&mut self) {
        if !self.memo_recency.is_empty() {
            self.memo = Cache::new(2 * self.memo_capacity);
            self.memo_recency.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    fn raster() -> Raster {
        Raster::filled(2, 2, Color::RED)
    }

    #[test]
    fn invalidates_combined_layers() {
        let mut cache = BackgroundCache::default();
        cache.insert("A", raster());
        cache.insert("B", raster());
        cache.insert("A|B{0.5}", raster());
        cache.insert("B|C", raster());

        cache.invalidate_layer("A");
        assert!(!cache.contains("A"));
        assert!(!cache.contains("A|B{0.5}"));
        assert!(cache.contains("B"));
        assert!(cache.contains("B|C"));

        cache.invalidate_layer("all");
        assert!(cache.is_empty());
    }

    #[test]
    fn changes_clear_memo() {
        let mut cache = BackgroundCache::default();
        cache.memo_insert("A|B", raster());
        assert!(cache.memo_peek("A|B").is_some());

        cache.insert("C", raster());
        assert!(cache.memo_peek("A|B").is_some());

        cache.insert("C", raster());
        assert!(cache.memo_peek("A|B").is_none());

        cache.memo_insert("A|B", raster());
        cache.remove("C");
        assert_eq!(cache.memo_len(), 0);

        cache.memo_insert("A|B", raster());
        cache.invalidate_layer("D");
        assert_eq!(cache.memo_len(), 0);
    }

    fn filled_memo() -> BackgroundCache {
        let mut cache = BackgroundCache::default();
        for i in 0..DEFAULT_COMBINE_MEMO_CAPACITY {
            cache.memo_insert(&format!("A{i}|B{i}"), raster());
        }
        cache
    }

    #[test]
    fn memo_evicts_least_recently_inserted() {
        let mut cache = filled_memo();
        cache.memo_insert("A10|B10", raster());

        assert_eq!(cache.memo_len(), DEFAULT_COMBINE_MEMO_CAPACITY);
        assert!(cache.memo_peek("A0|B0").is_none());
        for i in 1..=10 {
            assert!(cache.memo_peek(&format!("A{i}|B{i}")).is_some(), "A{i}|B{i}");
        }
    }

    #[test]
    fn memo_evicts_least_recently_used() {
        let mut cache = filled_memo();
        assert!(cache.memo_get("A0|B0").is_some());
        cache.memo_insert("A10|B10", raster());

        assert_eq!(cache.memo_len(), DEFAULT_COMBINE_MEMO_CAPACITY);
        assert!(cache.memo_peek("A0|B0").is_some());
        assert!(cache.memo_peek("A1|B1").is_none());
        assert!(cache.memo_peek("A2|B2").is_some());
    }

    #[test]
    fn reinserting_refreshes_recency() {
        let mut cache = filled_memo();
        cache.memo_insert("A0|B0", raster());
        assert_eq!(cache.memo_len(), DEFAULT_COMBINE_MEMO_CAPACITY);

        cache.memo_insert("A10|B10", raster());
        assert!(cache.memo_peek("A0|B0").is_some());
        assert!(cache.memo_peek("A1|B1").is_none());
    }
}

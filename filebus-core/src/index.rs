use crate::store::{FileVersion, StoreBackend};
use crate::Result;

/// The broker's freshness-ordered cache of the object store's listing.
///
/// Always a total, strict descending order by modification time over the full
/// listing at last refresh. Rebuilt wholesale, never merged; stale between
/// refreshes is expected and accepted.
#[derive(Debug, Default)]
pub struct VersionIndex {
    entries: Vec<FileVersion>,
}

impl VersionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-list the store and replace the index. On failure the previous
    /// entries are left untouched so the caller can keep serving stale data.
    pub async fn refresh(&mut self, store: &dyn StoreBackend) -> Result<usize> {
        let mut entries = store.list_versions().await?;
        // stable sort: equal timestamps keep the store's listing order
        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        self.entries = entries;
        Ok(self.entries.len())
    }

    /// The most recently modified entry, or `None` for an empty store.
    pub fn latest(&self) -> Option<&FileVersion> {
        self.entries.first()
    }

    /// Up to `count` entries, most recent first. Never an error: zero or an
    /// empty index yields an empty slice.
    pub fn first(&self, count: usize) -> &[FileVersion] {
        &self.entries[..count.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn at(minute: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn refresh_orders_descending_by_modification() {
        let store = MemoryStore::new();
        store.put_object("old.txt", 1, at(0));
        store.put_object("new.txt", 2, at(30));
        store.put_object("mid.txt", 3, at(15));

        let mut index = VersionIndex::new();
        assert_eq!(index.refresh(&store).await.unwrap(), 3);

        let names: Vec<&str> = index.first(10).iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["new.txt", "mid.txt", "old.txt"]);
        assert_eq!(index.latest().unwrap().name, "new.txt");
    }

    #[tokio::test]
    async fn equal_timestamps_keep_listing_order() {
        let store = MemoryStore::new();
        store.put_object("first.txt", 1, at(10));
        store.put_object("second.txt", 2, at(10));

        let mut index = VersionIndex::new();
        index.refresh(&store).await.unwrap();

        let names: Vec<&str> = index.first(10).iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["first.txt", "second.txt"]);
    }

    #[tokio::test]
    async fn refresh_replaces_wholesale() {
        let store = MemoryStore::new();
        store.put_object("a.txt", 1, at(0));

        let mut index = VersionIndex::new();
        index.refresh(&store).await.unwrap();
        assert_eq!(index.len(), 1);

        store.put_object("b.txt", 2, at(5));
        index.refresh(&store).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.latest().unwrap().name, "b.txt");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_entries() {
        let store = MemoryStore::new();
        store.put_object("kept.txt", 1, at(0));

        let mut index = VersionIndex::new();
        index.refresh(&store).await.unwrap();

        store.fail_listing(true);
        assert!(index.refresh(&store).await.is_err());
        assert_eq!(index.latest().unwrap().name, "kept.txt");
    }

    #[tokio::test]
    async fn first_is_bounded_and_total() {
        let store = MemoryStore::new();
        store.put_object("a.txt", 1, at(1));
        store.put_object("b.txt", 2, at(2));

        let mut index = VersionIndex::new();
        index.refresh(&store).await.unwrap();

        assert!(index.first(0).is_empty());
        assert_eq!(index.first(1).len(), 1);
        assert_eq!(index.first(100).len(), 2);
        assert!(VersionIndex::new().first(10).is_empty());
    }
}

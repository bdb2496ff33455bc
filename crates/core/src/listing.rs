//! Remote listing aggregation
//!
//! Drives `ObjectStore::list_page` across continuation tokens and turns raw
//! store keys into keys relative to the binding prefix. A [`RemoteListing`]
//! covers exactly one pass: it is consumed either by [`RemoteListing::collect_map`]
//! or by [`RemoteListing::into_stream`], and its cursor dies with it.

use std::collections::VecDeque;

use futures::Stream;

use crate::error::{Error, Result};
use crate::traits::{ListPage, ObjectMap, ObjectRecord, ObjectStore};

/// Continuation state of a single listing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    token: Option<String>,
    has_more: bool,
}

impl PaginationCursor {
    /// Cursor positioned before the first page
    pub fn start() -> Self {
        Self {
            token: None,
            has_more: true,
        }
    }

    /// Whether another page should be requested
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Token to send with the next request; `None` for the first page
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Record the outcome of a page request
    pub fn advance(&mut self, truncated: bool, next_token: Option<String>) -> Result<()> {
        if truncated {
            let token = next_token.ok_or_else(|| {
                Error::InvalidListing("truncated page without continuation token".to_string())
            })?;
            self.token = Some(token);
            self.has_more = true;
        } else {
            self.token = None;
            self.has_more = false;
        }
        Ok(())
    }
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self::start()
    }
}

/// Strip `prefix` from a raw store key
///
/// Returns `None` for the prefix marker object itself, whose relative key is empty.
pub fn normalize_key(prefix: &str, raw_key: &str) -> Option<String> {
    let relative = raw_key.strip_prefix(prefix).unwrap_or(raw_key);
    if relative.is_empty() {
        None
    } else {
        Some(relative.to_string())
    }
}

/// One pass over the objects under a bucket prefix
pub struct RemoteListing<'a> {
    store: &'a dyn ObjectStore,
    bucket: String,
    prefix: String,
    cursor: PaginationCursor,
    pages_fetched: usize,
}

impl<'a> RemoteListing<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &str, prefix: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            cursor: PaginationCursor::start(),
            pages_fetched: 0,
        }
    }

    /// Number of `list_page` calls issued so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetch every page and merge it into one map
    ///
    /// A key seen twice keeps the record from the later page.
    pub async fn collect_map(mut self) -> Result<ObjectMap> {
        let mut objects = ObjectMap::new();

        while self.cursor.has_more() {
            for record in self.next_page().await? {
                objects.insert(record.key.clone(), record);
            }
        }

        if objects.is_empty() {
            tracing::warn!(bucket = %self.bucket, prefix = %self.prefix, "No objects in the bucket folder");
        }
        tracing::info!(
            bucket = %self.bucket,
            count = objects.len(),
            pages = self.pages_fetched,
            "Received bucket contents"
        );
        Ok(objects)
    }

    /// Lazily yield records, fetching a page only when the previous one is used up
    pub fn into_stream(self) -> impl Stream<Item = Result<ObjectRecord>> + 'a {
        futures::stream::try_unfold((self, VecDeque::new()), Self::step)
    }

    async fn step(
        (mut listing, mut buffered): (Self, VecDeque<ObjectRecord>),
    ) -> Result<Option<(ObjectRecord, (Self, VecDeque<ObjectRecord>))>> {
        loop {
            if let Some(record) = buffered.pop_front() {
                return Ok(Some((record, (listing, buffered))));
            }
            if !listing.cursor.has_more() {
                return Ok(None);
            }
            buffered.extend(listing.next_page().await?);
        }
    }

    async fn next_page(&mut self) -> Result<Vec<ObjectRecord>> {
        let token = self.cursor.token().map(str::to_string);
        if token.is_some() {
            tracing::debug!(bucket = %self.bucket, "Getting a continuation listing");
        } else {
            tracing::debug!(bucket = %self.bucket, prefix = %self.prefix, "Getting a first listing");
        }

        let ListPage {
            records,
            next_token,
            truncated,
        } = self
            .store
            .list_page(&self.bucket, &self.prefix, token)
            .await?;
        self.pages_fetched += 1;
        self.cursor.advance(truncated, next_token)?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                normalize_key(&self.prefix, &record.key).map(|key| ObjectRecord { key, ..record })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockObjectStore;
    use futures::TryStreamExt;
    use jiff::Timestamp;
    use mockall::Sequence;

    fn record(key: &str, size: u64) -> ObjectRecord {
        ObjectRecord::new(key, size, Timestamp::from_second(1_700_000_000).unwrap())
    }

    /// Mock that serves `total` objects under `prefix` in pages of `page_size`
    fn paged_store(prefix: &str, total: usize, page_size: usize) -> MockObjectStore {
        let prefix = prefix.to_string();
        let mut store = MockObjectStore::new();
        let calls = total.div_ceil(page_size).max(1);
        store
            .expect_list_page()
            .times(calls)
            .returning(move |_, _, token| {
                let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
                let end = (start + page_size).min(total);
                let records = (start..end)
                    .map(|i| record(&format!("{prefix}file-{i:04}.txt"), i as u64))
                    .collect();
                Ok(ListPage {
                    records,
                    next_token: (end < total).then(|| end.to_string()),
                    truncated: end < total,
                })
            });
        store
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(
            normalize_key("backups/", "backups/file.txt"),
            Some("file.txt".to_string())
        );
        assert_eq!(normalize_key("backups/", "backups/"), None);
        assert_eq!(normalize_key("", "a/b.txt"), Some("a/b.txt".to_string()));
        assert_eq!(
            normalize_key("backups/", "other/file.txt"),
            Some("other/file.txt".to_string())
        );
    }

    #[test]
    fn test_cursor_advance() {
        let mut cursor = PaginationCursor::start();
        assert!(cursor.has_more());
        assert_eq!(cursor.token(), None);

        cursor.advance(true, Some("t1".to_string())).unwrap();
        assert!(cursor.has_more());
        assert_eq!(cursor.token(), Some("t1"));

        cursor.advance(false, None).unwrap();
        assert!(!cursor.has_more());
        assert_eq!(cursor.token(), None);
    }

    #[test]
    fn test_cursor_truncated_without_token() {
        let mut cursor = PaginationCursor::start();
        let err = cursor.advance(true, None).unwrap_err();
        assert!(matches!(err, Error::InvalidListing(_)));
    }

    #[tokio::test]
    async fn test_collect_map_merges_pages() {
        let store = paged_store("backups/", 25, 10);
        let listing = RemoteListing::new(&store, "bucket", "backups/");

        let objects = listing.collect_map().await.unwrap();
        assert_eq!(objects.len(), 25);
        assert!(objects.contains_key("file-0000.txt"));
        assert!(objects.contains_key("file-0024.txt"));
        assert_eq!(objects["file-0007.txt"].size, 7);
    }

    #[tokio::test]
    async fn test_collect_map_exact_page_multiple() {
        // 30 objects in pages of 10 must take exactly 3 calls
        let store = paged_store("", 30, 10);
        let objects = RemoteListing::new(&store, "bucket", "")
            .collect_map()
            .await
            .unwrap();
        assert_eq!(objects.len(), 30);
    }

    #[tokio::test]
    async fn test_collect_map_empty_listing() {
        let store = paged_store("backups/", 0, 10);
        let objects = RemoteListing::new(&store, "bucket", "backups/")
            .collect_map()
            .await
            .unwrap();
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn test_collect_map_drops_prefix_marker() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_page()
            .withf(|bucket, prefix, token| {
                bucket == "bucket" && prefix == "backups/" && token.is_none()
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(ListPage {
                    records: vec![record("backups/", 0), record("backups/file.txt", 4)],
                    next_token: None,
                    truncated: false,
                })
            });

        let objects = RemoteListing::new(&store, "bucket", "backups/")
            .collect_map()
            .await
            .unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects["file.txt"].key, "file.txt");
        assert_eq!(objects["file.txt"].size, 4);
    }

    #[tokio::test]
    async fn test_collect_map_duplicate_keys_keep_last() {
        let mut store = MockObjectStore::new();
        let mut seq = Sequence::new();
        store
            .expect_list_page()
            .withf(|_, _, token| token.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(ListPage {
                    records: vec![record("dup.txt", 1)],
                    next_token: Some("next".to_string()),
                    truncated: true,
                })
            });
        store
            .expect_list_page()
            .withf(|_, _, token| token.as_deref() == Some("next"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(ListPage {
                    records: vec![record("dup.txt", 2)],
                    next_token: None,
                    truncated: false,
                })
            });

        let objects = RemoteListing::new(&store, "bucket", "")
            .collect_map()
            .await
            .unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects["dup.txt"].size, 2);
    }

    #[tokio::test]
    async fn test_collect_map_propagates_store_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_page()
            .times(1)
            .returning(|_, _, _| Err(Error::StoreUnavailable("AccessDenied".to_string())));

        let err = RemoteListing::new(&store, "bucket", "")
            .collect_map()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_stream_yields_all_records_in_order() {
        let store = paged_store("p/", 7, 3);
        let records: Vec<ObjectRecord> = RemoteListing::new(&store, "bucket", "p/")
            .into_stream()
            .try_collect()
            .await
            .unwrap();

        let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys.len(), 7);
        assert_eq!(keys[0], "file-0000.txt");
        assert_eq!(keys[6], "file-0006.txt");
    }

    #[tokio::test]
    async fn test_stream_fetches_pages_on_demand() {
        let mut store = MockObjectStore::new();
        store.expect_list_page().times(1).returning(|_, _, _| {
            Ok(ListPage {
                records: vec![record("a.txt", 1), record("b.txt", 2)],
                next_token: Some("more".to_string()),
                truncated: true,
            })
        });

        // Only the first page is requested while its records last
        let stream = RemoteListing::new(&store, "bucket", "").into_stream();
        futures::pin_mut!(stream);
        let first = stream.try_next().await.unwrap().unwrap();
        let second = stream.try_next().await.unwrap().unwrap();
        assert_eq!(first.key, "a.txt");
        assert_eq!(second.key, "b.txt");
    }
}

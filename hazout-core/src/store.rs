//! Object-store listing: the lister contract, the paginated bucket scanner and
//! the user enumerator.
//!
//! The only store call the indexer needs is a delimited `ListObjectsV2`. The
//! [`ObjectLister`] trait captures that call so the scanner can run against a
//! real S3 endpoint, a `mockall` mock, or the in-memory [`MemoryLister`].
//!
//! Scanning never retries and never returns a partial listing: the stream
//! yields every common prefix of every page, or ends with an error.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{IndexError, Result, StoreError};

/// Delimiter used to enumerate the top-level user directories.
pub const USER_DELIMITER: &str = "/";

/// Default page size of a `ListObjectsV2` response.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// A single `ListObjectsV2` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub delimiter: String,
    pub continuation_token: Option<String>,
}

/// The part of a `ListObjectsV2` response the indexer consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Read-only access to a delimited object listing.
///
/// Implementations may be shared process-wide; they must be safe to call
/// concurrently. Retries, if any, belong to the implementation.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Fetch one page of common prefixes.
    async fn list_objects_v2(&self, request: &ListRequest) -> std::result::Result<ListPage, StoreError>;
}

enum Cursor {
    Start,
    Continue(String),
    Done,
}

/// Lazily lists every common prefix of `bucket` under `delimiter`, draining
/// continuation tokens. Prefixes are yielded in listing order.
///
/// Cancellation is checked before each page request.
pub fn common_prefixes<'a, L>(
    lister: &'a L,
    bucket: &'a str,
    delimiter: &'a str,
    cancel: &'a CancellationToken,
) -> BoxStream<'a, Result<String>>
where
    L: ObjectLister + ?Sized,
{
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let continuation_token = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Continue(token) => Some(token),
        };
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let request = ListRequest {
            bucket: bucket.to_string(),
            delimiter: delimiter.to_string(),
            continuation_token,
        };
        let page = lister
            .list_objects_v2(&request)
            .await
            .map_err(IndexError::store)?;
        debug!(
            bucket,
            delimiter,
            prefixes = page.common_prefixes.len(),
            truncated = page.is_truncated,
            "[SCAN] Received listing page"
        );

        let next = match (page.is_truncated, page.next_continuation_token) {
            (false, _) => Cursor::Done,
            (true, Some(token)) => Cursor::Continue(token),
            (true, None) => {
                return Err(IndexError::StoreUnavailable {
                    message: format!(
                        "truncated listing of bucket {bucket} carried no continuation token"
                    ),
                    source: None,
                })
            }
        };
        let prefixes = stream::iter(page.common_prefixes.into_iter().map(Ok::<String, IndexError>));
        Ok(Some((prefixes, next)))
    })
    .try_flatten()
    .boxed()
}

/// Collects the complete set of common prefixes, or fails.
pub async fn scan_common_prefixes<L>(
    lister: &L,
    bucket: &str,
    delimiter: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>>
where
    L: ObjectLister + ?Sized,
{
    let prefixes: Vec<String> = common_prefixes(lister, bucket, delimiter, cancel)
        .try_collect()
        .await?;
    info!(bucket, delimiter, count = prefixes.len(), "[SCAN] Listing complete");
    Ok(prefixes)
}

/// Lists the distinct top-level directory names of `bucket`, sorted.
pub async fn list_users<L>(
    lister: &L,
    bucket: &str,
    cancel: &CancellationToken,
) -> Result<BTreeSet<String>>
where
    L: ObjectLister + ?Sized,
{
    let users: BTreeSet<String> = common_prefixes(lister, bucket, USER_DELIMITER, cancel)
        .try_filter_map(|prefix| async move {
            let user = prefix.strip_suffix(USER_DELIMITER).unwrap_or(&prefix);
            Ok((!user.is_empty()).then(|| user.to_string()))
        })
        .try_collect()
        .await?;
    info!(bucket, count = users.len(), "[USERS] Enumerated users");
    Ok(users)
}

enum Entry {
    Prefix(String),
    Object,
}

/// In-memory `ListObjectsV2` emulation.
///
/// Keys are kept in lexicographic order. Each key containing the delimiter
/// rolls up into the common prefix ending at the delimiter's first
/// occurrence; other keys count as plain objects. Pages hold at most
/// `page_size` entries of either kind, like `max-keys`.
#[derive(Debug, Clone)]
pub struct MemoryLister {
    buckets: BTreeMap<String, BTreeSet<String>>,
    page_size: usize,
}

impl Default for MemoryLister {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl MemoryLister {
    pub fn new(page_size: usize) -> Self {
        Self {
            buckets: BTreeMap::new(),
            page_size: page_size.max(1),
        }
    }

    /// Builds a lister holding `keys` in `bucket`.
    pub fn with_keys<I, K>(bucket: &str, keys: I, page_size: usize) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut lister = Self::new(page_size);
        for key in keys {
            lister.insert(bucket, key);
        }
        lister
    }

    pub fn insert(&mut self, bucket: &str, key: impl Into<String>) {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.into());
    }

    fn entries(keys: &BTreeSet<String>, delimiter: &str) -> Vec<Entry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for key in keys {
            match key.find(delimiter) {
                Some(idx) if !delimiter.is_empty() => {
                    let prefix = &key[..idx + delimiter.len()];
                    if seen.insert(prefix.to_string()) {
                        entries.push(Entry::Prefix(prefix.to_string()));
                    }
                }
                _ => entries.push(Entry::Object),
            }
        }
        entries
    }
}

#[async_trait]
impl ObjectLister for MemoryLister {
    async fn list_objects_v2(&self, request: &ListRequest) -> std::result::Result<ListPage, StoreError> {
        let keys = self
            .buckets
            .get(&request.bucket)
            .ok_or_else(|| format!("NoSuchBucket: {}", request.bucket))?;
        let entries = Self::entries(keys, &request.delimiter);

        let start = match &request.continuation_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .ok()
                .filter(|start| *start <= entries.len())
                .ok_or_else(|| format!("InvalidArgument: continuation token {token}"))?,
        };
        let end = (start + self.page_size).min(entries.len());
        let common_prefixes = entries[start..end]
            .iter()
            .filter_map(|entry| match entry {
                Entry::Prefix(prefix) => Some(prefix.clone()),
                Entry::Object => None,
            })
            .collect();
        let is_truncated = end < entries.len();

        Ok(ListPage {
            common_prefixes,
            is_truncated,
            next_continuation_token: is_truncated.then(|| end.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "nshmp-hazout";

    fn lister(page_size: usize) -> MemoryLister {
        MemoryLister::with_keys(
            BUCKET,
            [
                "alice/run-A/2018/PGA/map.csv",
                "alice/run-A/2018/PGA/curves.csv",
                "alice/run-A/2018/SA1P0/map.csv",
                "bob/exp/run1/PGA/map.csv",
                "bob/exp/run1/PGA/FAULT/map.csv",
                "eve/notes.txt",
                "README",
            ],
            page_size,
        )
    }

    #[tokio::test]
    async fn memory_lister_rolls_up_common_prefixes() {
        let page = lister(100)
            .list_objects_v2(&ListRequest {
                bucket: BUCKET.into(),
                delimiter: "/".into(),
                continuation_token: None,
            })
            .await
            .unwrap();
        assert_eq!(page.common_prefixes, vec!["alice/", "bob/", "eve/"]);
        assert!(!page.is_truncated);
        assert!(page.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn memory_lister_unknown_bucket_fails() {
        let result = lister(100)
            .list_objects_v2(&ListRequest {
                bucket: "missing".into(),
                delimiter: "/".into(),
                continuation_token: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn scan_drains_every_page() {
        let cancel = CancellationToken::new();
        let single = scan_common_prefixes(&lister(100), BUCKET, "map.csv", &cancel)
            .await
            .unwrap();
        let paged = scan_common_prefixes(&lister(1), BUCKET, "map.csv", &cancel)
            .await
            .unwrap();
        assert_eq!(single.len(), 4);
        assert_eq!(single, paged);
    }

    #[tokio::test]
    async fn users_are_sorted_and_stripped() {
        let cancel = CancellationToken::new();
        let users = list_users(&lister(2), BUCKET, &cancel).await.unwrap();
        assert_eq!(
            users.into_iter().collect::<Vec<_>>(),
            vec!["alice", "bob", "eve"]
        );
    }

    #[tokio::test]
    async fn truncated_page_without_token_fails() {
        let mut mock = MockObjectLister::new();
        mock.expect_list_objects_v2().times(1).returning(|_| {
            Ok(ListPage {
                common_prefixes: vec!["a/b/c/PGA/map.csv".into()],
                is_truncated: true,
                next_continuation_token: None,
            })
        });
        let cancel = CancellationToken::new();
        let err = scan_common_prefixes(&mock, BUCKET, "map.csv", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::StoreUnavailable { .. }), "{err}");
    }

    #[tokio::test]
    async fn store_failure_is_not_a_partial_listing() {
        let mut mock = MockObjectLister::new();
        mock.expect_list_objects_v2()
            .withf(|req| req.continuation_token.is_none())
            .returning(|_| {
                Ok(ListPage {
                    common_prefixes: vec!["alice/".into()],
                    is_truncated: true,
                    next_continuation_token: Some("1".into()),
                })
            });
        mock.expect_list_objects_v2()
            .withf(|req| req.continuation_token.as_deref() == Some("1"))
            .returning(|_| Err("SlowDown".into()));
        let cancel = CancellationToken::new();
        let err = list_users(&mock, BUCKET, &cancel).await.unwrap_err();
        assert!(err.to_string().contains("SlowDown"), "{err}");
    }

    #[tokio::test]
    async fn cancelled_scan_stops_before_listing() {
        let mut mock = MockObjectLister::new();
        mock.expect_list_objects_v2().never();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scan_common_prefixes(&mock, BUCKET, "map.csv", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }
}

//! Results-catalog pipeline: scan → classify → group → assemble.
//!
//! One invocation runs two listings of the bucket concurrently:
//!   - the bucket scanner, delimited by the sentinel file name, whose common
//!     prefixes are classified as they arrive;
//!   - the user enumerator, delimited by `/`.
//!
//! Their outputs are joined into a [`ResultsCatalog`] and, through
//! [`ResultsIndexer::respond`], into a [`Response`] envelope.
//!
//! # Failure model
//! Fail-fast by default: the first malformed or unclassifiable key fails the
//! whole invocation. With [`ClassifyPolicy::SkipInvalid`] such keys are left
//! out and reported under `result.diagnostics.skippedKeys`. Store failures,
//! cancellation and timeouts always fail the invocation; partial catalogs are
//! never returned.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::{classify_key, ClassifiedRecord};
use crate::error::{IndexError, Result};
use crate::group::{group, HazardRun};
use crate::response::{self, CatalogResult, Diagnostics, Response, SkippedKey};
use crate::store::{common_prefixes, list_users, ObjectLister};

pub const DEFAULT_BUCKET: &str = "nshmp-hazout";
pub const DEFAULT_SENTINEL: &str = "map.csv";

/// What to do with keys the classifier rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifyPolicy {
    #[default]
    FailFast,
    SkipInvalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub bucket: String,
    pub sentinel: String,
    pub policy: ClassifyPolicy,
    /// Wall-clock limit of one invocation.
    pub timeout: Option<Duration>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            policy: ClassifyPolicy::FailFast,
            timeout: None,
        }
    }
}

/// Snapshot of the hazard results in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsCatalog {
    pub users: BTreeSet<String>,
    pub runs: Vec<HazardRun>,
    pub skipped: Vec<SkippedKey>,
}

#[derive(Default)]
struct Classified {
    records: Vec<ClassifiedRecord>,
    skipped: Vec<SkippedKey>,
}

pub struct ResultsIndexer<L> {
    lister: L,
    config: IndexConfig,
}

impl<L> ResultsIndexer<L>
where
    L: ObjectLister,
{
    pub fn new(lister: L, config: IndexConfig) -> Self {
        Self { lister, config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Builds the catalog, honouring cancellation and the configured timeout.
    pub async fn index(&self, cancel: &CancellationToken) -> Result<ResultsCatalog> {
        let guarded = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(IndexError::Cancelled),
                catalog = self.run(cancel) => catalog,
            }
        };
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .map_err(|_| IndexError::Timeout(limit))?,
            None => guarded.await,
        }
    }

    /// Builds the catalog and wraps it, or the failure, in an envelope.
    pub async fn respond(&self, cancel: &CancellationToken) -> Response {
        match self.index(cancel).await {
            Ok(catalog) => {
                let diagnostics = (self.config.policy == ClassifyPolicy::SkipInvalid).then(|| {
                    Diagnostics {
                        skipped_keys: catalog.skipped,
                    }
                });
                Response::success(
                    CatalogResult {
                        users: catalog.users,
                        hazard_results: catalog.runs,
                        diagnostics,
                    },
                    response::now(),
                )
            }
            Err(e) => {
                error!(error = ?e, bucket = %self.config.bucket, "[INDEX][ERROR] Indexing failed");
                Response::error(&e, response::now())
            }
        }
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<ResultsCatalog> {
        let bucket = self.config.bucket.as_str();
        info!(bucket, sentinel = %self.config.sentinel, "[INDEX] Starting results index");

        let (mut users, classified) =
            tokio::try_join!(list_users(&self.lister, bucket, cancel), self.classify_all(cancel))?;

        let runs = group(classified.records, &self.config.sentinel);
        // Every run owner is a top-level directory even if the user listing raced a write.
        users.extend(runs.iter().map(|run| run.user.clone()));

        info!(
            bucket,
            users = users.len(),
            runs = runs.len(),
            skipped = classified.skipped.len(),
            "[INDEX] Results index complete"
        );
        Ok(ResultsCatalog {
            users,
            runs,
            skipped: classified.skipped,
        })
    }

    async fn classify_all(&self, cancel: &CancellationToken) -> Result<Classified> {
        let IndexConfig {
            bucket,
            sentinel,
            policy,
            ..
        } = &self.config;
        let mut keys = common_prefixes(&self.lister, bucket, sentinel, cancel);
        let mut classified = Classified::default();

        while let Some(key) = keys.try_next().await? {
            match classify_key(bucket, &key, sentinel) {
                Ok(Some(record)) => classified.records.push(record),
                Ok(None) => debug!(key = %key, "[INDEX] Ignoring key without sentinel"),
                Err(e) if e.is_key_error() && *policy == ClassifyPolicy::SkipInvalid => {
                    warn!(key = %key, error = %e, "[INDEX] Skipping unclassifiable key");
                    classified.skipped.push(SkippedKey {
                        key,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(key = %key, error = %e, "[INDEX][ERROR] Key classification failed");
                    return Err(e);
                }
            }
        }
        Ok(classified)
    }
}

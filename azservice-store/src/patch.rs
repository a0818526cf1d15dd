//! ETag-guarded read-modify-write.
//!
//! Each attempt walks the same states:
//!
//! ```text
//! Read -> Resolve -> ConditionalWrite -> Committed
//!   |        |              |
//!   +--------+--------------+--> failure, retried by the executor
//! ```
//!
//! The record is read again on every attempt and every computed mutation is
//! resolved against that read, so a retried write never carries a version
//! token or a derived value from an earlier attempt.

use crate::error::{Result, StoreError};
use crate::mutation::Mutations;
use crate::record::{ETag, RecordKey};
use crate::store::VersionedStore;
use azservice_retry::RetryExecutor;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, trace, warn};

/// How a patch guards its write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// Write only if the record is still at the version just read.
    #[default]
    Optimistic,
    /// Write unconditionally with the wildcard version.
    LastWriterWins,
}

/// Step of a single patch attempt, reported in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchPhase {
    Read,
    Resolve,
    ConditionalWrite,
    Committed,
}

impl fmt::Display for PatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Resolve => "resolve",
            Self::ConditionalWrite => "conditional_write",
            Self::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// Outcome of a committed patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReceipt {
    /// Version of the record after the committed write.
    pub etag: ETag,
    /// Attempts made, including the one that committed.
    pub attempts: u32,
    /// Attempts that lost a version race.
    pub conflicts: u32,
}

/// Applies [`Mutations`] to records of a [`VersionedStore`] under a
/// [`RetryExecutor`].
pub struct OptimisticPatch<'a, S: ?Sized> {
    store: &'a S,
    executor: &'a RetryExecutor,
}

impl<'a, S> OptimisticPatch<'a, S>
where
    S: VersionedStore + ?Sized,
{
    pub fn new(store: &'a S, executor: &'a RetryExecutor) -> Self {
        Self { store, executor }
    }

    /// Patch `key` with version-checked writes.
    pub async fn patch(&self, key: &RecordKey, mutations: &Mutations) -> Result<PatchReceipt> {
        self.patch_with(key, mutations, Concurrency::Optimistic).await
    }

    /// Patch `key`, retrying conflicts and transient failures until a write
    /// commits or the executor gives up. The last failure is returned as-is.
    pub async fn patch_with(
        &self,
        key: &RecordKey,
        mutations: &Mutations,
        concurrency: Concurrency,
    ) -> Result<PatchReceipt> {
        if mutations.is_empty() {
            return Err(StoreError::EmptyPatch);
        }

        let attempts = AtomicU32::new(0);
        let conflicts = AtomicU32::new(0);

        let result = self
            .executor
            .run_if(
                || self.attempt(key, mutations, concurrency, &attempts, &conflicts),
                StoreError::is_retryable,
            )
            .await;

        let attempts = attempts.into_inner();
        let conflicts = conflicts.into_inner();

        match result {
            Ok(etag) => {
                debug!(%key, attempts, conflicts, etag = %etag, "Patch committed");
                Ok(PatchReceipt {
                    etag,
                    attempts,
                    conflicts,
                })
            }
            Err(e) => {
                warn!(%key, attempts, conflicts, error = %e, "Patch failed");
                Err(e)
            }
        }
    }

    async fn attempt(
        &self,
        key: &RecordKey,
        mutations: &Mutations,
        concurrency: Concurrency,
        attempts: &AtomicU32,
        conflicts: &AtomicU32,
    ) -> Result<ETag> {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;

        trace!(%key, attempt, phase = %PatchPhase::Read);
        let current = self.store.read(key).await?;

        trace!(%key, attempt, phase = %PatchPhase::Resolve, etag = %current.etag);
        let fields = mutations.resolve(&current.fields)?;

        let expected = match concurrency {
            Concurrency::Optimistic => current.etag,
            Concurrency::LastWriterWins => ETag::any(),
        };

        trace!(%key, attempt, phase = %PatchPhase::ConditionalWrite, expected = %expected);
        match self.store.conditional_write(key, fields, &expected).await {
            Ok(etag) => {
                trace!(%key, attempt, phase = %PatchPhase::Committed, etag = %etag);
                Ok(etag)
            }
            Err(e) => {
                if e.is_conflict() {
                    conflicts.fetch_add(1, Ordering::SeqCst);
                    debug!(%key, attempt, "Version conflict, record changed since read");
                }
                Err(e)
            }
        }
    }
}

/// Patch `key` in `store` with version-checked writes.
pub async fn patch<S>(
    store: &S,
    executor: &RetryExecutor,
    key: &RecordKey,
    mutations: &Mutations,
) -> Result<PatchReceipt>
where
    S: VersionedStore + ?Sized,
{
    OptimisticPatch::new(store, executor).patch(key, mutations).await
}

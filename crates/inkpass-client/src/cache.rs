//! Read-through entitlement cache for one reader.
//!
//! The service is the only authority over entitlements. Front ends keep a short-lived
//! copy of the reader's snapshot so page renders do not each cost a round trip. Premium
//! status is never taken from the cached flag: it is re-derived from the cached expiry
//! against the local clock on every read, so a window that closes mid-session closes
//! locally too.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use inkpass_core::{Clock, SystemClock, WriterFeatureLimits};

use crate::client::InkpassClient;
use crate::error::ClientError;
use crate::types::{EntitlementSnapshot, UnlockResult};

/// Default seconds a snapshot is served without asking the service.
pub const DEFAULT_SNAPSHOT_TTL_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedSnapshot {
    snapshot: EntitlementSnapshot,
    fetched_at: DateTime<Utc>,
}

/// A reader's entitlements, cached for a bounded time.
#[derive(Debug)]
pub struct EntitlementCache {
    client: InkpassClient,
    user_jwt: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<CachedSnapshot>>,
}

impl EntitlementCache {
    /// Create a cache for the reader holding `user_jwt`.
    #[must_use]
    pub fn new(client: InkpassClient, user_jwt: impl Into<String>) -> Self {
        Self {
            client,
            user_jwt: user_jwt.into(),
            ttl: Duration::seconds(DEFAULT_SNAPSHOT_TTL_SECONDS),
            clock: Arc::new(SystemClock),
            entry: RwLock::new(None),
        }
    }

    /// Set how long a snapshot is served before it is fetched again.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replace the clock used for freshness and premium checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The reader's snapshot, fetched if the cached one is missing or stale.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch was needed and failed.
    pub async fn snapshot(&self) -> Result<EntitlementSnapshot, ClientError> {
        let now = self.clock.now();
        {
            let entry = self.entry.read().await;
            if let Some(cached) = entry.as_ref() {
                if now - cached.fetched_at < self.ttl {
                    return Ok(cached.snapshot.clone());
                }
            }
        }

        self.refresh().await
    }

    /// Fetch the snapshot from the service and replace the cached copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the previous copy is kept.
    pub async fn refresh(&self) -> Result<EntitlementSnapshot, ClientError> {
        let snapshot = self.client.get_entitlements(&self.user_jwt).await?;
        let fetched_at = self.clock.now();

        tracing::debug!(user_id = %snapshot.user_id, "Refreshed entitlement snapshot");

        *self.entry.write().await = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            fetched_at,
        });
        Ok(snapshot)
    }

    /// Drop the cached copy so the next read goes to the service.
    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }

    /// Whether premium is active right now.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch was needed and failed.
    pub async fn is_premium_active(&self) -> Result<bool, ClientError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.is_premium_active_at(self.clock.now()))
    }

    /// Whether the reader may read a chapter: premium, or bought with coins.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch was needed and failed.
    pub async fn is_chapter_unlocked(&self, chapter_id: &str) -> Result<bool, ClientError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.is_premium_active_at(self.clock.now()) || snapshot.has_unlocked(chapter_id))
    }

    /// Writer capabilities for the current premium status.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch was needed and failed.
    pub async fn writer_limits(&self) -> Result<WriterFeatureLimits, ClientError> {
        let premium_active = self.is_premium_active().await?;
        Ok(WriterFeatureLimits::for_premium(premium_active))
    }

    /// Spendable coins.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch was needed and failed.
    pub async fn coin_balance(&self) -> Result<i64, ClientError> {
        Ok(self.snapshot().await?.coin_balance)
    }

    /// Buy a chapter through the service and drop the cached copy.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientCoins` if the reader cannot afford it.
    pub async fn unlock_chapter(&self, chapter_id: &str) -> Result<UnlockResult, ClientError> {
        let result = self.client.unlock_chapter(&self.user_jwt, chapter_id).await?;
        if !result.already_unlocked {
            self.invalidate().await;
        }
        Ok(result)
    }
}

// service/listing_expiry.rs
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response, Extension};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::{
    db::{propertydb::PropertyExt, DBClient},
    AppState,
};

/// Failed sweeps stretch the wait up to this multiple of the base interval.
const MAX_BACKOFF_FACTOR: u32 = 8;

/// Set while a request-triggered sweep is running.
static REQUEST_SWEEP_RUNNING: AtomicBool = AtomicBool::new(false);

/// Clears `REQUEST_SWEEP_RUNNING` when the sweep task ends or is dropped.
struct RequestSweepSlot;

impl Drop for RequestSweepSlot {
    fn drop(&mut self) {
        REQUEST_SWEEP_RUNNING.store(false, Ordering::Release);
    }
}

/// The two store operations a sweep needs.
#[async_trait]
pub trait ExpiryStore: Send + Sync {
    async fn find_stale_listing_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, sqlx::Error>;

    async fn mark_listing_expired(&self, listing_id: Uuid) -> Result<bool, sqlx::Error>;
}

#[async_trait]
impl ExpiryStore for DBClient {
    async fn find_stale_listing_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, sqlx::Error> {
        PropertyExt::find_stale_listing_ids(self, now).await
    }

    async fn mark_listing_expired(&self, listing_id: Uuid) -> Result<bool, sqlx::Error> {
        PropertyExt::mark_listing_expired(self, listing_id).await
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// Stale listings found by the scan.
    pub matched: usize,
    /// Listings this sweep flipped to expired.
    pub expired: usize,
    /// Listings another sweep had already flipped.
    pub already_expired: usize,
    /// Per-listing update failures.
    pub failed: usize,
    pub query_failed: bool,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        !self.query_failed && self.failed == 0
    }
}

/// Marks every active listing whose `expires_at` has passed as expired.
///
/// Best effort: a failed scan or a failed row update is logged and counted
/// in the report, never returned. Rows are updated one by one with a
/// conditional update, so concurrent sweeps over the same rows are harmless.
pub async fn sweep_expired_listings<S>(store: &S, now: DateTime<Utc>) -> SweepReport
where
    S: ExpiryStore + ?Sized,
{
    let mut report = SweepReport::default();

    let stale_ids = match store.find_stale_listing_ids(now).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("Listing expiry scan failed: {}", e);
            report.query_failed = true;
            return report;
        }
    };

    report.matched = stale_ids.len();

    for listing_id in stale_ids {
        match store.mark_listing_expired(listing_id).await {
            Ok(true) => report.expired += 1,
            Ok(false) => report.already_expired += 1,
            Err(e) => {
                tracing::error!("Failed to expire listing {}: {}", listing_id, e);
                report.failed += 1;
            }
        }
    }

    if report.matched > 0 {
        tracing::info!(
            "Listing expiry sweep: {} matched, {} expired, {} already expired, {} failed",
            report.matched,
            report.expired,
            report.already_expired,
            report.failed
        );
    }

    report
}

/// Runs a sweep against the app's store and drops cached category pages
/// when anything changed.
pub async fn run_listing_sweep(app_state: &AppState) -> SweepReport {
    let report = sweep_expired_listings(app_state.db_client.as_ref(), Utc::now()).await;
    if report.expired > 0 {
        app_state.db_client.invalidate_listing_cache().await;
    }
    report
}

/// Wait before the next sweep given the number of consecutive failed sweeps.
pub fn next_sweep_delay(base: Duration, consecutive_failures: u32) -> Duration {
    let factor = 2u32
        .saturating_pow(consecutive_failures.min(31))
        .min(MAX_BACKOFF_FACTOR);
    base.saturating_mul(factor)
}

/// Background job: sweep on a fixed interval, backing off while sweeps fail.
pub async fn start_listing_expiry_job(app_state: Arc<AppState>) {
    let base = Duration::from_secs(app_state.env.listing_sweep_interval_secs.max(1));
    let mut consecutive_failures: u32 = 0;

    tracing::info!("Listing expiry job started (every {:?})", base);

    loop {
        let report = run_listing_sweep(&app_state).await;

        if report.is_clean() {
            consecutive_failures = 0;
        } else {
            consecutive_failures = consecutive_failures.saturating_add(1);
            tracing::warn!(
                "Listing expiry sweep incomplete ({} consecutive), next attempt in {:?}",
                consecutive_failures,
                next_sweep_delay(base, consecutive_failures)
            );
        }

        sleep(next_sweep_delay(base, consecutive_failures)).await;
    }
}

/// Opportunistic variant: each request kicks off a sweep in the background
/// and proceeds straight away. At most one such sweep runs at a time.
pub async fn expire_listings_on_request(
    Extension(app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if REQUEST_SWEEP_RUNNING
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        let slot = RequestSweepSlot;
        tokio::spawn(async move {
            let _slot = slot;
            run_listing_sweep(&app_state).await;
        });
    }

    next.run(req).await
}

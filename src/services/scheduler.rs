//! Periodic trigger for bestseller reconciliation

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{
    repository::BestsellerStore,
    services::{aladin::CatalogClient, bestsellers::BestsellerService},
};

/// Shortest period the scheduler accepts
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Run reconciliation every `interval` until the returned task is aborted.
///
/// Runs never overlap: the next tick is only awaited once the current run has
/// finished, and ticks missed meanwhile are skipped. Periods shorter than
/// [`MIN_INTERVAL`] are raised to it.
pub fn spawn_bestseller_scheduler<S, C>(
    service: BestsellerService<S, C>,
    interval: Duration,
    run_on_startup: bool,
) -> JoinHandle<()>
where
    S: BestsellerStore,
    C: CatalogClient + 'static,
{
    let interval = interval.max(MIN_INTERVAL);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !run_on_startup {
            ticker.tick().await; // Skip first immediate tick
        }

        tracing::info!("Bestseller scheduler started, interval {:?}", interval);

        loop {
            ticker.tick().await;
            let report = service.run_once().await;
            if report.failed_count() > 0 {
                tracing::warn!(
                    "Scheduled bestseller run finished with {} failed genre(s)",
                    report.failed_count()
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Genre;
    use crate::services::bestsellers::ReconcileOptions;
    use crate::testing::{fixtures, MemoryStore, ScriptedCatalog};

    #[tokio::test]
    async fn test_scheduler_runs_on_startup() {
        let store = MemoryStore::new();
        let old = store.seed_book(fixtures::bestseller("111", Genre::Fiction)).await;
        let catalog = ScriptedCatalog::new();
        catalog.set_bestseller(Genre::Fiction, "222").await;

        let service = BestsellerService::new(store.clone(), catalog.clone(), ReconcileOptions::default());
        let handle = spawn_bestseller_scheduler(service, Duration::from_secs(3600), true);

        let mut replaced = false;
        for _ in 0..100 {
            if store.book(old.id).await.is_none() {
                replaced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(replaced);
        assert_eq!(store.bestsellers_of(Genre::Fiction).await[0].isbn, "222");
    }

    #[tokio::test]
    async fn test_zero_interval_is_raised_to_minimum() {
        let store = MemoryStore::new();
        let old = store.seed_book(fixtures::bestseller("111", Genre::Fiction)).await;
        let catalog = ScriptedCatalog::new();
        catalog.set_bestseller(Genre::Fiction, "222").await;

        let service = BestsellerService::new(store.clone(), catalog.clone(), ReconcileOptions::default());
        let handle = spawn_bestseller_scheduler(service, Duration::ZERO, true);

        for _ in 0..100 {
            if store.book(old.id).await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!handle.is_finished());
        assert!(store.book(old.id).await.is_none());
        handle.abort();
    }
}

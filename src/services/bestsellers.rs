//! Bestseller reconciliation service
//!
//! For every genre except `Unknown`, fetches the catalog's current bestseller,
//! flags it locally (reusing or creating a book row), repoints the genre's
//! favorite markers from the previous bestseller to the new one and retires
//! the previous one, deleting it when nothing references it anymore.
//!
//! Genres are processed one after another: a later genre may look up a code
//! that an earlier genre just inserted. Each genre's writes run in their own
//! transaction, so a failure leaves that genre exactly as it was and never
//! touches genres that already committed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::{
    config::{AladinConfig, BestsellerConfig},
    error::{AppError, AppResult},
    models::{Book, Genre, GenreBestseller},
    repository::{BestsellerStore, BookStore, FavoriteGenreStore, StoreTransaction},
    services::{aladin::CatalogClient, payload},
};

/// What happened to one genre during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenreOutcome {
    /// The catalog still lists the flagged bestseller
    Unchanged { book_id: i64 },
    /// A different title became the genre's bestseller
    Replaced {
        old_book_id: Option<i64>,
        new_book_id: i64,
        reused_existing: bool,
        favorites_migrated: u64,
        old_book_deleted: bool,
    },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct GenreReport {
    pub genre: Genre,
    pub outcome: GenreOutcome,
}

/// Summary of one reconciliation run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Another run was in progress, nothing was attempted
    pub skipped: bool,
    pub genres: Vec<GenreReport>,
}

impl RunReport {
    fn skipped() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            skipped: true,
            genres: Vec::new(),
        }
    }

    pub fn outcome(&self, genre: Genre) -> Option<&GenreOutcome> {
        self.genres.iter().find(|r| r.genre == genre).map(|r| &r.outcome)
    }

    pub fn failed_count(&self) -> usize {
        self.genres
            .iter()
            .filter(|r| matches!(r.outcome, GenreOutcome::Failed { .. }))
            .count()
    }

    pub fn replaced_count(&self) -> usize {
        self.genres
            .iter()
            .filter(|r| matches!(r.outcome, GenreOutcome::Replaced { .. }))
            .count()
    }
}

/// Per-genre failure published to subscribers
#[derive(Debug, Clone)]
pub struct GenreFailure {
    pub genre: Genre,
    pub message: String,
}

/// Tuning knobs of the reconciliation engine
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub fetch_timeout: Duration,
    /// Create a genre's first bestseller instead of failing the genre
    pub bootstrap_missing: bool,
    /// Category ids replacing [`Genre::category_id`]
    pub category_overrides: HashMap<Genre, i32>,
}

impl ReconcileOptions {
    pub fn from_config(bestsellers: &BestsellerConfig, aladin: &AladinConfig) -> Self {
        let category_overrides = Genre::reconcilable()
            .filter_map(|genre| aladin.categories.get(genre.key()).map(|id| (genre, *id)))
            .collect();

        Self {
            fetch_timeout: Duration::from_secs(bestsellers.fetch_timeout_secs),
            bootstrap_missing: bestsellers.bootstrap_missing,
            category_overrides,
        }
    }
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(15),
            bootstrap_missing: false,
            category_overrides: HashMap::new(),
        }
    }
}

struct Inner<S, C> {
    store: S,
    catalog: C,
    options: ReconcileOptions,
    running: Arc<AtomicBool>,
    failures: broadcast::Sender<GenreFailure>,
}

/// Clears the running flag when a run ends, including on panic
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct BestsellerService<S, C> {
    inner: Arc<Inner<S, C>>,
}

impl<S, C> Clone for BestsellerService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C> BestsellerService<S, C>
where
    S: BestsellerStore,
    C: CatalogClient + 'static,
{
    pub fn new(store: S, catalog: C, options: ReconcileOptions) -> Self {
        let (failures, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                store,
                catalog,
                options,
                running: Arc::new(AtomicBool::new(false)),
                failures,
            }),
        }
    }

    /// Receive every per-genre failure of subsequent runs
    pub fn subscribe_failures(&self) -> broadcast::Receiver<GenreFailure> {
        self.inner.failures.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Start a run in the background and return immediately.
    ///
    /// Callers that do not care about the result may drop the handle.
    pub fn reconcile_all(&self) -> JoinHandle<RunReport> {
        let service = self.clone();
        tokio::spawn(async move { service.run_once().await })
    }

    /// Start a run in the background unless one is already in progress.
    ///
    /// The running flag is claimed before this returns, so `Some` means a
    /// run really started and a concurrent trigger will be skipped.
    pub fn try_start(&self) -> Option<JoinHandle<RunReport>> {
        let guard = self.claim()?;
        let service = self.clone();
        Some(tokio::spawn(async move { service.run_claimed(guard).await }))
    }

    fn claim(&self) -> Option<RunGuard> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(RunGuard(Arc::clone(&self.inner.running)))
    }

    /// Reconcile every genre in order and wait for the result
    pub async fn run_once(&self) -> RunReport {
        match self.claim() {
            Some(guard) => self.run_claimed(guard).await,
            None => {
                tracing::warn!("Bestseller reconciliation already running, skipping trigger");
                RunReport::skipped()
            }
        }
    }

    async fn run_claimed(&self, _guard: RunGuard) -> RunReport {
        let started_at = Utc::now();
        tracing::info!("Bestseller reconciliation started");

        let mut genres = Vec::new();
        for genre in Genre::reconcilable() {
            let outcome = match self.reconcile_genre(genre).await {
                Ok(outcome) => {
                    match &outcome {
                        GenreOutcome::Unchanged { book_id } => {
                            tracing::info!("Genre {}: bestseller unchanged (book {})", genre, book_id)
                        }
                        GenreOutcome::Replaced {
                            old_book_id,
                            new_book_id,
                            favorites_migrated,
                            old_book_deleted,
                            ..
                        } => tracing::info!(
                            "Genre {}: bestseller {:?} -> {}, {} favorite(s) migrated, old book deleted: {}",
                            genre,
                            old_book_id,
                            new_book_id,
                            favorites_migrated,
                            old_book_deleted
                        ),
                        GenreOutcome::Failed { .. } => {}
                    }
                    outcome
                }
                Err(e) => {
                    if e.is_genre_failure() {
                        tracing::warn!("Genre {}: reconciliation failed: {}", genre, e);
                    } else {
                        tracing::error!("Genre {}: reconciliation failed: {}", genre, e);
                    }
                    // No subscribers is fine
                    let _ = self.inner.failures.send(GenreFailure {
                        genre,
                        message: e.to_string(),
                    });
                    GenreOutcome::Failed { error: e.to_string() }
                }
            };
            genres.push(GenreReport { genre, outcome });
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            skipped: false,
            genres,
        };

        tracing::info!(
            "Bestseller reconciliation finished: {} replaced, {} failed, {} genres",
            report.replaced_count(),
            report.failed_count(),
            report.genres.len()
        );

        report
    }

    /// Current bestseller of every reconcilable genre
    pub async fn current_bestsellers(&self) -> AppResult<Vec<GenreBestseller>> {
        let mut tx = self.inner.store.begin().await?;
        let mut result = Vec::new();
        for genre in Genre::reconcilable() {
            let book = tx.find_bestseller(genre).await?;
            result.push(GenreBestseller { genre, book });
        }
        tx.commit().await?;
        Ok(result)
    }

    fn category_id(&self, genre: Genre) -> i32 {
        self.inner
            .options
            .category_overrides
            .get(&genre)
            .copied()
            .unwrap_or_else(|| genre.category_id())
    }

    async fn fetch(&self, genre: Genre) -> AppResult<String> {
        let category_id = self.category_id(genre);
        let timeout = self.inner.options.fetch_timeout;

        match tokio::time::timeout(timeout, self.inner.catalog.fetch_bestsellers(category_id)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::CatalogUnavailable(format!(
                "fetch for category {} timed out after {:?}",
                category_id, timeout
            ))),
        }
    }

    async fn reconcile_genre(&self, genre: Genre) -> AppResult<GenreOutcome> {
        let bootstrap = self.inner.options.bootstrap_missing;

        // Checked before fetching so a genre without a bestseller costs no request
        let mut tx = self.inner.store.begin().await?;
        let current = tx.find_bestseller(genre).await?;
        tx.commit().await?;
        if current.is_none() && !bootstrap {
            return Err(AppError::PreconditionMissing(genre));
        }

        let body = self.fetch(genre).await?;
        let isbn = payload::extract_identifying_code(&body)?;

        let mut tx = self.inner.store.begin().await?;
        let old = tx.find_bestseller(genre).await?;
        if old.is_none() && !bootstrap {
            return Err(AppError::PreconditionMissing(genre));
        }

        let existing = tx.find_by_isbn(&isbn, genre).await?;

        let (new_book, reused_existing) = match existing {
            Some(book) if book.best_seller && book.genre == genre => {
                return Ok(GenreOutcome::Unchanged { book_id: book.id });
            }
            Some(book) if book.genre != genre => {
                // Reusing the row would take it away from its own genre
                tracing::warn!(
                    "Genre {}: isbn {} already belongs to {} (book {}), inserting a separate row",
                    genre,
                    isbn,
                    book.genre,
                    book.id
                );
                let new_book = payload::materialize_book(&body, genre, true, true)?;
                (tx.insert(new_book).await?, false)
            }
            Some(mut book) => {
                book.best_seller = true;
                tx.update(&book).await?;
                (book, true)
            }
            None => {
                let new_book = payload::materialize_book(&body, genre, true, false)?;
                (tx.insert(new_book).await?, false)
            }
        };

        let (old_book_id, favorites_migrated, old_book_deleted) = match old {
            Some(old) => {
                let old_id = old.id;
                let migrated = migrate_favorites(&mut tx, genre, old_id, new_book.id).await?;
                let deleted = retire(&mut tx, old).await?;
                (Some(old_id), migrated, deleted)
            }
            None => {
                tracing::info!("Genre {}: bootstrapped first bestseller {}", genre, new_book.id);
                (None, 0, false)
            }
        };

        tx.commit().await?;

        Ok(GenreOutcome::Replaced {
            old_book_id,
            new_book_id: new_book.id,
            reused_existing,
            favorites_migrated,
            old_book_deleted,
        })
    }
}

/// Log every published failure until the service is dropped
pub async fn log_failures(mut failures: broadcast::Receiver<GenreFailure>) {
    loop {
        match failures.recv().await {
            Ok(failure) => {
                tracing::error!(genre = %failure.genre, "Bestseller reconciliation failed: {}", failure.message);
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("Bestseller failure log lagged, {} failure(s) not logged", missed);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Repoint the genre's favorite markers from `old_id` to `new_id`
async fn migrate_favorites<T: FavoriteGenreStore>(
    tx: &mut T,
    genre: Genre,
    old_id: i64,
    new_id: i64,
) -> AppResult<u64> {
    let favorites = tx.find_by_genre(genre).await?;
    if favorites.is_empty() {
        return Ok(0);
    }

    let moved: Vec<_> = favorites
        .into_iter()
        .filter(|f| f.book_id == old_id)
        .map(|mut f| {
            f.book_id = new_id;
            f
        })
        .collect();

    tx.save_all(&moved).await
}

/// Clear the bestseller flag and delete the book if nothing references it
async fn retire<T: BookStore + FavoriteGenreStore>(tx: &mut T, mut old: Book) -> AppResult<bool> {
    old.best_seller = false;
    tx.update(&old).await?;

    let rooms = tx.count_rooms(old.id).await?;
    let favorites = tx.count_favorites(old.id).await? + tx.count_by_book(old.id).await?;
    if rooms > 0 || favorites > 0 {
        tracing::debug!(
            "Keeping former bestseller {}: {} room(s), {} favorite reference(s)",
            old.id,
            rooms,
            favorites
        );
        return Ok(false);
    }

    tx.delete(old.id).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aladin::MockCatalogClient;
    use crate::testing::{fixtures, MemoryStore};

    fn payload(isbn: &str) -> String {
        format!(r#"{{"item":[{{"title":"Title {isbn}","isbn13":"{isbn}"}}]}}"#)
    }

    #[tokio::test]
    async fn test_missing_bestseller_fails_without_fetching() {
        let store = MemoryStore::new();
        let mut catalog = MockCatalogClient::new();
        catalog.expect_fetch_bestsellers().never();

        let service = BestsellerService::new(store, catalog, ReconcileOptions::default());
        let report = service.run_once().await;

        assert_eq!(report.failed_count(), report.genres.len());
        assert!(matches!(
            report.outcome(Genre::Fiction),
            Some(GenreOutcome::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_category_override_is_used() {
        let store = MemoryStore::new();
        store.seed_book(fixtures::bestseller("111", Genre::Fiction)).await;

        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_bestsellers()
            .withf(|id| *id == 4242)
            .times(1)
            .returning(|_| Ok(payload("111")));

        let mut options = ReconcileOptions::default();
        options.category_overrides.insert(Genre::Fiction, 4242);

        let service = BestsellerService::new(store, catalog, options);
        let report = service.run_once().await;

        assert!(matches!(
            report.outcome(Genre::Fiction),
            Some(GenreOutcome::Unchanged { .. })
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_creates_first_bestseller() {
        let store = MemoryStore::new();
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_bestsellers()
            .returning(|id| Ok(payload(&format!("978{:010}", id))));

        let options = ReconcileOptions {
            bootstrap_missing: true,
            ..ReconcileOptions::default()
        };
        let service = BestsellerService::new(store.clone(), catalog, options);
        let report = service.run_once().await;

        assert_eq!(report.failed_count(), 0);
        for genre in Genre::reconcilable() {
            let books = store.bestsellers_of(genre).await;
            assert_eq!(books.len(), 1, "genre {}", genre);
        }
        assert!(matches!(
            report.outcome(Genre::Fiction),
            Some(GenreOutcome::Replaced { old_book_id: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_try_start_claims_before_spawning() {
        let mut catalog = MockCatalogClient::new();
        catalog.expect_fetch_bestsellers().never();
        let service = BestsellerService::new(MemoryStore::new(), catalog, ReconcileOptions::default());

        let handle = service.try_start().expect("first trigger starts a run");
        assert!(service.is_running());
        assert!(service.try_start().is_none());
        assert!(service.run_once().await.skipped);

        let report = handle.await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.genres.len(), Genre::reconcilable().count());
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_aborted_run_releases_flag() {
        let service = BestsellerService::new(
            MemoryStore::new(),
            MockCatalogClient::new(),
            ReconcileOptions::default(),
        );

        let handle = service.try_start().unwrap();
        handle.abort();
        let _ = handle.await;

        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_failure_log_survives_lag() {
        let service = BestsellerService::new(
            MemoryStore::new(),
            MockCatalogClient::new(),
            ReconcileOptions::default(),
        );
        let logger = tokio::spawn(log_failures(service.subscribe_failures()));

        for _ in 0..200 {
            let _ = service.inner.failures.send(GenreFailure {
                genre: Genre::Fiction,
                message: "catalog down".to_string(),
            });
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!logger.is_finished());

        drop(service);
        tokio::time::timeout(Duration::from_secs(1), logger)
            .await
            .expect("logger stops once the sender is gone")
            .unwrap();
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let service = BestsellerService::new(
            MemoryStore::new(),
            MockCatalogClient::new(),
            ReconcileOptions::default(),
        );
        service.inner.running.store(true, Ordering::SeqCst);

        let report = service.run_once().await;
        assert!(report.skipped);
        assert!(report.genres.is_empty());
        assert!(service.is_running());
    }

    #[test]
    fn test_options_from_config_maps_genre_keys() {
        let mut aladin = AladinConfig::default();
        aladin.categories.insert("SCI_FI".to_string(), 12);
        aladin.categories.insert("NOT_A_GENRE".to_string(), 13);

        let options = ReconcileOptions::from_config(&BestsellerConfig::default(), &aladin);
        assert_eq!(options.category_overrides.len(), 1);
        assert_eq!(options.category_overrides.get(&Genre::ScienceFiction), Some(&12));
        assert_eq!(options.fetch_timeout, Duration::from_secs(15));
    }
}

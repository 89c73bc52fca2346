//! Repository layer for database operations
//!
//! The bestseller engine talks to persistence through the [`BookStore`] and
//! [`FavoriteGenreStore`] contracts. Both are implemented by a transaction
//! handle obtained from [`BestsellerStore::begin`], so every genre's mutation
//! sequence commits or rolls back as one unit. Dropping a handle without
//! calling [`StoreTransaction::commit`] discards its writes.

pub mod books;
pub mod favorite_genres;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::AppResult,
    models::{Book, FavoriteGenre, Genre, NewBook},
};

/// Point lookups and single-record writes on books
#[async_trait]
pub trait BookStore: Send {
    /// Book currently flagged as the genre's bestseller
    async fn find_bestseller(&mut self, genre: Genre) -> AppResult<Option<Book>>;

    /// Book carrying `isbn`. When several rows share the code, a row of
    /// `genre` wins, then a flagged bestseller, then the oldest row.
    async fn find_by_isbn(&mut self, isbn: &str, genre: Genre) -> AppResult<Option<Book>>;

    /// Insert a book. Fails with `Conflict` when the isbn already exists
    /// and the book was not materialized with `force_new`.
    async fn insert(&mut self, book: NewBook) -> AppResult<Book>;

    async fn update(&mut self, book: &Book) -> AppResult<()>;

    async fn delete(&mut self, id: i64) -> AppResult<()>;

    /// Number of reading rooms opened on the book
    async fn count_rooms(&mut self, book_id: i64) -> AppResult<i64>;

    /// Number of user bookmarks on the book
    async fn count_favorites(&mut self, book_id: i64) -> AppResult<i64>;
}

/// Bulk access to favorite genre markers
#[async_trait]
pub trait FavoriteGenreStore: Send {
    async fn find_by_genre(&mut self, genre: Genre) -> AppResult<Vec<FavoriteGenre>>;

    /// Persist the book reference of every row; returns the rows written
    async fn save_all(&mut self, rows: &[FavoriteGenre]) -> AppResult<u64>;

    async fn count_by_book(&mut self, book_id: i64) -> AppResult<i64>;
}

/// A unit of work spanning both stores
#[async_trait]
pub trait StoreTransaction: BookStore + FavoriteGenreStore {
    async fn commit(self) -> AppResult<()>;
}

/// Entry point to persistence for the bestseller engine
#[async_trait]
pub trait BestsellerStore: Send + Sync + 'static {
    type Tx: StoreTransaction + 'static;

    async fn begin(&self) -> AppResult<Self::Tx>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgBestsellerStore {
    pub pool: Pool<Postgres>,
}

impl PgBestsellerStore {
    /// Create a new store with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open PostgreSQL transaction implementing both stores
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BestsellerStore for PgBestsellerStore {
    type Tx = PgStoreTransaction;

    async fn begin(&self) -> AppResult<PgStoreTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PgStoreTransaction { tx })
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

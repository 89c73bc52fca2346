//! In-memory implementation of the bestseller stores.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{Book, FavoriteGenre, Genre, NewBook},
    repository::{BestsellerStore, BookStore, FavoriteGenreStore, StoreTransaction},
};

/// Store operation that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertBook,
    UpdateBook,
    DeleteBook,
    SaveFavoriteGenres,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    books: BTreeMap<i64, Book>,
    favorite_genres: BTreeMap<i64, FavoriteGenre>,
    /// (room id, book id)
    rooms: Vec<(i64, i64)>,
    /// (user id, book id)
    favorites: Vec<(i64, i64)>,
    commits: usize,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store with snapshot transactions.
///
/// `begin` locks the store and works on a copy of its state; `commit`
/// publishes the copy. A transaction dropped without commit leaves the store
/// untouched. Transactions are serialized.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_point: Arc<StdMutex<Option<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert a book as-is, ignoring isbn uniqueness
    pub async fn seed_book(&self, book: NewBook) -> Book {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let book = book.into_book(id, Utc::now());
        state.books.insert(id, book.clone());
        book
    }

    pub async fn seed_favorite_genre(&self, user_id: i64, genre: Genre, book_id: i64) -> FavoriteGenre {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let favorite = FavoriteGenre {
            id,
            user_id,
            genre,
            book_id,
        };
        state.favorite_genres.insert(id, favorite.clone());
        favorite
    }

    /// Open a reading room on the book
    pub async fn seed_room(&self, book_id: i64) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.rooms.push((id, book_id));
        id
    }

    /// Bookmark the book for a user
    pub async fn seed_favorite(&self, user_id: i64, book_id: i64) {
        self.state.lock().await.favorites.push((user_id, book_id));
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub async fn book(&self, id: i64) -> Option<Book> {
        self.state.lock().await.books.get(&id).cloned()
    }

    pub async fn books(&self) -> Vec<Book> {
        self.state.lock().await.books.values().cloned().collect()
    }

    pub async fn books_with_isbn(&self, isbn: &str) -> Vec<Book> {
        self.state
            .lock()
            .await
            .books
            .values()
            .filter(|b| b.isbn == isbn)
            .cloned()
            .collect()
    }

    pub async fn bestsellers_of(&self, genre: Genre) -> Vec<Book> {
        self.state
            .lock()
            .await
            .books
            .values()
            .filter(|b| b.best_seller && b.genre == genre)
            .cloned()
            .collect()
    }

    pub async fn favorite_genres(&self) -> Vec<FavoriteGenre> {
        self.state.lock().await.favorite_genres.values().cloned().collect()
    }

    pub async fn favorite_genre(&self, id: i64) -> Option<FavoriteGenre> {
        self.state.lock().await.favorite_genres.get(&id).cloned()
    }

    /// Number of committed transactions
    pub async fn commit_count(&self) -> usize {
        self.state.lock().await.commits
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// Make the next call of `point` fail with a database-like error
    pub fn fail_next(&self, point: FailPoint) {
        if let Ok(mut slot) = self.fail_point.lock() {
            *slot = Some(point);
        }
    }
}

/// Open snapshot transaction on a [`MemoryStore`]
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_point: Arc<StdMutex<Option<FailPoint>>>,
}

impl MemoryTransaction {
    fn check(&self, point: FailPoint) -> AppResult<()> {
        let mut slot = self
            .fail_point
            .lock()
            .map_err(|_| AppError::Internal("fail point lock poisoned".to_string()))?;
        if *slot == Some(point) {
            *slot = None;
            return Err(AppError::Internal(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl BestsellerStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> AppResult<MemoryTransaction> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction {
            guard,
            working,
            fail_point: Arc::clone(&self.fail_point),
        })
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self) -> AppResult<()> {
        let MemoryTransaction {
            mut guard,
            mut working,
            ..
        } = self;
        working.commits += 1;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl BookStore for MemoryTransaction {
    async fn find_bestseller(&mut self, genre: Genre) -> AppResult<Option<Book>> {
        Ok(self
            .working
            .books
            .values()
            .find(|b| b.best_seller && b.genre == genre)
            .cloned())
    }

    async fn find_by_isbn(&mut self, isbn: &str, genre: Genre) -> AppResult<Option<Book>> {
        Ok(self
            .working
            .books
            .values()
            .filter(|b| b.isbn == isbn)
            .min_by_key(|b| (b.genre != genre, !b.best_seller, b.id))
            .cloned())
    }

    async fn insert(&mut self, book: NewBook) -> AppResult<Book> {
        self.check(FailPoint::InsertBook)?;
        if !book.force_new && self.working.books.values().any(|b| b.isbn == book.isbn) {
            return Err(AppError::Conflict(format!(
                "Book with isbn {} already exists",
                book.isbn
            )));
        }
        let id = self.working.next_id();
        let book = book.into_book(id, Utc::now());
        self.working.books.insert(id, book.clone());
        Ok(book)
    }

    async fn update(&mut self, book: &Book) -> AppResult<()> {
        self.check(FailPoint::UpdateBook)?;
        match self.working.books.get_mut(&book.id) {
            Some(row) => {
                *row = Book {
                    updated_at: Some(Utc::now()),
                    ..book.clone()
                };
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Book with id {} not found", book.id))),
        }
    }

    async fn delete(&mut self, id: i64) -> AppResult<()> {
        self.check(FailPoint::DeleteBook)?;
        // Mirrors the foreign keys of the books table
        if self.working.favorite_genres.values().any(|f| f.book_id == id)
            || self.working.rooms.iter().any(|(_, b)| *b == id)
            || self.working.favorites.iter().any(|(_, b)| *b == id)
        {
            return Err(AppError::Conflict(format!("Book {} is still referenced", id)));
        }
        self.working
            .books
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn count_rooms(&mut self, book_id: i64) -> AppResult<i64> {
        Ok(self.working.rooms.iter().filter(|(_, b)| *b == book_id).count() as i64)
    }

    async fn count_favorites(&mut self, book_id: i64) -> AppResult<i64> {
        Ok(self.working.favorites.iter().filter(|(_, b)| *b == book_id).count() as i64)
    }
}

#[async_trait]
impl FavoriteGenreStore for MemoryTransaction {
    async fn find_by_genre(&mut self, genre: Genre) -> AppResult<Vec<FavoriteGenre>> {
        Ok(self
            .working
            .favorite_genres
            .values()
            .filter(|f| f.genre == genre)
            .cloned()
            .collect())
    }

    async fn save_all(&mut self, rows: &[FavoriteGenre]) -> AppResult<u64> {
        self.check(FailPoint::SaveFavoriteGenres)?;
        let mut written = 0;
        for row in rows {
            if let Some(existing) = self.working.favorite_genres.get_mut(&row.id) {
                existing.book_id = row.book_id;
                written += 1;
            }
        }
        Ok(written)
    }

    async fn count_by_book(&mut self, book_id: i64) -> AppResult<i64> {
        Ok(self
            .working
            .favorite_genres
            .values()
            .filter(|f| f.book_id == book_id)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(fixtures::book("111", Genre::Fiction)).await.unwrap();
        }
        assert!(store.books().await.is_empty());
        assert_eq!(store.commit_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let book = tx.insert(fixtures::book("111", Genre::Fiction)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.book(book.id).await.map(|b| b.isbn), Some("111".to_string()));
        assert_eq!(store.commit_count().await, 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_isbn_unless_forced() {
        let store = MemoryStore::new();
        store.seed_book(fixtures::bestseller("444", Genre::Horror)).await;

        let mut tx = store.begin().await.unwrap();
        let mut duplicate = fixtures::bestseller("444", Genre::ScienceFiction);
        duplicate.force_new = false;
        assert!(matches!(tx.insert(duplicate.clone()).await, Err(AppError::Conflict(_))));

        duplicate.force_new = true;
        assert!(tx.insert(duplicate).await.is_ok());
    }

    #[tokio::test]
    async fn test_find_by_isbn_prefers_requested_genre() {
        let store = MemoryStore::new();
        store.seed_book(fixtures::bestseller("444", Genre::Horror)).await;
        let sci_fi = store.seed_book(fixtures::bestseller("444", Genre::ScienceFiction)).await;

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_by_isbn("444", Genre::ScienceFiction).await.unwrap();
        assert_eq!(found.map(|b| b.id), Some(sci_fi.id));
    }

    #[tokio::test]
    async fn test_delete_refuses_referenced_book() {
        let store = MemoryStore::new();
        let book = store.seed_book(fixtures::book("111", Genre::Fiction)).await;
        store.seed_room(book.id).await;

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(tx.delete(book.id).await, Err(AppError::Conflict(_))));
    }
}

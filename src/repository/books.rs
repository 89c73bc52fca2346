//! Books repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Row};

use super::{BookStore, PgStoreTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{Book, Genre, NewBook},
};

const BOOK_COLUMNS: &str = r#"
    id, isbn, genre, best_seller, title, author, publisher, published_at,
    description, image_url, aladin_item_id, created_at, updated_at
"#;

fn book_from_row(row: &PgRow) -> Book {
    Book {
        id: row.get("id"),
        isbn: row.get("isbn"),
        genre: Genre::from(row.get::<i16, _>("genre")),
        best_seller: row.get("best_seller"),
        title: row.get("title"),
        author: row.get("author"),
        publisher: row.get("publisher"),
        published_at: row.get("published_at"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        aladin_item_id: row.get("aladin_item_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl BookStore for PgStoreTransaction {
    async fn find_bestseller(&mut self, genre: Genre) -> AppResult<Option<Book>> {
        let query = format!(
            "SELECT {} FROM books WHERE best_seller = TRUE AND genre = $1 ORDER BY id LIMIT 1",
            BOOK_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(i16::from(genre))
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(book_from_row))
    }

    async fn find_by_isbn(&mut self, isbn: &str, genre: Genre) -> AppResult<Option<Book>> {
        let query = format!(
            r#"
            SELECT {} FROM books
            WHERE isbn = $1
            ORDER BY (genre = $2) DESC, best_seller DESC, id
            LIMIT 1
            "#,
            BOOK_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(isbn)
            .bind(i16::from(genre))
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(book_from_row))
    }

    async fn insert(&mut self, book: NewBook) -> AppResult<Book> {
        if !book.force_new {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
                .bind(&book.isbn)
                .fetch_one(&mut *self.tx)
                .await?;
            if exists {
                return Err(AppError::Conflict(format!(
                    "Book with isbn {} already exists",
                    book.isbn
                )));
            }
        }

        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO books (
                isbn, genre, best_seller, title, author, publisher, published_at,
                description, image_url, aladin_item_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING id
            "#,
        )
        .bind(&book.isbn)
        .bind(i16::from(book.genre))
        .bind(book.best_seller)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(book.published_at)
        .bind(&book.description)
        .bind(&book.image_url)
        .bind(book.aladin_item_id)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(book.into_book(id, now))
    }

    async fn update(&mut self, book: &Book) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books SET
                isbn = $1, genre = $2, best_seller = $3, title = $4, author = $5,
                publisher = $6, published_at = $7, description = $8, image_url = $9,
                aladin_item_id = $10, updated_at = $11
            WHERE id = $12
            "#,
        )
        .bind(&book.isbn)
        .bind(i16::from(book.genre))
        .bind(book.best_seller)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(book.published_at)
        .bind(&book.description)
        .bind(&book.image_url)
        .bind(book.aladin_item_id)
        .bind(Utc::now())
        .bind(book.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", book.id)));
        }
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    async fn count_rooms(&mut self, book_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM rooms WHERE book_id = $1")
            .bind(book_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn count_favorites(&mut self, book_id: i64) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*)::bigint FROM favorites WHERE book_id = $1")
                .bind(book_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count)
    }
}

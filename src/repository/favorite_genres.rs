//! Favorite genres repository

use async_trait::async_trait;
use sqlx::Row;

use super::{FavoriteGenreStore, PgStoreTransaction};
use crate::{
    error::AppResult,
    models::{FavoriteGenre, Genre},
};

#[async_trait]
impl FavoriteGenreStore for PgStoreTransaction {
    async fn find_by_genre(&mut self, genre: Genre) -> AppResult<Vec<FavoriteGenre>> {
        let rows = sqlx::query(
            "SELECT id, user_id, genre, book_id FROM favorite_genres WHERE genre = $1 ORDER BY id",
        )
        .bind(i16::from(genre))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .iter()
            .map(|r| FavoriteGenre {
                id: r.get("id"),
                user_id: r.get("user_id"),
                genre: Genre::from(r.get::<i16, _>("genre")),
                book_id: r.get("book_id"),
            })
            .collect())
    }

    async fn save_all(&mut self, rows: &[FavoriteGenre]) -> AppResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let book_ids: Vec<i64> = rows.iter().map(|r| r.book_id).collect();

        let result = sqlx::query(
            r#"
            UPDATE favorite_genres AS f
            SET book_id = u.book_id
            FROM UNNEST($1::bigint[], $2::bigint[]) AS u(id, book_id)
            WHERE f.id = u.id
            "#,
        )
        .bind(&ids)
        .bind(&book_ids)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_by_book(&mut self, book_id: i64) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*)::bigint FROM favorite_genres WHERE book_id = $1")
                .bind(book_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count)
    }
}

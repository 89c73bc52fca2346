//! Book model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::enums::Genre;

/// Persisted book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: i64,
    /// Catalog-assigned identifying code (ISBN-13 when available)
    pub isbn: String,
    pub genre: Genre,
    pub best_seller: bool,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub aladin_item_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Book materialized from a catalog payload, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub isbn: String,
    pub genre: Genre,
    pub best_seller: bool,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub aladin_item_id: Option<i64>,
    /// Insert even when another row already carries the same isbn
    pub force_new: bool,
}

impl NewBook {
    /// Attach the id and timestamps assigned by the store
    pub fn into_book(self, id: i64, now: DateTime<Utc>) -> Book {
        Book {
            id,
            isbn: self.isbn,
            genre: self.genre,
            best_seller: self.best_seller,
            title: self.title,
            author: self.author,
            publisher: self.publisher,
            published_at: self.published_at,
            description: self.description,
            image_url: self.image_url,
            aladin_item_id: self.aladin_item_id,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// Current bestseller of one genre, as listed by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenreBestseller {
    pub genre: Genre,
    pub book: Option<Book>,
}

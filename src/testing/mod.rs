//! Testing utilities: in-memory persistence and a scripted catalog.
//!
//! These stand in for PostgreSQL and the Aladin API so the reconciliation
//! engine can be driven end to end without infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use bookjourney_server::testing::{fixtures, MemoryStore, ScriptedCatalog};
//!
//! let store = MemoryStore::new();
//! let old = store.seed_book(fixtures::bestseller("111", Genre::Fiction)).await;
//!
//! let catalog = ScriptedCatalog::new();
//! catalog.set_bestseller(Genre::Fiction, "222").await;
//! ```

mod memory_store;
mod scripted_catalog;

pub use memory_store::{FailPoint, MemoryStore};
pub use scripted_catalog::ScriptedCatalog;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::models::{Genre, NewBook};

    /// A book row flagged as the genre's bestseller
    pub fn bestseller(isbn: &str, genre: Genre) -> NewBook {
        NewBook {
            best_seller: true,
            ..book(isbn, genre)
        }
    }

    /// A plain, non-bestseller book row
    pub fn book(isbn: &str, genre: Genre) -> NewBook {
        NewBook {
            isbn: isbn.to_string(),
            genre,
            best_seller: false,
            title: format!("Book {}", isbn),
            author: Some("Test Author".to_string()),
            publisher: None,
            published_at: None,
            description: None,
            image_url: None,
            aladin_item_id: None,
            force_new: true,
        }
    }

    /// Aladin ItemList body ranking the given isbns in order
    pub fn bestseller_payload(isbns: &[&str]) -> String {
        let items: Vec<serde_json::Value> = isbns
            .iter()
            .enumerate()
            .map(|(rank, isbn)| {
                serde_json::json!({
                    "title": format!("Book {}", isbn),
                    "author": "Test Author",
                    "publisher": "Test Press",
                    "pubDate": "2024-05-01",
                    "isbn13": isbn,
                    "itemId": 1000 + rank as i64,
                    "bestRank": rank + 1,
                })
            })
            .collect();

        serde_json::json!({
            "version": "20131101",
            "totalResults": items.len(),
            "item": items,
        })
        .to_string()
    }
}

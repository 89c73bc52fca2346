//! Scripted catalog client for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::fixtures;
use crate::{
    error::{AppError, AppResult},
    models::Genre,
    services::{aladin::CatalogClient, payload},
};

#[derive(Debug, Clone)]
enum Script {
    Body(String),
    Unavailable(String),
    Hang(Duration),
}

/// Catalog answering each category with a configured body or failure.
///
/// Bodies go through the same structural validation as the Aladin client,
/// so malformed bodies surface as `CatalogMalformedResponse`. Categories
/// without a script answer `CatalogUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCatalog {
    scripts: Arc<RwLock<HashMap<i32, Script>>>,
    calls: Arc<RwLock<Vec<i32>>>,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank `isbn` first in the genre's bestseller list
    pub async fn set_bestseller(&self, genre: Genre, isbn: &str) {
        self.set_body(genre, fixtures::bestseller_payload(&[isbn])).await;
    }

    /// Answer the genre with a raw body
    pub async fn set_body(&self, genre: Genre, body: String) {
        self.scripts
            .write()
            .await
            .insert(genre.category_id(), Script::Body(body));
    }

    /// Fail the genre's fetch as if the endpoint were down
    pub async fn set_unavailable(&self, genre: Genre) {
        self.scripts.write().await.insert(
            genre.category_id(),
            Script::Unavailable("connection refused".to_string()),
        );
    }

    /// Make the genre's fetch stall for `delay`
    pub async fn set_hang(&self, genre: Genre, delay: Duration) {
        self.scripts
            .write()
            .await
            .insert(genre.category_id(), Script::Hang(delay));
    }

    /// Rank one isbn first for each listed genre
    pub async fn set_all(&self, isbns: &HashMap<Genre, String>) {
        for (genre, isbn) in isbns {
            self.set_bestseller(*genre, isbn).await;
        }
    }

    /// Category ids requested so far, in order
    pub async fn calls(&self) -> Vec<i32> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl CatalogClient for ScriptedCatalog {
    async fn fetch_bestsellers(&self, category_id: i32) -> AppResult<String> {
        self.calls.write().await.push(category_id);

        let script = self.scripts.read().await.get(&category_id).cloned();
        match script {
            Some(Script::Body(body)) => {
                payload::validate_response(&body)?;
                Ok(body)
            }
            Some(Script::Unavailable(message)) => Err(AppError::CatalogUnavailable(message)),
            Some(Script::Hang(delay)) => {
                tokio::time::sleep(delay).await;
                Err(AppError::CatalogUnavailable("stalled request gave up".to_string()))
            }
            None => Err(AppError::CatalogUnavailable(format!(
                "no script for category {}",
                category_id
            ))),
        }
    }
}

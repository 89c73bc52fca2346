//! Aladin open API client for bestseller lists

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    config::AladinConfig,
    error::{AppError, AppResult},
    services::payload,
};

/// Source of raw bestseller payloads, one request per catalog category
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch the bestseller list of `category_id`. The returned body has
    /// passed structural validation.
    async fn fetch_bestsellers(&self, category_id: i32) -> AppResult<String>;
}

/// reqwest-based client for the Aladin `ItemList` endpoint
#[derive(Clone)]
pub struct AladinClient {
    client: Client,
    base_url: String,
    ttb_key: String,
    max_results: u32,
}

impl AladinClient {
    pub fn new(config: &AladinConfig) -> AppResult<Self> {
        if config.ttb_key.is_empty() {
            tracing::warn!("Aladin TTB key is not configured, bestseller fetches will be rejected");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ttb_key: config.ttb_key.clone(),
            max_results: config.max_results,
        })
    }

    fn item_list_url(&self) -> String {
        format!("{}/ItemList.aspx", self.base_url)
    }
}

#[async_trait]
impl CatalogClient for AladinClient {
    async fn fetch_bestsellers(&self, category_id: i32) -> AppResult<String> {
        tracing::debug!("Aladin bestseller request: category_id={}", category_id);

        let response = self
            .client
            .get(self.item_list_url())
            .query(&[
                ("ttbkey", self.ttb_key.as_str()),
                ("QueryType", "Bestseller"),
                ("SearchTarget", "Book"),
                ("start", "1"),
                ("output", "js"),
                ("Version", "20131101"),
            ])
            .query(&[
                ("MaxResults", i64::from(self.max_results)),
                ("CategoryId", i64::from(category_id)),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::CatalogUnavailable(format!("request timed out: {}", e))
                } else {
                    AppError::CatalogUnavailable(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CatalogUnavailable(format!(
                "Aladin returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::CatalogUnavailable(format!("failed to read body: {}", e)))?;

        payload::validate_response(&body)?;
        tracing::debug!("Aladin response body: {}", body);

        Ok(body)
    }
}

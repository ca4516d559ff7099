//! Remote sheet API backend
//!
//! Information Hiding:
//! - Endpoint layout and JSON wire shape hidden behind the RowStore trait
//! - Timeout handling internalized; every transport failure maps to
//!   `StoreError::Connectivity`

use super::{Row, RowStore, StoreError};
use crate::config::Settings;
use async_trait::async_trait;
use reqwest::Client;
use tokio::time::{timeout, Duration};

/// Row store backed by the remote sheet service. Tables map to worksheets;
/// rows travel as JSON arrays of strings.
pub struct SheetStore {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl SheetStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.store.base_url.trim_end_matches('/').to_string(),
            timeout_secs: settings.store.timeout_secs,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/tables/{}/rows", self.base_url, table)
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        match timeout(Duration::from_secs(self.timeout_secs), fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Connectivity(format!(
                "request timed out after {} seconds",
                self.timeout_secs
            ))),
        }
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Connectivity(e.to_string())
}

#[async_trait]
impl RowStore for SheetStore {
    async fn rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let url = self.table_url(table);
        self.bounded(async {
            let response = self.client.get(&url).send().await.map_err(transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(StoreError::Backend(format!(
                    "GET {} returned {}",
                    url, status
                )));
            }
            let rows = response.json::<Vec<Row>>().await.map_err(transport)?;
            tracing::debug!("[SheetStore] Read {} rows from '{}'", rows.len(), table);
            Ok(rows)
        })
        .await
    }

    async fn append(&self, table: &str, row: Row) -> Result<(), StoreError> {
        let url = self.table_url(table);
        self.bounded(async {
            let response = self
                .client
                .post(&url)
                .json(&row)
                .send()
                .await
                .map_err(transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(StoreError::Backend(format!(
                    "POST {} returned {}",
                    url, status
                )));
            }
            tracing::debug!("[SheetStore] Appended row to '{}'", table);
            Ok(())
        })
        .await
    }

    async fn update_cell(
        &self,
        table: &str,
        row_index: usize,
        column: usize,
        value: &str,
    ) -> Result<(), StoreError> {
        let url = format!(
            "{}/tables/{}/rows/{}/cells/{}",
            self.base_url, table, row_index, column
        );
        self.bounded(async {
            let response = self
                .client
                .patch(&url)
                .json(&serde_json::json!({ "value": value }))
                .send()
                .await
                .map_err(transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(StoreError::Backend(format!(
                    "PATCH {} returned {}",
                    url, status
                )));
            }
            tracing::debug!(
                "[SheetStore] Updated '{}' row {} column {}",
                table,
                row_index,
                column
            );
            Ok(())
        })
        .await
    }
}

//! In-memory row tables
//!
//! Information Hiding:
//! - HashMap layout hidden behind the RowStore trait
//! - Thread-safe access via RwLock hidden behind async interface
//! - Backs guest sessions and tests; data dies with the process

use super::{Row, RowStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).cloned().unwrap_or_default();
        tracing::debug!("[MemoryStore] Read {} rows from '{}'", rows.len(), table);
        Ok(rows)
    }

    async fn append(&self, table: &str, row: Row) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row);
        tracing::debug!("[MemoryStore] Appended row to '{}'", table);
        Ok(())
    }

    async fn update_cell(
        &self,
        table: &str,
        row_index: usize,
        column: usize,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::Backend(format!("table '{}' does not exist", table)))?;

        if row_index == 0 || row_index > rows.len() {
            return Err(StoreError::Backend(format!(
                "row {} out of range for '{}'",
                row_index, table
            )));
        }

        let row = &mut rows[row_index - 1];
        if column == 0 || column > row.len() {
            return Err(StoreError::Backend(format!(
                "column {} out of range for '{}'",
                column, table
            )));
        }

        row[column - 1] = value.to_string();
        tracing::debug!(
            "[MemoryStore] Updated '{}' row {} column {}",
            table,
            row_index,
            column
        );
        Ok(())
    }
}

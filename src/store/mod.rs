//! Durable row-log boundary
//!
//! Information Hiding:
//! - Backend (remote sheet API vs in-memory tables) hidden behind trait
//! - Row indices are recomputed by callers before every mutation; the
//!   lost-update race between concurrent writers is accepted, not guarded
//! - Connectivity failures surface as a single error class

use async_trait::async_trait;
use thiserror::Error;

pub mod history;
pub mod memory;
pub mod sheet;

pub use history::HistoryStore;
pub use memory::MemoryStore;
pub use sheet::SheetStore;

/// One data row: an ordered list of string cells. The header is implied by
/// the table schema and never transported.
pub type Row = Vec<String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Connectivity(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Row-oriented table store. `row_index` and `column` are 1-based and count
/// data rows only (the header row is excluded).
#[async_trait]
pub trait RowStore: Send + Sync {
    /// All data rows of a table, in append order.
    async fn rows(&self, table: &str) -> Result<Vec<Row>, StoreError>;

    /// Append one row at the end of a table.
    async fn append(&self, table: &str, row: Row) -> Result<(), StoreError>;

    /// Overwrite a single cell in place.
    async fn update_cell(
        &self,
        table: &str,
        row_index: usize,
        column: usize,
        value: &str,
    ) -> Result<(), StoreError>;
}

/// Table names shared with the external store.
pub mod tables {
    pub const USERS: &str = "users";
    pub const AI_HISTORY: &str = "ai_history";
    pub const MESSAGES: &str = "messages";
    pub const COMMENTS: &str = "comments";
    pub const CROPS: &str = "crops";
    pub const ORDERS: &str = "orders";
}

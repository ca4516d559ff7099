//! Chat history adapter
//!
//! Append-only log of question/answer turns keyed by (user, topic), laid
//! over the row-log boundary. Loading degrades to an empty set on any
//! connectivity failure; appends are at-most-once with no retry.

use super::{tables, Row, RowStore, StoreError};
use crate::session::state::{TopicSet, Turn};
use std::sync::Arc;

/// Column order of the `ai_history` table:
/// username, timestamp, topic, question, answer.
const COL_USERNAME: usize = 0;
const COL_TIMESTAMP: usize = 1;
const COL_TOPIC: usize = 2;
const COL_QUESTION: usize = 3;
const COL_ANSWER: usize = 4;

pub struct HistoryStore {
    store: Arc<dyn RowStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Every topic of `username`, in row (append) order. Never raises:
    /// connectivity failures come back as an empty set.
    pub async fn load_all(&self, username: &str) -> TopicSet {
        let rows = match self.store.rows(tables::AI_HISTORY).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("[HistoryStore] Could not load chats for '{}': {}", username, e);
                return TopicSet::new();
            }
        };

        let wanted = username.trim().to_lowercase();
        let mut topics = TopicSet::new();
        for row in rows {
            let owner = cell(&row, COL_USERNAME);
            if owner.trim().to_lowercase() != wanted {
                continue;
            }
            let topic = {
                let name = cell(&row, COL_TOPIC);
                let name = name.trim();
                if name.is_empty() {
                    "Untitled".to_string()
                } else {
                    name.to_string()
                }
            };
            topics.push_turn(
                &topic,
                Turn {
                    timestamp: cell(&row, COL_TIMESTAMP),
                    question: cell(&row, COL_QUESTION),
                    answer: cell(&row, COL_ANSWER),
                },
            );
        }

        tracing::debug!(
            "[HistoryStore] Loaded {} topics for '{}'",
            topics.len(),
            username
        );
        topics
    }

    /// Durable append of one turn. The caller's in-memory state advances
    /// whether or not this succeeds.
    pub async fn append(&self, username: &str, topic: &str, turn: &Turn) -> Result<(), StoreError> {
        let row: Row = vec![
            username.to_string(),
            turn.timestamp.clone(),
            topic.to_string(),
            turn.question.clone(),
            turn.answer.clone(),
        ];
        self.store.append(tables::AI_HISTORY, row).await
    }
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).cloned().unwrap_or_default()
}

//! Topic naming
//!
//! Derives a short label for a new conversation from its first exchange.
//! Failures never reach the UI: the caller receives `None` and applies the
//! timestamp fallback.

use crate::core::{ChatMessage, ChatResponder, Completion};
use crate::session::state::Turn;
use chrono::Local;
use std::sync::Arc;

const NAMING_INSTRUCTION: &str = "Give a short 3-5 word English title for a farming \
     conversation that starts with the exchange below. Reply with the title only, \
     no quotes, no punctuation at the end.";

pub struct TopicNamer {
    responder: Arc<dyn ChatResponder>,
}

impl TopicNamer {
    pub fn new(responder: Arc<dyn ChatResponder>) -> Self {
        Self { responder }
    }

    /// Ask the responder for a candidate name, then reconcile it against the
    /// user's existing topics. `None` means "no name available".
    pub async fn name_topic(&self, first: &Turn, existing: &[String]) -> Option<String> {
        let messages = vec![
            ChatMessage::system(NAMING_INSTRUCTION),
            ChatMessage::user(format!(
                "Question: {}\nAnswer: {}",
                first.question, first.answer
            )),
        ];

        match self.responder.complete(&messages).await {
            Ok(Completion { text, .. }) => {
                let candidate = text.trim();
                if candidate.is_empty() {
                    tracing::warn!("[TopicNamer] Responder returned an empty name");
                    None
                } else {
                    Some(reconcile(candidate, existing))
                }
            }
            Err(e) => {
                tracing::warn!("[TopicNamer] Naming call failed: {}", e);
                None
            }
        }
    }
}

/// Fold a candidate name into an existing topic when either contains the
/// other, case-insensitively. First match in insertion order wins, so
/// near-duplicate topics collapse into whichever existed first.
pub fn reconcile(candidate: &str, existing: &[String]) -> String {
    let lower = candidate.to_lowercase();
    for name in existing {
        let existing_lower = name.to_lowercase();
        if existing_lower.contains(&lower) || lower.contains(&existing_lower) {
            return name.clone();
        }
    }
    candidate.to_string()
}

/// Deterministic default when no name is available. Distinct per submission
/// timestamp; same-second collisions are a documented limitation.
pub fn fallback_name() -> String {
    format!("Chat - {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

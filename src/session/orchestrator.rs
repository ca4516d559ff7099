//! Chat turn orchestrator
//!
//! One synchronous pass per user message: build the conversation context,
//! ask the responder, record the turn, settle the topic name when needed,
//! and pair every in-memory append with a durable append for authenticated
//! users. Responder failures become a recorded turn, never an error.

use crate::core::{ChatMessage, ChatResponder, Completion};
use crate::session::namer::{fallback_name, TopicNamer};
use crate::session::state::{Phase, SessionState, Turn};
use crate::store::HistoryStore;
use chrono::Local;
use std::sync::Arc;

/// Fixed answer recorded when the responder is unreachable.
pub const FAILURE_ANSWER: &str = "request failed";
/// Model sentinel paired with `FAILURE_ANSWER`.
pub const NO_MODEL: &str = "none";

/// The recorded turn plus the model that produced the answer. The model is
/// not part of the durable row; it only travels back for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub turn: Turn,
    pub model: String,
}

pub struct ChatTurnOrchestrator {
    responder: Arc<dyn ChatResponder>,
    history: HistoryStore,
    namer: TopicNamer,
    system_prompt: String,
}

impl ChatTurnOrchestrator {
    pub fn new(
        responder: Arc<dyn ChatResponder>,
        history: HistoryStore,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            namer: TopicNamer::new(responder.clone()),
            responder,
            history,
            system_prompt: system_prompt.into(),
        }
    }

    /// Lazy one-time load of an authenticated user's saved topics.
    pub async fn ensure_topics_loaded(&self, state: &mut SessionState) {
        if state.is_authenticated() && !state.topics_loaded {
            state.topics = self.history.load_all(state.username()).await;
            state.topics_loaded = true;
        }
    }

    /// Handle one submitted message. Whitespace-only input is a no-op.
    pub async fn submit(&self, state: &mut SessionState, input: &str) -> Option<Exchange> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }

        self.ensure_topics_loaded(state).await;

        let mut messages = vec![ChatMessage::system(self.system_prompt.clone())];
        for turn in state.context_turns() {
            messages.push(ChatMessage::user(turn.question));
            messages.push(ChatMessage::assistant(turn.answer));
        }
        messages.push(ChatMessage::user(question));

        let completion = match self.responder.complete(&messages).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!("[Orchestrator] Responder unreachable: {}", e);
                Completion {
                    text: FAILURE_ANSWER.to_string(),
                    model: NO_MODEL.to_string(),
                }
            }
        };

        let turn = Turn {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            question: question.to_string(),
            answer: completion.text,
        };

        state.record_turn(turn.clone());

        if state.phase == Phase::NamingPending {
            let existing = state.topic_names();
            let name = self
                .namer
                .name_topic(&turn, &existing)
                .await
                .unwrap_or_else(fallback_name);
            tracing::debug!("[Orchestrator] Topic settled as '{}'", name);
            state.bind_topic(name);
        }

        if state.is_authenticated() {
            if let Some(topic) = state.current_topic.clone() {
                let username = state.username().to_string();
                if let Err(e) = self.history.append(&username, &topic, &turn).await {
                    // At-most-once: the in-memory state keeps the turn.
                    tracing::warn!(
                        "[Orchestrator] Durable append failed for '{}': {}",
                        username,
                        e
                    );
                }
            }
        }

        Some(Exchange {
            turn,
            model: completion.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRecord;
    use crate::store::{MemoryStore, RowStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Responder that replays a queue of canned outcomes.
    struct ScriptedResponder {
        replies: Mutex<VecDeque<Result<Completion>>>,
    }

    impl ScriptedResponder {
        fn new(replies: Vec<Result<Completion>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
            }
        }

        fn ok(text: &str) -> Result<Completion> {
            Ok(Completion {
                text: text.to_string(),
                model: "scripted".to_string(),
            })
        }
    }

    #[async_trait]
    impl ChatResponder for ScriptedResponder {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<Completion> {
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
        }
    }

    fn orchestrator(replies: Vec<Result<Completion>>) -> (ChatTurnOrchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = ChatTurnOrchestrator::new(
            Arc::new(ScriptedResponder::new(replies)),
            HistoryStore::new(store.clone()),
            "You are a farming assistant.",
        );
        (orchestrator, store)
    }

    fn user() -> UserRecord {
        UserRecord {
            username: "ravi".to_string(),
            password: String::new(),
            name: "Ravi".to_string(),
            email: "ravi@example.com".to_string(),
            phone: "+911234567890".to_string(),
            address: "Madurai".to_string(),
            dob: "1990-01-01".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let (orchestrator, _) = orchestrator(vec![]);
        let mut state = SessionState::new();

        assert!(orchestrator.submit(&mut state, "   ").await.is_none());
        assert_eq!(state.phase, Phase::NoTopic);
        assert!(state.history.is_empty());
    }

    #[tokio::test]
    async fn first_submit_names_the_topic_and_goes_active() {
        let (orchestrator, _) = orchestrator(vec![
            ScriptedResponder::ok("Spray a copper fungicide."),
            ScriptedResponder::ok("Leaf Blight Treatment"),
        ]);
        let mut state = SessionState::new();

        let exchange = orchestrator
            .submit(&mut state, "How do I treat leaf blight?")
            .await
            .unwrap();

        assert_eq!(state.phase, Phase::Active);
        assert_eq!(state.current_topic.as_deref(), Some("Leaf Blight Treatment"));
        assert_eq!(state.history.len(), 1);
        assert_eq!(exchange.turn.question, "How do I treat leaf blight?");
    }

    #[tokio::test]
    async fn responder_failure_is_recorded_as_a_turn() {
        let (orchestrator, _) = orchestrator(vec![
            Err(anyhow::anyhow!("connection refused")),
            // Naming call also fails; the fallback name kicks in.
            Err(anyhow::anyhow!("connection refused")),
        ]);
        let mut state = SessionState::new();

        let exchange = orchestrator.submit(&mut state, "test").await.unwrap();

        assert_eq!(exchange.turn.answer, FAILURE_ANSWER);
        assert_eq!(exchange.model, NO_MODEL);
        assert_eq!(state.history.len(), 1);
        assert!(state
            .current_topic
            .as_deref()
            .unwrap()
            .starts_with("Chat - "));
    }

    #[tokio::test]
    async fn authenticated_turns_reach_the_durable_store() {
        let (orchestrator, store) = orchestrator(vec![
            ScriptedResponder::ok("Use well-rotted compost."),
            ScriptedResponder::ok("Composting Basics"),
        ]);
        let mut state = SessionState::for_user(user());

        orchestrator.submit(&mut state, "How to compost?").await.unwrap();

        let rows = store.rows("ai_history").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "ravi");
        assert_eq!(rows[0][2], "Composting Basics");
        assert_eq!(rows[0][3], "How to compost?");
    }

    #[tokio::test]
    async fn guest_turns_never_touch_the_store() {
        let (orchestrator, store) = orchestrator(vec![
            ScriptedResponder::ok("Plant after the first rains."),
            ScriptedResponder::ok("Sowing Season"),
        ]);
        let mut state = SessionState::new();

        orchestrator.submit(&mut state, "When to sow?").await.unwrap();

        assert!(store.rows("ai_history").await.unwrap().is_empty());
        assert_eq!(state.guest_archive.len(), 1);
    }

    #[tokio::test]
    async fn candidate_name_folds_into_existing_topic() {
        let (orchestrator, _) = orchestrator(vec![
            ScriptedResponder::ok("a1"),
            ScriptedResponder::ok("Soil Management"),
            ScriptedResponder::ok("a2"),
            ScriptedResponder::ok("soil management tips"),
        ]);
        let mut state = SessionState::new();

        orchestrator.submit(&mut state, "q1").await.unwrap();
        state.new_chat();
        orchestrator.submit(&mut state, "q2").await.unwrap();

        assert_eq!(state.current_topic.as_deref(), Some("Soil Management"));
        let topic = state.guest_archive.get("Soil Management").unwrap();
        assert_eq!(topic.turns.len(), 2);
        assert_eq!(state.guest_archive.len(), 1);
    }
}

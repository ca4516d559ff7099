//! Action handler
//!
//! One explicit entry point per user interaction: the handler receives the
//! current session state and an `Action`, mutates the state, and returns a
//! render payload. Failures surface as dismissible inline notices; only the
//! login gate withholds content.

use crate::auth::{Directory, TokenCache};
use crate::session::orchestrator::{ChatTurnOrchestrator, NO_MODEL};
use crate::session::state::{SessionState, Turn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Submit(String),
    SelectTopic(String),
    NewChat,
    Login { identifier: String, secret: String },
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Inline message rendered on the same page as the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// What the page shows after an action: the active topic, its turns, and
/// an optional notice.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub topic: Option<String>,
    pub turns: Vec<Turn>,
    pub notice: Option<Notice>,
}

pub struct SessionHandler {
    orchestrator: ChatTurnOrchestrator,
    directory: Directory,
    tokens: TokenCache,
}

impl SessionHandler {
    pub fn new(
        orchestrator: ChatTurnOrchestrator,
        directory: Directory,
        tokens: TokenCache,
    ) -> Self {
        Self {
            orchestrator,
            directory,
            tokens,
        }
    }

    /// Rebuild a session from the persisted token, if one survives.
    pub async fn resume(&self) -> SessionState {
        if let Some(username) = self.tokens.load().await {
            if let Some(user) = self.directory.find_by_username(&username).await {
                tracing::info!("[SessionHandler] Resumed session for '{}'", username);
                return SessionState::for_user(user);
            }
            tracing::warn!("[SessionHandler] Stale token for unknown user '{}'", username);
        }
        SessionState::new()
    }

    pub async fn handle(&self, state: &mut SessionState, action: Action) -> RenderPayload {
        let notice = match action {
            Action::Submit(text) => match self.orchestrator.submit(state, &text).await {
                Some(exchange) if exchange.model == NO_MODEL => Some(Notice::warning(
                    "The assistant is unreachable right now; your question was kept.",
                )),
                Some(_) => None,
                None => Some(Notice::warning("Type a message first.")),
            },
            Action::SelectTopic(name) => {
                self.orchestrator.ensure_topics_loaded(state).await;
                if state.select_topic(&name) {
                    None
                } else {
                    Some(Notice::warning(format!("No saved chat named '{}'.", name)))
                }
            }
            Action::NewChat => {
                state.new_chat();
                Some(Notice::info("Started a new chat."))
            }
            Action::Login { identifier, secret } => {
                match self.directory.verify(&identifier, &secret).await {
                    Some(user) => {
                        let username = user.username.clone();
                        *state = SessionState::for_user(user);
                        if let Err(e) = self.tokens.save(&username).await {
                            tracing::warn!("[SessionHandler] Token write failed: {}", e);
                        }
                        Some(Notice::info(format!("Welcome {}!", username)))
                    }
                    None => Some(Notice::error("Invalid username/email or password.")),
                }
            }
            Action::Logout => {
                *state = SessionState::new();
                if let Err(e) = self.tokens.clear().await {
                    tracing::warn!("[SessionHandler] Token clear failed: {}", e);
                }
                Some(Notice::info("Logged out."))
            }
        };

        RenderPayload {
            topic: state.current_topic.clone(),
            turns: state.history.clone(),
            notice,
        }
    }

    /// Saved topic names for the picker, loading them on first use.
    pub async fn saved_topics(&self, state: &mut SessionState) -> Vec<String> {
        self.orchestrator.ensure_topics_loaded(state).await;
        state.topic_names()
    }
}

//! Conversation session core
//!
//! Information Hiding:
//! - Topic routing and naming internalized behind the state machine
//! - Guest vs authenticated persistence fork hidden from callers
//! - External responder and store reached only through their traits

pub mod handler;
pub mod namer;
pub mod orchestrator;
pub mod state;

pub use handler::{Action, Notice, NoticeLevel, RenderPayload, SessionHandler};
pub use namer::TopicNamer;
pub use orchestrator::{ChatTurnOrchestrator, Exchange, FAILURE_ANSWER, NO_MODEL};
pub use state::{Identity, Phase, SessionState, Topic, TopicSet, Turn};

//! Farmstead - session-driven assistant platform for farmers
//!
//! An AI chat assistant with named conversation topics, a peer message
//! board and a crop market, all persisted through a row-oriented remote
//! store. Guests keep everything in session memory; authenticated users
//! get durable history.

pub mod auth;
pub mod board;
pub mod cli;
mod config;
pub mod core;
pub mod market;
pub mod session;
pub mod store;
pub mod utils;

pub use self::config::Settings;

pub use auth::{Directory, Registration, TokenCache, UserRecord};
pub use board::{ChatMode, MessageBoard};
pub use self::core::{ChatResponder, LlmClient};
pub use market::Market;
pub use session::{Action, ChatTurnOrchestrator, SessionHandler, SessionState};
pub use store::{HistoryStore, MemoryStore, RowStore, SheetStore};

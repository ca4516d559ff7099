//! Integration tests for Farmstead
//!
//! These tests exercise the session, auth, board and market flows against
//! the in-memory store and a scripted responder; no network or API keys.

use anyhow::Result;
use async_trait::async_trait;
use farmstead::core::{ChatMessage, ChatResponder, Completion};
use farmstead::market::{Decision, Delivery, Market, OrderStatus};
use farmstead::session::{
    Action, ChatTurnOrchestrator, Phase, SessionHandler, SessionState, FAILURE_ANSWER, NO_MODEL,
};
use farmstead::store::{tables, HistoryStore, MemoryStore, RowStore};
use farmstead::{ChatMode, Directory, MessageBoard, Registration, TokenCache};
use std::collections::VecDeque;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Responder that replays canned outcomes in order, then fails.
struct ScriptedResponder {
    replies: Mutex<VecDeque<Result<Completion>>>,
}

impl ScriptedResponder {
    fn new(replies: Vec<Result<Completion>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
        })
    }

    fn ok(text: &str) -> Result<Completion> {
        Ok(Completion {
            text: text.to_string(),
            model: "scripted".to_string(),
        })
    }

    fn down() -> Result<Completion> {
        Err(anyhow::anyhow!("connection refused"))
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

fn registration(username: &str) -> Registration {
    Registration {
        username: username.to_string(),
        password: "secret12".to_string(),
        confirm_password: "secret12".to_string(),
        email: format!("{}@example.com", username),
        phone: "+919876543210".to_string(),
        address: "Madurai".to_string(),
        dob: "1990-01-01".to_string(),
    }
}

fn orchestrator_over(
    store: Arc<MemoryStore>,
    replies: Vec<Result<Completion>>,
) -> ChatTurnOrchestrator {
    ChatTurnOrchestrator::new(
        ScriptedResponder::new(replies),
        HistoryStore::new(store),
        "You are a farming assistant.",
    )
}

#[tokio::test]
async fn first_submission_activates_a_named_topic() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_over(
        store,
        vec![
            ScriptedResponder::ok("Spray a copper-based fungicide early."),
            ScriptedResponder::ok("Leaf Blight Treatment"),
        ],
    );
    let mut state = SessionState::new();
    assert_eq!(state.phase, Phase::NoTopic);

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
async fn unreachable_responder_still_records_the_turn() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_over(
        store,
        vec![ScriptedResponder::down(), ScriptedResponder::down()],
    );
    let mut state = SessionState::new();

    let exchange = orchestrator.submit(&mut state, "test").await.unwrap();

    assert_eq!(exchange.turn.answer, FAILURE_ANSWER);
    assert_eq!(exchange.model, NO_MODEL);
    assert_eq!(state.history.len(), 1);
    // The naming call failed too, so the fallback name carries a timestamp.
    assert!(state.current_topic.as_deref().unwrap().starts_with("Chat - "));
}

#[tokio::test]
async fn failed_namer_produces_distinct_fallback_names() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_over(
        store,
        vec![
            ScriptedResponder::ok("a1"),
            ScriptedResponder::down(),
            ScriptedResponder::ok("a2"),
            ScriptedResponder::down(),
        ],
    );
    let mut state = SessionState::new();

    orchestrator.submit(&mut state, "q1").await.unwrap();
    let first = state.current_topic.clone().unwrap();
    tokio::time::sleep(tokio::time::Duration::from_millis(1100)).await;
    state.new_chat();
    orchestrator.submit(&mut state, "q2").await.unwrap();
    let second = state.current_topic.clone().unwrap();

    assert!(first.starts_with("Chat - "));
    assert!(second.starts_with("Chat - "));
    assert_ne!(first, second);
}

#[tokio::test]
async fn candidate_names_collapse_into_the_oldest_matching_topic() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_over(
        store,
        vec![
            ScriptedResponder::ok("a1"),
            ScriptedResponder::ok("Irrigation Tips"),
            ScriptedResponder::ok("a2"),
            ScriptedResponder::ok("Smart Irrigation"),
            ScriptedResponder::ok("a3"),
            ScriptedResponder::ok("irrigation"),
        ],
    );
    let mut state = SessionState::new();

    orchestrator.submit(&mut state, "q1").await.unwrap();
    state.new_chat();
    orchestrator.submit(&mut state, "q2").await.unwrap();
    state.new_chat();
    orchestrator.submit(&mut state, "q3").await.unwrap();

    // Both existing names contain "irrigation"; the first created wins.
    assert_eq!(state.current_topic.as_deref(), Some("Irrigation Tips"));
    assert_eq!(state.guest_archive.len(), 2);
}

#[tokio::test]
async fn authenticated_history_round_trips_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    let directory = Directory::new(store.clone());
    let user = directory.register(registration("ravi")).await.unwrap();

    let orchestrator = orchestrator_over(
        store.clone(),
        vec![
            ScriptedResponder::ok("Rotate with legumes."),
            ScriptedResponder::ok("Crop Rotation"),
        ],
    );
    let mut state = SessionState::for_user(user);
    let exchange = orchestrator
        .submit(&mut state, "What should follow paddy?")
        .await
        .unwrap();

    // A fresh session sees the same turn, field for field.
    let reloaded = HistoryStore::new(store).load_all("ravi").await;
    let topic = reloaded.get("Crop Rotation").unwrap();
    assert_eq!(topic.turns, vec![exchange.turn]);
}

#[tokio::test]
async fn guest_turns_never_reach_the_durable_store() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_over(
        store.clone(),
        vec![
            ScriptedResponder::ok("Keep the soil moist."),
            ScriptedResponder::ok("Seedling Care"),
        ],
    );

    let mut guest = SessionState::new();
    orchestrator.submit(&mut guest, "How to water seedlings?").await.unwrap();

    assert!(store.rows(tables::AI_HISTORY).await.unwrap().is_empty());
    assert!(HistoryStore::new(store).load_all("ravi").await.is_empty());
}

#[tokio::test]
async fn reopening_a_saved_topic_restores_its_turns() {
    let store = Arc::new(MemoryStore::new());
    let directory = Directory::new(store.clone());
    let user = directory.register(registration("ravi")).await.unwrap();

    let orchestrator = orchestrator_over(
        store.clone(),
        vec![
            ScriptedResponder::ok("Test the pH first."),
            ScriptedResponder::ok("Soil Health"),
        ],
    );
    let mut state = SessionState::for_user(user.clone());
    orchestrator.submit(&mut state, "Is my soil ok?").await.unwrap();

    // A brand-new session for the same user lazily loads and reopens.
    let mut later = SessionState::for_user(user);
    orchestrator.ensure_topics_loaded(&mut later).await;
    assert!(later.select_topic("Soil Health"));
    assert_eq!(later.history.len(), 1);
    assert_eq!(later.history[0].question, "Is my soil ok?");
}

#[tokio::test]
async fn handler_drives_login_chat_and_logout() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let directory = Directory::new(store.clone());
    directory.register(registration("ravi")).await.unwrap();

    let handler = SessionHandler::new(
        orchestrator_over(
            store.clone(),
            vec![
                ScriptedResponder::ok("Mulch keeps moisture in."),
                ScriptedResponder::ok("Mulching"),
            ],
        ),
        Directory::new(store.clone()),
        TokenCache::new(dir.path().join("session.json")),
    );

    let mut state = handler.resume().await;
    assert!(!state.is_authenticated());

    handler
        .handle(
            &mut state,
            Action::Login {
                identifier: "ravi@example.com".to_string(),
                secret: "secret12".to_string(),
            },
        )
        .await;
    assert!(state.is_authenticated());

    let payload = handler
        .handle(&mut state, Action::Submit("Why mulch?".to_string()))
        .await;
    assert_eq!(payload.topic.as_deref(), Some("Mulching"));
    assert_eq!(payload.turns.len(), 1);

    handler.handle(&mut state, Action::Logout).await;
    assert!(!state.is_authenticated());
    assert!(!handler.resume().await.is_authenticated());
    // The durable record survives the logout.
    assert_eq!(store.rows(tables::AI_HISTORY).await.unwrap().len(), 1);
}

#[tokio::test]
async fn board_and_comments_flow() {
    let store = Arc::new(MemoryStore::new());
    let board = MessageBoard::new(store);

    board
        .post("ravi", "Anyone selling paddy seed?", ChatMode::Public, None)
        .await
        .unwrap();
    board
        .post("mina", "Private note", ChatMode::Private, Some("ravi"))
        .await
        .unwrap();
    board.add_comment(1, "mina", "I have some").await.unwrap();
    assert!(board.like(1).await.unwrap());

    let feed = board.feed_with_comments(ChatMode::Public).await.unwrap();
    assert_eq!(feed.len(), 1);
    let (post, comments) = &feed[0];
    assert_eq!(post.likes, 1);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].commenter, "mina");
}

#[tokio::test]
async fn market_order_flow_between_two_users() {
    let store = Arc::new(MemoryStore::new());
    let directory = Directory::new(store.clone());
    let seller = directory.register(registration("ravi")).await.unwrap();
    let buyer = directory.register(registration("mina")).await.unwrap();

    let market = Market::new(store);
    market.post_listing(&seller, "Paddy", 100, 25).await.unwrap();

    let listing = market.listings().await.unwrap().remove(0);
    let order_id = market
        .place_order(&listing, &buyer, Delivery::HomeDelivery)
        .await
        .unwrap();

    assert_eq!(market.pending_sales("ravi").await.unwrap().len(), 1);

    market
        .decide(
            &order_id,
            Decision::AcceptCourier {
                company: "Speedy".to_string(),
                tracking: "TRK-1".to_string(),
                expected: "2026-08-20".to_string(),
            },
        )
        .await
        .unwrap();

    let orders = market.orders_for_buyer("mina").await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::AcceptedCourier);
    assert_eq!(orders[0].tracking, "TRK-1");
    assert!(market.pending_sales("ravi").await.unwrap().is_empty());
}

//! Session state machine
//!
//! A session moves between three phases: no topic chosen yet, first turn
//! captured but not yet named, and an active named topic. Every incoming
//! turn is routed through `record_turn`; `bind_topic` settles the name.

use crate::auth::UserRecord;
use serde::{Deserialize, Serialize};

/// One question/answer exchange. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: String,
    pub question: String,
    pub answer: String,
}

/// A named, chronologically ordered conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub turns: Vec<Turn>,
}

/// Ordered collection of one user's topics. Insertion order is preserved:
/// name de-duplication resolves ties by whichever topic existed first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSet {
    topics: Vec<Topic>,
}

impl TopicSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a turn to the named topic, creating the topic at the end of
    /// the set if it does not exist yet.
    pub fn push_turn(&mut self, name: &str, turn: Turn) {
        match self.topics.iter_mut().find(|t| t.name == name) {
            Some(topic) => topic.turns.push(turn),
            None => self.topics.push(Topic {
                name: name.to_string(),
                turns: vec![turn],
            }),
        }
    }

    /// Topic names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Who owns the session. Guests never touch the durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Guest,
    User(UserRecord),
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }

    pub fn username(&self) -> &str {
        match self {
            Identity::Guest => "Guest",
            Identity::User(user) => &user.username,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoTopic,
    NamingPending,
    Active,
}

/// Per-connection conversation state. Created with all-empty defaults,
/// mutated on every action, discarded when the session ends.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub identity: Identity,
    pub phase: Phase,
    pub current_topic: Option<String>,
    /// In-memory mirror of the active topic's turns.
    pub history: Vec<Turn>,
    /// Authenticated user's loaded topic set (cache of the durable store).
    pub topics: TopicSet,
    /// Guest-only topics, never persisted.
    pub guest_archive: TopicSet,
    pub topics_loaded: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            identity: Identity::Guest,
            phase: Phase::NoTopic,
            current_topic: None,
            history: Vec::new(),
            topics: TopicSet::new(),
            guest_archive: TopicSet::new(),
            topics_loaded: false,
        }
    }

    pub fn for_user(user: UserRecord) -> Self {
        Self {
            identity: Identity::User(user),
            ..Self::new()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }

    pub fn username(&self) -> &str {
        self.identity.username()
    }

    fn active_set(&self) -> &TopicSet {
        if self.is_authenticated() {
            &self.topics
        } else {
            &self.guest_archive
        }
    }

    fn active_set_mut(&mut self) -> &mut TopicSet {
        if self.is_authenticated() {
            &mut self.topics
        } else {
            &mut self.guest_archive
        }
    }

    /// Route an incoming turn. The first turn of a fresh session parks the
    /// buffer in `NamingPending` until `bind_topic` settles a name.
    pub fn record_turn(&mut self, turn: Turn) {
        match self.phase {
            Phase::NoTopic => {
                self.history.push(turn);
                self.phase = Phase::NamingPending;
            }
            Phase::NamingPending => {
                self.history.push(turn);
            }
            Phase::Active => {
                if let Some(name) = self.current_topic.clone() {
                    self.active_set_mut().push_turn(&name, turn.clone());
                }
                self.history.push(turn);
            }
        }
    }

    /// Settle the pending buffer under `name` and go active. Folding into an
    /// existing topic (after de-duplication) appends to it.
    pub fn bind_topic(&mut self, name: String) {
        let buffered = self.history.clone();
        for turn in buffered {
            self.active_set_mut().push_turn(&name, turn);
        }
        self.current_topic = Some(name);
        self.phase = Phase::Active;
    }

    /// Explicit "new chat": drop the unbound buffer and start over. Turns
    /// already bound to a topic stay in the set.
    pub fn new_chat(&mut self) {
        self.history.clear();
        self.current_topic = None;
        self.phase = Phase::NoTopic;
    }

    /// Replace the buffer with an existing topic's history. Unknown names
    /// are an empty result, not an error.
    pub fn select_topic(&mut self, name: &str) -> bool {
        let found = self.active_set().get(name).cloned();
        match found {
            Some(topic) => {
                self.history = topic.turns;
                self.current_topic = Some(topic.name);
                self.phase = Phase::Active;
                true
            }
            None => false,
        }
    }

    /// Names the namer must de-duplicate against.
    pub fn topic_names(&self) -> Vec<String> {
        self.active_set().names()
    }

    /// Conversation context for the responder. Guests get a flattened
    /// cross-topic memory: every archived guest turn precedes the active
    /// buffer. Authenticated users get only the active topic's turns.
    pub fn context_turns(&self) -> Vec<Turn> {
        let mut turns = Vec::new();
        if !self.is_authenticated() {
            for topic in self.guest_archive.iter() {
                if self.current_topic.as_deref() != Some(topic.name.as_str()) {
                    turns.extend(topic.turns.iter().cloned());
                }
            }
        }
        turns.extend(self.history.iter().cloned());
        turns
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

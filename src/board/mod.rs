//! Peer message board
//!
//! Public/private feed with likes and comments over the row-log store.
//! Likes re-fetch the table and locate the row by id before every
//! increment; a row that vanished in between is a silent no-op.

use crate::store::{tables, RowStore, StoreError};
use chrono::Local;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Column order of the `messages` table:
/// type, sender, receiver, message, time, likes, id.
const LIKES_COLUMN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    Public,
    Private,
}

impl ChatMode {
    /// Rows with a blank or unknown type cell count as public.
    fn from_cell(cell: &str) -> Self {
        if cell.trim().eq_ignore_ascii_case("private") {
            ChatMode::Private
        } else {
            ChatMode::Public
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Public => write!(f, "Public"),
            ChatMode::Private => write!(f, "Private"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub mode: ChatMode,
    pub sender: String,
    /// Addressee of a private message; empty for public posts.
    pub receiver: String,
    pub message: String,
    pub time: String,
    pub likes: u32,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub msg_id: u64,
    pub commenter: String,
    pub comment: String,
    pub time: String,
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("enter both a name and a message")]
    MissingFields,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MessageBoard {
    store: Arc<dyn RowStore>,
}

impl MessageBoard {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Post a message. Ids are dense: row count + 1. `receiver` only means
    /// something for private messages and may be empty even then.
    pub async fn post(
        &self,
        sender: &str,
        text: &str,
        mode: ChatMode,
        receiver: Option<&str>,
    ) -> Result<(), BoardError> {
        let sender = sender.trim();
        let text = text.trim();
        if sender.is_empty() || text.is_empty() {
            return Err(BoardError::MissingFields);
        }

        let next_id = self.store.rows(tables::MESSAGES).await?.len() + 1;
        let time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.store
            .append(
                tables::MESSAGES,
                vec![
                    mode.to_string(),
                    sender.to_string(),
                    receiver.unwrap_or_default().trim().to_string(),
                    text.to_string(),
                    time,
                    "0".to_string(),
                    next_id.to_string(),
                ],
            )
            .await?;
        tracing::debug!("[MessageBoard] '{}' posted message {}", sender, next_id);
        Ok(())
    }

    /// The feed for one mode, newest first.
    pub async fn feed(&self, mode: ChatMode) -> Result<Vec<Post>, StoreError> {
        let rows = self.store.rows(tables::MESSAGES).await?;
        let mut posts: Vec<Post> = rows
            .iter()
            .map(|r| parse_post(r))
            .filter(|p| p.mode == mode)
            .collect();
        posts.reverse();
        Ok(posts)
    }

    /// Private messages addressed to one user, newest first.
    pub async fn inbox(&self, receiver: &str) -> Result<Vec<Post>, StoreError> {
        let posts = self.feed(ChatMode::Private).await?;
        Ok(posts
            .into_iter()
            .filter(|p| p.receiver.eq_ignore_ascii_case(receiver.trim()))
            .collect())
    }

    /// Increment the likes cell of one message. Returns false when the id
    /// is no longer present after the re-fetch.
    pub async fn like(&self, msg_id: u64) -> Result<bool, StoreError> {
        let rows = self.store.rows(tables::MESSAGES).await?;
        for (index, row) in rows.iter().enumerate() {
            let post = parse_post(row);
            if post.id == msg_id {
                self.store
                    .update_cell(
                        tables::MESSAGES,
                        index + 1,
                        LIKES_COLUMN,
                        &(post.likes + 1).to_string(),
                    )
                    .await?;
                tracing::debug!("[MessageBoard] Message {} liked", msg_id);
                return Ok(true);
            }
        }
        tracing::debug!("[MessageBoard] Like target {} is gone", msg_id);
        Ok(false)
    }

    pub async fn add_comment(
        &self,
        msg_id: u64,
        commenter: &str,
        text: &str,
    ) -> Result<(), BoardError> {
        let commenter = commenter.trim();
        let text = text.trim();
        if commenter.is_empty() || text.is_empty() {
            return Err(BoardError::MissingFields);
        }

        let time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.store
            .append(
                tables::COMMENTS,
                vec![
                    msg_id.to_string(),
                    commenter.to_string(),
                    text.to_string(),
                    time,
                ],
            )
            .await?;
        Ok(())
    }

    /// Comments attached to one message; empty on any store failure.
    pub async fn comments_for(&self, msg_id: u64) -> Vec<Comment> {
        match self.store.rows(tables::COMMENTS).await {
            Ok(rows) => rows
                .iter()
                .map(|r| parse_comment(r))
                .filter(|c| c.msg_id == msg_id)
                .collect(),
            Err(e) => {
                tracing::warn!("[MessageBoard] Could not load comments: {}", e);
                Vec::new()
            }
        }
    }

    /// Feed plus attached comments, both tables fetched concurrently.
    pub async fn feed_with_comments(
        &self,
        mode: ChatMode,
    ) -> Result<Vec<(Post, Vec<Comment>)>, StoreError> {
        let (message_rows, comment_rows) = futures::try_join!(
            self.store.rows(tables::MESSAGES),
            self.store.rows(tables::COMMENTS)
        )?;

        let comments: Vec<Comment> = comment_rows.iter().map(|r| parse_comment(r)).collect();
        let mut feed: Vec<(Post, Vec<Comment>)> = message_rows
            .iter()
            .map(|r| parse_post(r))
            .filter(|p| p.mode == mode)
            .map(|post| {
                let attached = comments
                    .iter()
                    .filter(|c| c.msg_id == post.id)
                    .cloned()
                    .collect();
                (post, attached)
            })
            .collect();
        feed.reverse();
        Ok(feed)
    }
}

fn parse_post(row: &[String]) -> Post {
    let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
    Post {
        mode: ChatMode::from_cell(&cell(0)),
        sender: cell(1),
        receiver: cell(2),
        message: cell(3),
        time: cell(4),
        likes: cell(5).trim().parse().unwrap_or(0),
        id: cell(6).trim().parse().unwrap_or(0),
    }
}

fn parse_comment(row: &[String]) -> Comment {
    let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
    Comment {
        msg_id: cell(0).trim().parse().unwrap_or(0),
        commenter: cell(1),
        comment: cell(2),
        time: cell(3),
    }
}

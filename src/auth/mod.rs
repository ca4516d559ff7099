//! User directory
//!
//! Information Hiding:
//! - Password digests computed and compared internally
//! - Row layout of the users table hidden from callers
//! - Lookup failures degrade to "not found" rather than raising

use crate::store::{tables, Row, RowStore, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

pub mod reset;
pub mod token;

pub use reset::{LogMailer, Mailer, PasswordReset, ResetError, ResetStage};
pub use token::TokenCache;

/// Column order of the `users` table:
/// username, password, name, email, phone, address, dob.
pub(crate) const COL_PASSWORD: usize = 2; // 1-based, for cell updates

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?\d{1,3}?\d{10}$").expect("phone pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// SHA-256 hex digest, never the clear secret.
    pub password: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub dob: String,
}

impl UserRecord {
    pub(crate) fn to_row(&self) -> Row {
        vec![
            self.username.clone(),
            self.password.clone(),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.address.clone(),
            self.dob.clone(),
        ]
    }

    pub(crate) fn from_row(row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        Self {
            username: cell(0),
            password: cell(1),
            name: cell(2),
            email: cell(3),
            phone: cell(4),
            address: cell(5),
            dob: cell(6),
        }
    }
}

pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(&'static str),
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid phone number")]
    InvalidPhone,
    #[error("username already exists")]
    UsernameTaken,
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn validate_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

pub fn validate_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone.trim())
}

/// A registration request before it becomes a stored record.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub dob: String,
}

impl Registration {
    fn validate(&self) -> Result<(), ValidationError> {
        let required: [(&'static str, &str); 6] = [
            ("username", &self.username),
            ("password", &self.password),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("date of birth", &self.dob),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyField(label));
            }
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if !validate_email(self.email.trim()) {
            return Err(ValidationError::InvalidEmail);
        }
        if !validate_phone(&self.phone) {
            return Err(ValidationError::InvalidPhone);
        }
        Ok(())
    }
}

/// User lookup and persistence over the `users` table.
pub struct Directory {
    store: Arc<dyn RowStore>,
}

impl Directory {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Every stored user; empty on any store failure.
    pub async fn all_users(&self) -> Vec<UserRecord> {
        match self.store.rows(tables::USERS).await {
            Ok(rows) => rows.iter().map(|r| UserRecord::from_row(r)).collect(),
            Err(e) => {
                tracing::warn!("[Directory] Could not load users: {}", e);
                Vec::new()
            }
        }
    }

    /// Check credentials against username or email, trimmed and
    /// case-insensitive. Unknown identifier or bad secret is `None`.
    pub async fn verify(&self, identifier: &str, secret: &str) -> Option<UserRecord> {
        let wanted = identifier.trim().to_lowercase();
        let hashed = hash_password(secret);

        self.all_users().await.into_iter().find(|u| {
            let by_name = u.username.trim().to_lowercase() == wanted;
            let by_email = u.email.trim().to_lowercase() == wanted;
            (by_name || by_email) && u.password == hashed
        })
    }

    pub async fn find_by_username(&self, username: &str) -> Option<UserRecord> {
        self.all_users()
            .await
            .into_iter()
            .find(|u| u.username == username)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let wanted = email.trim().to_lowercase();
        self.all_users()
            .await
            .into_iter()
            .find(|u| u.email.trim().to_lowercase() == wanted)
    }

    /// Update-in-place when the username exists, append otherwise. The row
    /// index is recomputed from a fresh fetch before every mutation.
    pub async fn upsert(&self, record: &UserRecord) -> Result<(), StoreError> {
        let rows = self.store.rows(tables::USERS).await?;
        let existing = rows
            .iter()
            .position(|r| r.first().map(String::as_str) == Some(record.username.as_str()));

        match existing {
            Some(index) => {
                for (column, value) in record.to_row().iter().enumerate() {
                    self.store
                        .update_cell(tables::USERS, index + 1, column + 1, value)
                        .await?;
                }
                tracing::debug!("[Directory] Updated user '{}'", record.username);
            }
            None => {
                self.store.append(tables::USERS, record.to_row()).await?;
                tracing::debug!("[Directory] Created user '{}'", record.username);
            }
        }
        Ok(())
    }

    /// Overwrite only the password cell of an existing user. Missing users
    /// are reported, not created.
    pub async fn set_password(&self, username: &str, hashed: &str) -> Result<bool, StoreError> {
        let rows = self.store.rows(tables::USERS).await?;
        let index = rows
            .iter()
            .position(|r| r.first().map(String::as_str) == Some(username));

        match index {
            Some(index) => {
                self.store
                    .update_cell(tables::USERS, index + 1, COL_PASSWORD, hashed)
                    .await?;
                tracing::debug!("[Directory] Password updated for '{}'", username);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Validate and store a new account. The secret is hashed before it
    /// ever reaches the store.
    pub async fn register(&self, registration: Registration) -> Result<UserRecord, RegisterError> {
        registration.validate()?;

        let username = registration.username.trim().to_string();
        let taken = self
            .all_users()
            .await
            .iter()
            .any(|u| u.username == username);
        if taken {
            return Err(ValidationError::UsernameTaken.into());
        }

        let record = UserRecord {
            username: username.clone(),
            password: hash_password(registration.password.trim()),
            name: username,
            email: registration.email.trim().to_string(),
            phone: registration.phone.trim().to_string(),
            address: registration.address.trim().to_string(),
            dob: registration.dob.trim().to_string(),
        };
        self.upsert(&record).await?;
        Ok(record)
    }
}

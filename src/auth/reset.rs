//! Password reset flow
//!
//! Three stages: collect the account email, check the mailed code, accept
//! the new password. Only the password cell is touched on success.

use super::{hash_password, Directory, UserRecord};
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

/// Outbound mail boundary. The platform only ever sends short verification
/// notes, so the seam stays minimal.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Mailer that only logs. Stands in where no mail transport is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::info!("[LogMailer] Would mail '{}' to {}", subject, to);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStage {
    Email,
    Code,
    NewPassword,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResetError {
    #[error("no account found with this email")]
    UnknownEmail,
    #[error("could not send the verification mail")]
    MailFailed,
    #[error("invalid verification code")]
    BadCode,
    #[error("fill both password fields")]
    MissingPassword,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("step taken out of order")]
    WrongStage,
    #[error("could not update the password")]
    UpdateFailed,
}

/// Stateful reset workflow for one user at a time.
pub struct PasswordReset<'a> {
    directory: &'a Directory,
    mailer: &'a dyn Mailer,
    stage: ResetStage,
    code: Option<String>,
    user: Option<UserRecord>,
}

impl<'a> PasswordReset<'a> {
    pub fn new(directory: &'a Directory, mailer: &'a dyn Mailer) -> Self {
        Self {
            directory,
            mailer,
            stage: ResetStage::Email,
            code: None,
            user: None,
        }
    }

    pub fn stage(&self) -> ResetStage {
        self.stage
    }

    /// Stage 1: look the email up and mail a six-digit code.
    pub async fn request_code(&mut self, email: &str) -> Result<(), ResetError> {
        if self.stage != ResetStage::Email {
            return Err(ResetError::WrongStage);
        }

        let user = self
            .directory
            .find_by_email(email)
            .await
            .ok_or(ResetError::UnknownEmail)?;

        let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();
        self.mailer
            .send(
                &user.email,
                "Password Reset Code",
                &format!("Your verification code is: {}", code),
            )
            .await
            .map_err(|e| {
                tracing::warn!("[PasswordReset] Mail send failed: {}", e);
                ResetError::MailFailed
            })?;

        self.code = Some(code);
        self.user = Some(user);
        self.stage = ResetStage::Code;
        Ok(())
    }

    /// Stage 2: compare the entered code with the mailed one.
    pub fn verify_code(&mut self, entered: &str) -> Result<(), ResetError> {
        if self.stage != ResetStage::Code {
            return Err(ResetError::WrongStage);
        }
        if self.code.as_deref() == Some(entered.trim()) {
            self.stage = ResetStage::NewPassword;
            Ok(())
        } else {
            Err(ResetError::BadCode)
        }
    }

    /// Stage 3: store the new password and fold the flow back to its start.
    pub async fn update_password(
        &mut self,
        password: &str,
        confirm: &str,
    ) -> Result<(), ResetError> {
        if self.stage != ResetStage::NewPassword {
            return Err(ResetError::WrongStage);
        }
        if password.is_empty() || confirm.is_empty() {
            return Err(ResetError::MissingPassword);
        }
        if password != confirm {
            return Err(ResetError::PasswordMismatch);
        }

        let username = self
            .user
            .as_ref()
            .map(|u| u.username.clone())
            .ok_or(ResetError::WrongStage)?;

        let updated = self
            .directory
            .set_password(&username, &hash_password(password))
            .await
            .map_err(|e| {
                tracing::warn!("[PasswordReset] Store update failed: {}", e);
                ResetError::UpdateFailed
            })?;
        if !updated {
            return Err(ResetError::UpdateFailed);
        }

        self.stage = ResetStage::Email;
        self.code = None;
        self.user = None;
        Ok(())
    }

    /// The code mailed in stage 1 (for tests and logged transports).
    #[cfg(test)]
    pub(crate) fn issued_code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Registration;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn directory_with_user() -> Directory {
        let directory = Directory::new(Arc::new(MemoryStore::new()));
        directory
            .register(Registration {
                username: "ravi".to_string(),
                password: "secret12".to_string(),
                confirm_password: "secret12".to_string(),
                email: "ravi@example.com".to_string(),
                phone: "+919876543210".to_string(),
                address: "Madurai".to_string(),
                dob: "1990-01-01".to_string(),
            })
            .await
            .unwrap();
        directory
    }

    #[tokio::test]
    async fn full_reset_flow_changes_the_password() {
        let directory = directory_with_user().await;
        let mailer = LogMailer;
        let mut reset = PasswordReset::new(&directory, &mailer);

        reset.request_code("ravi@example.com").await.unwrap();
        let code = reset.issued_code().unwrap().to_string();
        reset.verify_code(&code).unwrap();
        reset.update_password("newpass99", "newpass99").await.unwrap();

        assert!(directory.verify("ravi", "newpass99").await.is_some());
        assert!(directory.verify("ravi", "secret12").await.is_none());
        assert_eq!(reset.stage(), ResetStage::Email);
    }

    #[tokio::test]
    async fn unknown_email_is_rejected() {
        let directory = directory_with_user().await;
        let mailer = LogMailer;
        let mut reset = PasswordReset::new(&directory, &mailer);

        let err = reset.request_code("nobody@example.com").await.unwrap_err();
        assert_eq!(err, ResetError::UnknownEmail);
    }

    #[tokio::test]
    async fn wrong_code_keeps_the_stage() {
        let directory = directory_with_user().await;
        let mailer = LogMailer;
        let mut reset = PasswordReset::new(&directory, &mailer);

        reset.request_code("ravi@example.com").await.unwrap();
        assert_eq!(reset.verify_code("000000").unwrap_err(), ResetError::BadCode);
        assert_eq!(reset.stage(), ResetStage::Code);
    }

    #[tokio::test]
    async fn mismatched_passwords_are_rejected() {
        let directory = directory_with_user().await;
        let mailer = LogMailer;
        let mut reset = PasswordReset::new(&directory, &mailer);

        reset.request_code("ravi@example.com").await.unwrap();
        let code = reset.issued_code().unwrap().to_string();
        reset.verify_code(&code).unwrap();

        let err = reset.update_password("one", "two").await.unwrap_err();
        assert_eq!(err, ResetError::PasswordMismatch);
    }
}

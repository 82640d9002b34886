use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use ride_tracker_lib::user::UserAccount;

use crate::{database::db::TripDatabase, DataManagerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidEmail,
    EmailTaken,
    InvalidCredentials,
    Database(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidEmail => write!(f, "invalid email address"),
            AuthError::EmailTaken => write!(f, "email is already registered"),
            AuthError::InvalidCredentials => write!(f, "wrong email or password"),
            AuthError::Database(msg) => write!(f, "auth storage error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
}

/// Account and session management backed by the trip database. Session
/// changes are published on a broadcast channel; a signed-in session is
/// persisted so it survives restarts.
#[derive(Clone)]
pub struct AuthManager {
    database: TripDatabase,
    current: Arc<Mutex<Option<AuthSession>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthManager {
    pub fn new(database: TripDatabase) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            database,
            current: Arc::new(Mutex::new(None)),
            events,
        }
    }

    /// Reloads the most recently persisted session, if any.
    pub async fn restore(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some((token, user_id)) = self.database.latest_auth_session().await.map_err(db_err)?
        else {
            return Ok(None);
        };
        let Some(account) = self.database.get_user(user_id).await.map_err(db_err)? else {
            return Ok(None);
        };

        let session = AuthSession {
            user_id: account.user_id,
            email: account.email,
            display_name: account.display_name,
            token,
        };
        *self.current.lock().await = Some(session.clone());
        Ok(Some(session))
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<(), AuthError> {
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if self
            .database
            .get_user_credentials(email)
            .await
            .map_err(db_err)?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let salt: [u8; 16] = rand::random();
        let salt = hex::encode(salt);
        let account = UserAccount {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            join_date: Utc::now(),
        };

        self.database
            .insert_user(&account, &digest_password(&salt, password), &salt)
            .await
            .map_err(db_err)?;
        tracing::info!("registered user {}", account.email);
        Ok(())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let Some(credentials) = self
            .database
            .get_user_credentials(email)
            .await
            .map_err(db_err)?
        else {
            return Err(AuthError::InvalidCredentials);
        };
        if digest_password(&credentials.password_salt, password) != credentials.password_hash {
            return Err(AuthError::InvalidCredentials);
        }

        let token: [u8; 32] = rand::random();
        let token = hex::encode(token);
        self.database
            .insert_auth_session(&token, credentials.account.user_id, Utc::now())
            .await
            .map_err(db_err)?;

        let session = AuthSession {
            user_id: credentials.account.user_id,
            email: credentials.account.email,
            display_name: credentials.account.display_name,
            token,
        };
        *self.current.lock().await = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Signing out without a session is a no-op.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.current.lock().await.take() {
            self.database
                .delete_auth_session(&session.token)
                .await
                .map_err(db_err)?;
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    pub async fn current_session(&self) -> Option<AuthSession> {
        self.current.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

fn db_err(err: DataManagerError) -> AuthError {
    AuthError::Database(format!("{err}"))
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, watch};
use tracing::{error, info};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Stable id of an identity; keys its record in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: UserId,
    pub email: String,
}

/// Errors surfaced verbatim to the sign-up and sign-in forms.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    AccountExists,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password should be at least {min} characters", min = MIN_PASSWORD_LEN)]
    WeakPassword,

    #[error("Network error: {0}")]
    Network(String),
}

/// Authentication collaborator.
///
/// `on_state_change` hands out a receiver holding the current identity (or
/// `None`); every sign-in and sign-out replaces that value.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the account and signs it in.
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn on_state_change(&self) -> watch::Receiver<Option<Identity>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    uid: UserId,
    password_hash: String,
}

/// Email/password accounts kept in a JSON file next to the records.
pub struct LocalIdentityProvider {
    path: PathBuf,
    accounts: Mutex<BTreeMap<String, Account>>,
    state: watch::Sender<Option<Identity>>,
}

impl LocalIdentityProvider {
    pub async fn open(path: PathBuf) -> Self {
        let accounts = load_accounts(&path).await;
        let (state, _) = watch::channel(None);
        Self {
            path,
            accounts: Mutex::new(accounts),
            state,
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&email) {
            return Err(AuthError::AccountExists);
        }

        let password_hash = hash_password(password.to_owned()).await?;

        let account = Account {
            uid: UserId::generate(),
            password_hash,
        };
        let mut next = accounts.clone();
        next.insert(email.clone(), account.clone());
        persist_accounts(&self.path, &next).await?;
        *accounts = next;

        let identity = Identity {
            uid: account.uid,
            email,
        };
        info!(uid = %identity.uid, "account created");
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = {
            let accounts = self.accounts.lock().await;
            accounts.get(&email).cloned().ok_or(AuthError::InvalidCredentials)?
        };

        verify_password(password.to_owned(), account.password_hash).await?;

        let identity = Identity {
            uid: account.uid,
            email,
        };
        info!(uid = %identity.uid, "signed in");
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(identity) = self.state.send_replace(None) {
            info!(uid = %identity.uid, "signed out");
        }
        Ok(())
    }

    fn on_state_change(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}

/// Runs on the blocking pool; an argon2 hash takes tens of milliseconds.
async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AuthError::Network(err.to_string()))
    })
    .await
    .map_err(|err| AuthError::Network(err.to_string()))?
}

async fn verify_password(password: String, password_hash: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || -> Result<(), AuthError> {
        let parsed = PasswordHash::new(&password_hash).map_err(|err| {
            error!("stored password hash is unreadable: {err}");
            AuthError::InvalidCredentials
        })?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)
    })
    .await
    .map_err(|err| AuthError::Network(err.to_string()))?
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') =>
        {
            Ok(email)
        }
        _ => Err(AuthError::InvalidEmail),
    }
}

async fn load_accounts(path: &Path) -> BTreeMap<String, Account> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(accounts) => accounts,
            Err(err) => {
                error!("failed to parse accounts file: {err}");
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            error!("failed to read accounts file: {err}");
            BTreeMap::new()
        }
    }
}

async fn persist_accounts(path: &Path, accounts: &BTreeMap<String, Account>) -> Result<(), AuthError> {
    let payload = serde_json::to_vec_pretty(accounts).map_err(|err| AuthError::Network(err.to_string()))?;
    fs::write(path, payload)
        .await
        .map_err(|err| AuthError::Network(err.to_string()))
}

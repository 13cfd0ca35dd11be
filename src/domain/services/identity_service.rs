//! Identity Service
//!
//! Registration, login and token authentication. Every failure of a
//! credential or token check surfaces as the same `Unauthorized` error.

use std::sync::Arc;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

use crate::domain::entities::user::Identity;
use crate::domain::errors::LedgerError;
use crate::domain::repositories::ledger_store::{CreateUserOutcome, UserStore};
use crate::domain::services::token_service::TokenService;

pub struct IdentityService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    hash_cost: u32,
}

impl IdentityService {
    /// # Arguments
    /// * `users` - User persistence
    /// * `tokens` - Token signer/verifier holding the server secret
    /// * `hash_cost` - bcrypt work factor
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService, hash_cost: u32) -> Self {
        Self {
            users,
            tokens,
            hash_cost,
        }
    }

    /// Create a user and return a bearer token for it
    pub async fn register(&self, login: &str, password: &str) -> Result<String, LedgerError> {
        check_credentials(login, password)?;

        let password_hash = self.hash_password(password).await?;

        match self.users.create_user(login, &password_hash).await? {
            CreateUserOutcome::Created(user) => {
                info!("Registered user '{}' (id {})", user.login, user.id);
                self.tokens.issue(&user.login)
            }
            CreateUserOutcome::LoginTaken => {
                debug!("Registration refused, login '{}' is taken", login);
                Err(LedgerError::LoginBusy(login.to_string()))
            }
        }
    }

    /// Check credentials and return a fresh bearer token
    pub async fn login(&self, login: &str, password: &str) -> Result<String, LedgerError> {
        check_credentials(login, password)?;

        let user = match self.users.find_user_by_login(login).await? {
            Some(user) => user,
            None => {
                debug!("Login failed for '{}': unknown login", login);
                return Err(LedgerError::Unauthorized);
            }
        };

        if !self.verify_password(password, &user.password_hash).await? {
            debug!("Login failed for '{}': password mismatch", login);
            return Err(LedgerError::Unauthorized);
        }

        self.tokens.issue(&user.login)
    }

    /// Resolve a bearer token to a live user
    pub async fn authenticate(&self, token: &str) -> Result<Identity, LedgerError> {
        let login = self.tokens.verify(token)?;

        match self.users.find_user_by_login(&login).await? {
            Some(user) => Ok(Identity::from(&user)),
            None => {
                debug!("Token for '{}' no longer maps to a user", login);
                Err(LedgerError::Unauthorized)
            }
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, LedgerError> {
        let password = Zeroizing::new(password.to_string());
        let cost = self.hash_cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password.as_bytes(), cost))
            .await
            .map_err(|e| {
                error!("Password hashing task failed: {}", e);
                LedgerError::Internal
            })?
            .map_err(|e| {
                error!("Password hashing failed: {}", e);
                LedgerError::Internal
            })
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, LedgerError> {
        let password = Zeroizing::new(password.to_string());
        let hash = hash.to_string();

        let verdict = tokio::task::spawn_blocking(move || bcrypt::verify(password.as_bytes(), &hash))
            .await
            .map_err(|e| {
                error!("Password verification task failed: {}", e);
                LedgerError::Internal
            })?;

        match verdict {
            Ok(matches) => Ok(matches),
            Err(e) => {
                // unreadable stored hash; treat as a mismatch
                error!("Stored password hash could not be checked: {}", e);
                Ok(false)
            }
        }
    }
}

fn check_credentials(login: &str, password: &str) -> Result<(), LedgerError> {
    if login.is_empty() {
        return Err(LedgerError::LoginEmpty);
    }
    if password.is_empty() {
        return Err(LedgerError::PasswordEmpty);
    }
    Ok(())
}

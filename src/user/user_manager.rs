use super::auth::{AuthToken, AuthTokenValue, PasswordCredentials};
use super::user_store::UserStore;
use anyhow::{bail, Result};
use std::time::SystemTime;
use tracing::{info, warn};

const MAX_HANDLE_LENGTH: usize = 64;
const MIN_PASSWORD_LENGTH: usize = 8;

pub struct UserManager {
    user_store: Box<dyn UserStore>,
}

impl UserManager {
    pub fn new(user_store: Box<dyn UserStore>) -> Self {
        Self { user_store }
    }

    /// Creates a user with password credentials, returning its id.
    pub fn register(&self, user_handle: &str, password: &str) -> Result<usize> {
        let user_handle = user_handle.trim();
        if user_handle.is_empty() {
            bail!("The user handle cannot be empty.");
        }
        if user_handle.len() > MAX_HANDLE_LENGTH {
            bail!("The user handle cannot be longer than {} bytes.", MAX_HANDLE_LENGTH);
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            bail!("The password must be at least {} bytes.", MIN_PASSWORD_LENGTH);
        }
        if self.user_store.get_user_id(user_handle)?.is_some() {
            bail!("User handle already exists.");
        }

        let user_id = self.user_store.create_user(user_handle)?;
        self.user_store
            .set_password_credentials(&PasswordCredentials::create(user_id, password)?)?;
        info!("Registered user {} with id {}", user_handle, user_id);
        Ok(user_id)
    }

    /// Verifies a password and issues a new token, `None` on bad credentials.
    pub fn login(&self, user_handle: &str, password: &str) -> Result<Option<AuthToken>> {
        let credentials = match self.user_store.get_password_credentials(user_handle)? {
            Some(credentials) => credentials,
            None => return Ok(None),
        };
        if !credentials.verify(password) {
            warn!("Wrong password for user {}", user_handle);
            return Ok(None);
        }

        let token = AuthToken {
            user_id: credentials.user_id,
            created: SystemTime::now(),
            last_used: None,
            value: AuthTokenValue::generate(),
        };
        self.user_store.add_auth_token(&token)?;
        Ok(Some(token))
    }

    /// Resolves a token to its owner, recording its use.
    pub fn authenticate(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let token = self.user_store.get_auth_token(value)?;
        if token.is_some() {
            self.user_store.touch_auth_token(value)?;
        }
        Ok(token)
    }

    pub fn logout(&self, user_id: usize, value: &AuthTokenValue) -> Result<()> {
        match self.user_store.get_auth_token(value)? {
            Some(token) if token.user_id == user_id => {
                self.user_store.delete_auth_token(value)?;
                Ok(())
            }
            Some(_) => bail!("Token does not belong to user {}", user_id),
            None => bail!("Unknown token"),
        }
    }

    pub fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        self.user_store.get_user_handle(user_id)
    }
}

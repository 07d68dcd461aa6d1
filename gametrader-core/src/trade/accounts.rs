use crate::entities::user::{UserChanges, UserInsert, UserRecord};
use crate::events::{PublishError, Publisher, UserEvent};
use crate::store::{Datastore, StoreError};
use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user not found: {0}")]
    NotFound(i64),

    #[error("password hash error: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The change is committed but its event never reached the log.
    #[error("account change committed but event not published: {0}")]
    Publish(#[from] PublishError),
}

/// Signup data with the plaintext password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub address: String,
    pub password: String,
}

/// Field-level user changes with an optional plaintext password.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
}

pub fn hash_password(plaintext: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hash(e.to_string()))
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_blocking(plaintext: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext))
        .await
        .map_err(|e| AccountError::Hash(e.to_string()))?
}

/// User signup and profile updates.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Datastore>,
    publisher: Publisher,
}

impl AccountService {
    pub fn new(store: Arc<dyn Datastore>, publisher: Publisher) -> Self {
        Self { store, publisher }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<UserRecord, AccountError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AccountError::NotFound(user_id))
    }

    pub async fn create_user(&self, user: NewUser) -> Result<UserRecord, AccountError> {
        let password_hash = hash_password_blocking(user.password).await?;
        let record = self
            .store
            .insert_user(UserInsert {
                email: user.email,
                name: user.name,
                address: user.address,
                password_hash,
            })
            .await?;
        info!(user_id = record.user_id, "User created");

        self.announce(record.user_id, UserEvent::Created).await?;
        Ok(record)
    }

    /// Apply changes. Only a password change is announced.
    pub async fn update_user(
        &self,
        user_id: i64,
        update: UserUpdate,
    ) -> Result<UserRecord, AccountError> {
        let password_changed = update.password.is_some();
        let password_hash = match update.password {
            Some(password) => Some(hash_password_blocking(password).await?),
            None => None,
        };
        let record = self
            .store
            .update_user(
                user_id,
                UserChanges {
                    name: update.name,
                    address: update.address,
                    password_hash,
                },
            )
            .await?
            .ok_or(AccountError::NotFound(user_id))?;
        info!(user_id, password_changed, "User updated");

        if password_changed {
            self.announce(user_id, UserEvent::Updated).await?;
        }
        Ok(record)
    }

    async fn announce(&self, user_id: i64, event: UserEvent) -> Result<(), AccountError> {
        if let Err(e) = self.publisher.user(event, user_id).await {
            error!(
                user_id,
                event = event.key(),
                error = %e,
                "Account change committed without its event"
            );
            return Err(e.into());
        }
        Ok(())
    }
}

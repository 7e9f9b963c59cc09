// src/backend.rs
use async_trait::async_trait;

use crate::auth_store::AuthStore;
use crate::error::ChatError;
use crate::models::auth::{AuthResponse, NewUser, User};
use crate::models::chat::{MessageRecord, NewMessage};
use crate::realtime::Subscription;

/// Everything the client needs from the record-storage service.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Auth state owned by this backend; successful password auth saves into it.
    fn auth_store(&self) -> &AuthStore;

    /// Every message in the conversation, oldest first, authors expanded.
    async fn list_messages(&self) -> Result<Vec<MessageRecord>, ChatError>;

    async fn create_message(&self, message: &NewMessage) -> Result<MessageRecord, ChatError>;

    /// Opens a realtime subscription to the messages collection.
    async fn subscribe_messages(&self) -> Result<Subscription, ChatError>;

    async fn auth_with_password(&self, identity: &str, password: &str) -> Result<AuthResponse, ChatError>;

    async fn create_user(&self, user: &NewUser) -> Result<User, ChatError>;
}

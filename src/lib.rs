// lib.rs - Real-time campus chat client: session state, message view model and service client
pub mod auth_store;
pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod forms;
pub mod message_list;
pub mod models;
pub mod pocketbase_client;
pub mod realtime;
pub mod router;
pub mod session;
pub mod ui;

// Re-export commonly used types for convenience
pub use auth_store::AuthStore;
pub use backend::ChatBackend;
pub use config::ChatConfig;
pub use conversation::{Conversation, ConversationUpdate};
pub use error::ChatError;
pub use message_list::MessageList;
pub use models::chat::{Delivery, Message};
pub use pocketbase_client::PocketBaseClient;
pub use router::{Route, Router};
pub use session::{Session, SessionStore};

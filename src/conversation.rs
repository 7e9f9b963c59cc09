// src/conversation.rs
//! Message view model for one conversation: the visible list, the composer
//! input and the realtime subscription that feeds it.
//!
//! All state changes happen on the task that owns the `Conversation`.
//! Durable writes run as spawned tasks and report back through a channel that
//! `next_update` drains alongside the subscription.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::ChatBackend;
use crate::error::ChatError;
use crate::message_list::MessageList;
use crate::models::chat::{Message, MessageRecord, NewMessage, RecordAction, RecordEvent};
use crate::realtime::Subscription;
use crate::session::Session;

/// What changed after one call to `Conversation::next_update`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationUpdate {
    /// A remote message was appended
    Appended(Message),
    /// A provisional entry was replaced by (or merged into) its stored record
    Confirmed { provisional_id: String, message: Message },
    /// A durable write failed; the provisional entry stays, marked failed
    Failed { provisional_id: String },
    /// An event arrived but left the list unchanged
    Ignored,
    /// The realtime subscription ended
    SubscriptionClosed,
}

#[derive(Debug)]
enum WriteOutcome {
    Stored { provisional_id: String, record: MessageRecord },
    Failed { provisional_id: String },
}

pub struct Conversation<B: ChatBackend> {
    backend: Arc<B>,
    user_id: String,
    display_name: Option<String>,
    messages: MessageList,
    composer: String,
    subscription: Option<Subscription>,
    outcomes_tx: mpsc::UnboundedSender<WriteOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<WriteOutcome>,
}

impl<B: ChatBackend> Conversation<B> {
    pub fn new(backend: Arc<B>, user_id: impl Into<String>, display_name: Option<String>) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            user_id: user_id.into(),
            display_name,
            messages: MessageList::new(),
            composer: String::new(),
            subscription: None,
            outcomes_tx,
            outcomes_rx,
        }
    }

    /// `None` unless the session is valid and carries a user id.
    pub fn for_session(backend: Arc<B>, session: &Session) -> Option<Self> {
        if !session.is_valid {
            return None;
        }
        let user_id = session.user_id.clone()?;
        Some(Self::new(backend, user_id, session.display_name.clone()))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn messages(&self) -> &[Message] {
        self.messages.as_slice()
    }

    pub fn composer(&self) -> &str {
        &self.composer
    }

    pub fn set_composer(&mut self, text: impl Into<String>) {
        self.composer = text.into();
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Opens the subscription, then loads the existing messages. The
    /// subscription goes first so nothing created during the fetch is missed;
    /// overlap between the two is removed by id. Failures are logged and leave
    /// the view usable.
    pub async fn mount(&mut self) {
        match self.backend.subscribe_messages().await {
            Ok(subscription) => self.subscription = Some(subscription.only(RecordAction::Create)),
            Err(e) => tracing::error!("Failed to subscribe to messages: {}", e),
        }

        if let Err(e) = self.load().await {
            tracing::error!("Failed to load messages: {}", e);
        }
    }

    /// Bulk fetch; replaces the visible list wholesale.
    pub async fn load(&mut self) -> Result<usize, ChatError> {
        let records = self.backend.list_messages().await?;
        self.messages
            .replace_all(records.into_iter().map(Message::from).collect());
        tracing::debug!("Loaded {} messages", self.messages.len());
        Ok(self.messages.len())
    }

    /// Sends the composer contents. Whitespace-only input is ignored. Otherwise
    /// the provisional entry is appended and the composer cleared before the
    /// durable write is issued.
    pub fn send(&mut self) -> Option<Message> {
        let text = self.composer.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.to_string();

        let provisional = Message::provisional(&self.user_id, self.display_name.clone(), text.clone());
        self.messages.push_provisional(provisional.clone());
        self.composer.clear();

        let backend = Arc::clone(&self.backend);
        let outcomes = self.outcomes_tx.clone();
        let provisional_id = provisional.id.clone();
        let draft = NewMessage {
            text,
            user: self.user_id.clone(),
        };

        tokio::spawn(async move {
            let outcome = match backend.create_message(&draft).await {
                Ok(record) => WriteOutcome::Stored {
                    provisional_id,
                    record,
                },
                Err(e) => {
                    tracing::error!("Failed to send message: {}", e);
                    WriteOutcome::Failed { provisional_id }
                }
            };
            // Receiver is gone once the view is torn down
            let _ = outcomes.send(outcome);
        });

        Some(provisional)
    }

    /// Applies a realtime event to the list.
    pub fn receive(&mut self, event: RecordEvent) -> ConversationUpdate {
        if event.action != RecordAction::Create {
            return ConversationUpdate::Ignored;
        }
        let message = Message::from(event.record);
        if self.messages.apply_remote(message.clone(), &self.user_id) {
            ConversationUpdate::Appended(message)
        } else {
            ConversationUpdate::Ignored
        }
    }

    fn settle(&mut self, outcome: WriteOutcome) -> ConversationUpdate {
        match outcome {
            WriteOutcome::Stored {
                provisional_id,
                record,
            } => {
                let message = Message::from(record);
                if self.messages.confirm(&provisional_id, message.clone()) {
                    ConversationUpdate::Confirmed {
                        provisional_id,
                        message,
                    }
                } else {
                    ConversationUpdate::Ignored
                }
            }
            WriteOutcome::Failed { provisional_id } => {
                if self.messages.mark_failed(&provisional_id) {
                    ConversationUpdate::Failed { provisional_id }
                } else {
                    ConversationUpdate::Ignored
                }
            }
        }
    }

    /// Waits for the next realtime event or write completion and applies it.
    /// Cancel safe, so it can sit in a `select!` next to user input.
    pub async fn next_update(&mut self) -> ConversationUpdate {
        tokio::select! {
            Some(outcome) = self.outcomes_rx.recv() => self.settle(outcome),
            event = next_event(&mut self.subscription) => match event {
                Some(event) => self.receive(event),
                None => {
                    tracing::warn!("Realtime subscription ended");
                    self.subscription = None;
                    ConversationUpdate::SubscriptionClosed
                }
            },
        }
    }

    /// Closes the realtime subscription.
    pub fn unmount(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
            tracing::debug!("Conversation unmounted");
        }
    }
}

impl<B: ChatBackend> Drop for Conversation<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<RecordEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => futures::future::pending().await,
    }
}

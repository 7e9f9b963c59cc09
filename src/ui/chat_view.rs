// src/ui/chat_view.rs
use std::io;

use crate::backend::ChatBackend;
use crate::conversation::{Conversation, ConversationUpdate};
use crate::router::{Route, Router};
use crate::session::SessionStore;
use crate::ui::{format_message, Console};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatExit {
    Logout,
    Quit,
    /// Session became invalid underneath the view (expiry, external logout)
    SessionEnded,
}

const HELP: &str = "Type a message and press Enter. Commands: /reload, /logout, /quit";

/// Conversation view. Mounts the conversation, then serves user input,
/// realtime updates and session changes until one of them ends the view.
/// The subscription is torn down before returning.
pub async fn run<B: ChatBackend>(
    console: &mut Console,
    conversation: &mut Conversation<B>,
    router: &mut Router,
    sessions: &SessionStore<B>,
) -> io::Result<ChatExit> {
    conversation.mount().await;

    println!();
    println!("{}", HELP);
    for message in conversation.messages() {
        println!("{}", format_message(message, conversation.user_id()));
    }

    let exit = loop {
        tokio::select! {
            line = console.read_line() => {
                let Some(line) = line? else {
                    break ChatExit::Quit;
                };
                match line.trim() {
                    "/quit" => break ChatExit::Quit,
                    "/logout" => {
                        sessions.logout();
                        break ChatExit::Logout;
                    }
                    "/reload" => match conversation.load().await {
                        Ok(count) => println!("-- reloaded {} messages --", count),
                        Err(e) => tracing::error!("Failed to reload messages: {}", e),
                    },
                    "/help" => println!("{}", HELP),
                    _ => {
                        conversation.set_composer(line);
                        if let Some(message) = conversation.send() {
                            println!("{}", format_message(&message, conversation.user_id()));
                        }
                    }
                }
            }
            update = conversation.next_update() => match update {
                ConversationUpdate::Appended(message) => {
                    println!("{}", format_message(&message, conversation.user_id()));
                }
                ConversationUpdate::Failed { provisional_id } => {
                    let failed = conversation.messages().iter().find(|m| m.id == provisional_id);
                    if let Some(message) = failed {
                        println!("{}", format_message(message, conversation.user_id()));
                    }
                }
                ConversationUpdate::SubscriptionClosed => {
                    println!("-- live updates stopped; use /reload to refresh --");
                }
                ConversationUpdate::Confirmed { .. } | ConversationUpdate::Ignored => {}
            },
            route = router.next_route() => {
                if route != Some(Route::Chat) {
                    println!("-- your session has ended --");
                    break ChatExit::SessionEnded;
                }
            }
        }
    };

    conversation.unmount();
    Ok(exit)
}

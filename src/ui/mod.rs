// src/ui/mod.rs
//! Terminal presentation: renders the session and the message view model.

pub mod auth_view;
pub mod chat_view;
pub mod console;

use chrono::Local;

use crate::models::chat::{Delivery, Message};

pub use console::Console;

/// One rendered message line, e.g. `[09:15] sam: hi`.
pub fn format_message(message: &Message, local_user_id: &str) -> String {
    let author = if message.user_id == local_user_id {
        "you"
    } else {
        message.author_label()
    };
    let marker = match message.delivery {
        Delivery::Pending | Delivery::Sent => "",
        Delivery::Failed => "  [not delivered]",
    };
    format!(
        "[{}] {}: {}{}",
        message.created.with_timezone(&Local).format("%H:%M"),
        author,
        message.text,
        marker
    )
}

pub fn render_not_found(path: &str) {
    println!();
    println!("404: nothing lives at {}", path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(user_id: &str, delivery: Delivery) -> Message {
        Message {
            id: "m1".to_string(),
            text: "hi".to_string(),
            user_id: user_id.to_string(),
            created: Utc::now(),
            author_name: Some("sam".to_string()),
            delivery,
        }
    }

    #[test]
    fn test_format_message_labels() {
        let line = format_message(&message("u2", Delivery::Sent), "u1");
        assert!(line.ends_with("] sam: hi"), "{}", line);

        let line = format_message(&message("u1", Delivery::Failed), "u1");
        assert!(line.ends_with("] you: hi  [not delivered]"), "{}", line);
    }
}

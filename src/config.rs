// src/config.rs
use std::env;

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8090";
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Connection settings for the record-storage service.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub service_url: String,
    pub messages_collection: String,
    pub users_collection: String,
    /// Records requested per page when loading the full message list
    pub page_size: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            messages_collection: "messages".to_string(),
            users_collection: "users".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ChatConfig {
    /// Reads `CHAT_*` variables, falling back to defaults for anything unset.
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let service_url = env::var("CHAT_SERVICE_URL").unwrap_or(defaults.service_url);
        let page_size = match env::var("CHAT_PAGE_SIZE") {
            Ok(raw) => raw.parse::<u32>().ok().filter(|size| *size > 0).unwrap_or_else(|| {
                tracing::warn!("Ignoring invalid CHAT_PAGE_SIZE {:?}", raw);
                defaults.page_size
            }),
            Err(_) => defaults.page_size,
        };

        Self {
            service_url: service_url.trim_end_matches('/').to_string(),
            messages_collection: env::var("CHAT_MESSAGES_COLLECTION")
                .unwrap_or(defaults.messages_collection),
            users_collection: env::var("CHAT_USERS_COLLECTION").unwrap_or(defaults.users_collection),
            page_size,
        }
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_normalizes_url() {
        let config = ChatConfig::default()
            .with_service_url("https://chat.campus.edu/")
            .with_page_size(0);
        assert_eq!(config.service_url, "https://chat.campus.edu");
        assert_eq!(config.page_size, 1);
        assert_eq!(config.messages_collection, "messages");
    }
}

// src/pocketbase_client.rs
// HTTP client for the record-storage service (PocketBase-compatible REST + SSE API)

use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

use crate::auth_store::AuthStore;
use crate::backend::ChatBackend;
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::models::auth::{AuthResponse, NewUser, PasswordAuthRequest, ServiceErrorBody, User};
use crate::models::chat::{MessageRecord, NewMessage, RecordAction};
use crate::realtime::{RealtimeConnection, Subscription};

// Relation expanded on every message read so author names come back inline
const AUTHOR_EXPAND: &str = "user";

#[derive(Clone)]
pub struct PocketBaseClient {
    client: Client,
    base_url: String,
    messages_collection: String,
    users_collection: String,
    page_size: u32,
    auth: AuthStore,
}

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

#[derive(Deserialize, Debug)]
struct ListResponse<T> {
    page: u32,
    #[serde(rename = "totalPages", default)]
    total_pages: i64,
    items: Vec<T>,
}

// ============================================================================
// IMPLEMENTATION
// ============================================================================

impl PocketBaseClient {
    pub fn new(config: &ChatConfig) -> Self {
        Self::with_auth_store(config, AuthStore::new())
    }

    pub fn with_auth_store(config: &ChatConfig, auth: AuthStore) -> Self {
        Self {
            client: Client::new(),
            base_url: config.service_url.trim_end_matches('/').to_string(),
            messages_collection: config.messages_collection.clone(),
            users_collection: config.users_collection.clone(),
            page_size: config.page_size.max(1),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, collection)
    }

    /// Realtime topic for every record in the messages collection, with the
    /// author relation expanded.
    pub fn messages_topic(&self) -> String {
        let options = json!({ "query": { "expand": AUTHOR_EXPAND } }).to_string();
        format!(
            "{}/*?options={}",
            self.messages_collection,
            urlencoding::encode(&options)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.token() {
            Some(token) => request.header("Authorization", token),
            None => request,
        }
    }

    /// Turns a non-2xx response into `ChatError::Service`, keeping whatever
    /// structured error body the service sent.
    async fn check(response: Response) -> Result<Response, ChatError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ServiceErrorBody>(&error_text).unwrap_or_else(|_| {
            let message = if error_text.is_empty() {
                "Unknown error".to_string()
            } else {
                error_text.clone()
            };
            ServiceErrorBody::new(status, message)
        });
        Err(ChatError::service(status, body))
    }

    async fn fetch_page(&self, page: u32) -> Result<ListResponse<MessageRecord>, ChatError> {
        let page_param = page.to_string();
        let per_page_param = self.page_size.to_string();
        let request = self.client.get(self.records_url(&self.messages_collection)).query(&[
            ("page", page_param.as_str()),
            ("perPage", per_page_param.as_str()),
            ("sort", "created"),
            ("expand", AUTHOR_EXPAND),
        ]);

        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatBackend for PocketBaseClient {
    fn auth_store(&self) -> &AuthStore {
        &self.auth
    }

    async fn list_messages(&self) -> Result<Vec<MessageRecord>, ChatError> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page(page).await?;
            // The service may clamp `perPage`, so a short page is not the end
            if batch.items.is_empty() {
                break;
            }
            records.extend(batch.items);

            if i64::from(batch.page) >= batch.total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Fetched {} messages in {} page(s)", records.len(), page);
        Ok(records)
    }

    async fn create_message(&self, message: &NewMessage) -> Result<MessageRecord, ChatError> {
        if self.auth.token().is_none() {
            return Err(ChatError::Unauthenticated);
        }

        let request = self
            .client
            .post(self.records_url(&self.messages_collection))
            .query(&[("expand", AUTHOR_EXPAND)])
            .json(message);

        let response = Self::check(self.authorize(request).send().await?).await?;
        let record: MessageRecord = response.json().await?;
        tracing::debug!(message_id = %record.id, "Message stored");
        Ok(record)
    }

    async fn subscribe_messages(&self) -> Result<Subscription, ChatError> {
        let url = format!("{}/api/realtime", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let response = Self::check(response).await?;

        let stream = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(ChatError::from)
            .boxed();
        let connection = RealtimeConnection::handshake(stream).await?;

        let topic = self.messages_topic();
        let request = self.client.post(&url).json(&json!({
            "clientId": connection.client_id(),
            "subscriptions": [topic.clone()],
        }));
        Self::check(self.authorize(request).send().await?).await?;

        tracing::info!(client_id = %connection.client_id(), "Subscribed to {}", self.messages_collection);
        Ok(connection.into_subscription(topic).only(RecordAction::Create))
    }

    async fn auth_with_password(&self, identity: &str, password: &str) -> Result<AuthResponse, ChatError> {
        let url = format!(
            "{}/api/collections/{}/auth-with-password",
            self.base_url, self.users_collection
        );

        let response = self
            .client
            .post(&url)
            .json(&PasswordAuthRequest { identity, password })
            .send()
            .await?;
        let auth: AuthResponse = Self::check(response).await?.json().await?;

        self.auth.save(auth.token.clone(), auth.record.clone());
        tracing::info!(user_id = %auth.record.id, "Authenticated");
        Ok(auth)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, ChatError> {
        let response = self
            .client
            .post(self.records_url(&self.users_collection))
            .json(user)
            .send()
            .await?;
        let created: User = Self::check(response).await?.json().await?;
        tracing::info!(user_id = %created.id, "Account created");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_topic_encodes_options() {
        let client = PocketBaseClient::new(&ChatConfig::default());
        assert_eq!(
            client.messages_topic(),
            "messages/*?options=%7B%22query%22%3A%7B%22expand%22%3A%22user%22%7D%7D"
        );
    }

    #[test]
    fn test_records_url() {
        let config = ChatConfig::default().with_service_url("http://localhost:8090/");
        let client = PocketBaseClient::new(&config);
        assert_eq!(
            client.records_url("messages"),
            "http://localhost:8090/api/collections/messages/records"
        );
    }
}

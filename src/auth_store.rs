// src/auth_store.rs
//! In-memory holder for the service token and the authenticated user record.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::watch;

use crate::models::auth::User;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub token: Option<String>,
    pub record: Option<User>,
}

// Only the expiry is read; the signature belongs to the service.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: i64,
}

fn read_claims(token: &str, check_expiry: bool) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.validate_exp = check_expiry;
    validation.leeway = 0;

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation).map(|data| data.claims)
}

/// True when the token parses and its `exp` claim is not in the past.
pub fn token_is_valid(token: &str) -> bool {
    match read_claims(token, true) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("Auth token rejected: {}", e);
            false
        }
    }
}

pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let claims = read_claims(token, false).ok()?;
    Utc.timestamp_opt(claims.exp, 0).single()
}

/// Cloneable handle; every clone sees the same state and the same listeners.
#[derive(Clone)]
pub struct AuthStore {
    state: Arc<watch::Sender<AuthState>>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn save(&self, token: String, record: User) {
        tracing::debug!(user_id = %record.id, "Auth store updated");
        self.state.send_replace(AuthState {
            token: Some(token),
            record: Some(record),
        });
    }

    pub fn clear(&self) {
        tracing::debug!("Auth store cleared");
        self.state.send_replace(AuthState::default());
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn record(&self) -> Option<User> {
        self.state.borrow().record.clone()
    }

    pub fn is_valid(&self) -> bool {
        self.state
            .borrow()
            .token
            .as_deref()
            .map(token_is_valid)
            .unwrap_or(false)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().token.as_deref().and_then(token_expiry)
    }

    /// Change-notification hook: the receiver wakes on every `save` and `clear`.
    pub fn on_change(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

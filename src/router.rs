// src/router.rs
use tokio::sync::watch;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chat,
    Auth,
    NotFound,
}

pub const CHAT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";

/// Chat needs a valid session and falls back to the auth view; the auth
/// paths send an already-authenticated user to the chat.
pub fn resolve(path: &str, session: &Session) -> Route {
    let path = match path.trim_end_matches('/') {
        "" => CHAT_PATH,
        trimmed => trimmed,
    };

    match path {
        CHAT_PATH | LOGIN_PATH | SIGNUP_PATH if session.is_valid => Route::Chat,
        CHAT_PATH | LOGIN_PATH | SIGNUP_PATH => Route::Auth,
        _ => Route::NotFound,
    }
}

/// Selects the view for the current path and re-selects it when session
/// validity flips.
pub struct Router {
    path: String,
    sessions: watch::Receiver<Session>,
    // Validity behind the last route handed out
    last_valid: bool,
}

impl Router {
    pub fn new(path: impl Into<String>, sessions: watch::Receiver<Session>) -> Self {
        let last_valid = sessions.borrow().is_valid;
        Self {
            path: path.into(),
            sessions,
            last_valid,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn current(&mut self) -> Route {
        let session = self.sessions.borrow_and_update().clone();
        self.last_valid = session.is_valid;
        resolve(&self.path, &session)
    }

    pub fn navigate(&mut self, path: impl Into<String>) -> Route {
        self.path = path.into();
        tracing::debug!(path = %self.path, "Navigated");
        self.current()
    }

    /// Waits for the next session validity transition and returns the route
    /// it leads to. `None` once the session store is gone.
    pub async fn next_route(&mut self) -> Option<Route> {
        loop {
            if self.sessions.borrow_and_update().is_valid != self.last_valid {
                return Some(self.current());
            }
            self.sessions.changed().await.ok()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Session {
        Session {
            is_valid: true,
            user_id: Some("u1".to_string()),
            display_name: Some("jdoe".to_string()),
        }
    }

    #[test]
    fn test_resolve_table() {
        let invalid = Session::default();
        assert_eq!(resolve("/", &invalid), Route::Auth);
        assert_eq!(resolve("", &invalid), Route::Auth);
        assert_eq!(resolve("/login", &invalid), Route::Auth);
        assert_eq!(resolve("/signup/", &invalid), Route::Auth);
        assert_eq!(resolve("/", &valid()), Route::Chat);
        assert_eq!(resolve("/login", &valid()), Route::Chat);
        assert_eq!(resolve("/settings", &valid()), Route::NotFound);
        assert_eq!(resolve("/settings", &invalid), Route::NotFound);
    }

    #[tokio::test]
    async fn test_router_follows_login() {
        let (tx, rx) = watch::channel(Session::default());
        let mut router = Router::new("/", rx);
        assert_eq!(router.current(), Route::Auth);

        tx.send_replace(valid());
        assert_eq!(router.next_route().await, Some(Route::Chat));
    }

    #[tokio::test]
    async fn test_router_ignores_changes_without_validity_flip() {
        let (tx, rx) = watch::channel(valid());
        let mut router = Router::new("/", rx);

        let mut renamed = valid();
        renamed.display_name = Some("Jane".to_string());
        tx.send_replace(renamed);
        tx.send_replace(Session::default());

        assert_eq!(router.next_route().await, Some(Route::Auth));

        drop(tx);
        assert_eq!(router.next_route().await, None);
    }

    #[test]
    fn test_navigate_to_unknown_path() {
        let (_tx, rx) = watch::channel(valid());
        let mut router = Router::new("/", rx);
        assert_eq!(router.navigate("/nope"), Route::NotFound);
        assert_eq!(router.path(), "/nope");
    }
}

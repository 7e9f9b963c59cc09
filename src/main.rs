use std::sync::Arc;

use campus_chat::router::{CHAT_PATH, SIGNUP_PATH};
use campus_chat::ui::{self, auth_view, chat_view, Console};
use campus_chat::{ChatConfig, Conversation, PocketBaseClient, Route, Router, SessionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = ChatConfig::from_env();
    tracing::info!(
        "Service: {} (messages: {}, users: {})",
        config.service_url,
        config.messages_collection,
        config.users_collection
    );

    // Optional start path, e.g. `campus-chat /signup`
    let start_path = std::env::args().nth(1).unwrap_or_else(|| CHAT_PATH.to_string());

    let backend = Arc::new(PocketBaseClient::new(&config));
    let sessions = Arc::new(SessionStore::new(backend.clone()));

    // Mirror auth store changes (logout, token expiry) into the session
    let mirror = tokio::spawn({
        let sessions = Arc::clone(&sessions);
        async move { sessions.mirror().await }
    });

    let mut router = Router::new(start_path, sessions.subscribe());
    let mut console = Console::new();

    loop {
        match router.current() {
            Route::Auth => {
                let start_with_signup = router.path() == SIGNUP_PATH;
                match auth_view::run(&mut console, &sessions, start_with_signup).await? {
                    auth_view::AuthExit::Authenticated => continue,
                    auth_view::AuthExit::Quit => break,
                }
            }
            Route::Chat => {
                let session = sessions.current();
                let Some(mut conversation) = Conversation::for_session(backend.clone(), &session) else {
                    // Session went invalid since the route was picked
                    sessions.refresh();
                    continue;
                };

                match chat_view::run(&mut console, &mut conversation, &mut router, &sessions).await? {
                    chat_view::ChatExit::Logout | chat_view::ChatExit::SessionEnded => continue,
                    chat_view::ChatExit::Quit => break,
                }
            }
            Route::NotFound => {
                ui::render_not_found(router.path());
                match console.prompt("Press Enter to open the chat, or Ctrl-D to quit. ").await? {
                    Some(_) => {
                        router.navigate(CHAT_PATH);
                    }
                    None => break,
                }
            }
        }
    }

    mirror.abort();
    tracing::info!("👋 Campus chat closed");
    Ok(())
}

// Logs go to stderr so they stay out of the rendered conversation
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Get log level from environment or default to quiet output for an interactive client
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "warn,campus_chat=debug,reqwest=info,hyper=info".to_string()
        } else {
            "warn,campus_chat=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging (easier for log aggregation)
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("💬 Campus chat starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}

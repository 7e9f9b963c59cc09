// src/ui/console.rs
//! Line-oriented terminal input shared by every view.

use std::io::{self, BufRead, Write};

use tokio::task::JoinHandle;

type LineRead = JoinHandle<io::Result<Option<String>>>;

/// Reads stdin on the blocking pool. A read interrupted by `select!` is kept
/// and resumed by the next call, so no typed line is lost between views.
#[derive(Default)]
pub struct Console {
    pending: Option<LineRead>,
}

fn read_stdin_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string()))
}

fn join_error(e: tokio::task::JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next line without its line ending, or `None` at end of input.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let read = self
            .pending
            .get_or_insert_with(|| tokio::task::spawn_blocking(read_stdin_line));
        let line = read.await;
        self.pending = None;
        line.map_err(join_error)?
    }

    pub async fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        print!("{}", label);
        io::stdout().flush()?;
        self.read_line().await
    }

    /// Reads a password without echo.
    pub async fn prompt_password(&mut self, label: &str) -> io::Result<String> {
        // Finish any line read still in flight so it does not swallow the password
        if self.pending.is_some() {
            self.read_line().await?;
        }
        let label = label.to_string();
        tokio::task::spawn_blocking(move || rpassword::prompt_password(label))
            .await
            .map_err(join_error)?
    }
}

// src/ui/auth_view.rs
use std::io;

use crate::backend::ChatBackend;
use crate::forms::{LoginForm, SignupForm};
use crate::session::SessionStore;
use crate::ui::Console;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthExit {
    Authenticated,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Login,
    Signup,
}

/// Login / signup loop. Returns once the session is valid or input ends.
pub async fn run<B: ChatBackend>(
    console: &mut Console,
    sessions: &SessionStore<B>,
    start_with_signup: bool,
) -> io::Result<AuthExit> {
    println!();
    println!("Campus Chat: sign in to join the conversation");

    let mut mode = if start_with_signup { Some(Mode::Signup) } else { None };

    loop {
        let chosen = match mode.take() {
            Some(mode) => mode,
            None => match console.prompt("[l]ogin, [s]ign up or [q]uit: ").await? {
                None => return Ok(AuthExit::Quit),
                Some(choice) => match choice.trim().to_lowercase().as_str() {
                    "l" | "login" => Mode::Login,
                    "s" | "signup" | "sign up" => Mode::Signup,
                    "q" | "quit" => return Ok(AuthExit::Quit),
                    _ => continue,
                },
            },
        };

        let result = match chosen {
            Mode::Login => match read_login(console).await? {
                Some(form) => sessions.login(&form).await,
                None => return Ok(AuthExit::Quit),
            },
            Mode::Signup => match read_signup(console).await? {
                Some(form) => sessions.signup(&form).await,
                None => return Ok(AuthExit::Quit),
            },
        };

        match result {
            Ok(session) if session.is_valid => {
                println!(
                    "Signed in as {}",
                    session.display_name.as_deref().unwrap_or("unknown user")
                );
                return Ok(AuthExit::Authenticated);
            }
            Ok(_) => println!("error: {}", crate::error::GENERIC_ERROR_MESSAGE),
            Err(e) => println!("error: {}", e.user_message()),
        }
    }
}

async fn read_login(console: &mut Console) -> io::Result<Option<LoginForm>> {
    let Some(identity) = console.prompt("Username or email: ").await? else {
        return Ok(None);
    };
    let password = console.prompt_password("Password: ").await?;
    Ok(Some(LoginForm::new(identity, password)))
}

async fn read_signup(console: &mut Console) -> io::Result<Option<SignupForm>> {
    let Some(username) = console.prompt("Username: ").await? else {
        return Ok(None);
    };
    let Some(email) = console.prompt("Email: ").await? else {
        return Ok(None);
    };
    let password = console.prompt_password("Password: ").await?;
    let password_confirm = console.prompt_password("Confirm password: ").await?;

    Ok(Some(SignupForm {
        username,
        email,
        password,
        password_confirm,
    }))
}

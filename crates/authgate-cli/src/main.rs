//! authgate - command-line shell around the session gate.
//!
//! Loads the persisted token, reports which screen graph would be mounted,
//! and drives login/logout the same way the mobile screens do.

mod app;

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authgate_core::forms::{LoginForm, RegisterForm};
use authgate_core::SessionError;

use app::App;

/// Buffer size for commands read from stdin in `watch` mode.
const COMMAND_BUFFER_SIZE: usize = 8;

const USAGE: &str = "\
Usage: authgate <command>

Commands:
  status                      Show the current session and mounted screen
  login <token>               Store a token and sign in
  logout                      Forget the stored token
  sign-in <email>             Sign in against the account service
  register <username> <email> Create an account
  forgot-password             Show how to reset a password
  watch                       Follow render mode changes; type login/logout/quit";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    if command == "forgot-password" {
        println!("{}", App::forgot_password());
        return Ok(());
    }

    let app = App::new()?;
    info!("authgate starting");

    match (command.as_str(), &args[1..]) {
        ("status", []) => {
            let session = app.start().await;
            println!("{}", App::describe(&session));
        }
        ("login", [token]) => {
            app.start().await;
            app.session.login(token.as_str()).await?;
            println!("{}", App::describe(&app.session.session()));
        }
        ("logout", []) => {
            app.start().await;
            logout(&app).await?;
        }
        ("sign-in", [email]) => {
            app.start().await;
            let password = rpassword::prompt_password("Password: ")?;
            app.sign_in(LoginForm::new(email.as_str(), password)).await?;
            println!("{}", App::describe(&app.session.session()));
        }
        ("register", [username, email]) => {
            let password = rpassword::prompt_password("Password: ")?;
            let message = app
                .register(RegisterForm::new(username.as_str(), email.as_str(), password))
                .await?;
            println!("{}", message);
        }
        ("watch", []) => watch(app).await?,
        _ => bail!("Unrecognized command\n\n{}", USAGE),
    }

    Ok(())
}

async fn logout(app: &App) -> Result<()> {
    match app.session.logout().await {
        Ok(()) => println!("You have been logged out successfully."),
        // Memory is already cleared; tell the user the device may still hold the token
        Err(SessionError::PersistenceError(e)) => {
            println!("Logged out, but the stored token could not be removed: {}", e)
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Print every render mode change while reading commands from stdin.
async fn watch(app: App) -> Result<()> {
    let mut gate = app.gate();
    println!("[{:?}]", gate.current());

    let (tx, mut rx) = mpsc::channel::<String>(COMMAND_BUFFER_SIZE);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let session = app.session.clone();
    tokio::spawn(async move {
        session.initialize().await;
    });

    loop {
        print!("> ");
        io::stdout().flush()?;

        tokio::select! {
            mode = gate.changed() => match mode {
                Some(mode) => println!("\n[{:?}]", mode),
                None => break,
            },
            line = rx.recv() => {
                let Some(line) = line else { break };
                let mut parts = line.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some("login"), Some(token)) => {
                        if let Err(e) = app.session.login(token).await {
                            println!("Error: {}", e);
                        }
                    }
                    (Some("logout"), None) => logout(&app).await?,
                    (Some("quit"), None) | (Some("exit"), None) => break,
                    (None, _) => {}
                    _ => println!("Commands: login <token>, logout, quit"),
                }
            }
        }
    }

    Ok(())
}

//! Interactive loop wiring the session subsystem to the terminal.

use allerdex_api::{ApiClient, AuthorizedApi};
use allerdex_core::Email;
use allerdex_session::{
    AccessGate, Destination, ExpiryEvent, ExpiryPrompt, ExpiryScheduler, FileStorage,
    RefreshFailure, Rendered, SessionStore,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::views::{View, describe};

const HELP: &str = "\
commands:
  login <email> <password>   sign in
  logout                     sign out
  extend                     renew the session
  whoami                     show the session
  open <view>                open catalog, profile, editor or admin
  help                       show this text
  quit                       exit";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Logout,
    Extend,
    WhoAmI,
    Open(View),
    Help,
    Quit,
}

impl Command {
    /// Parses one line of input.
    ///
    /// # Errors
    ///
    /// Returns a usage message for unknown or incomplete commands.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_string());
        };
        let command = match verb {
            "login" => match (words.next(), words.next()) {
                (Some(email), Some(password)) => Self::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                },
                _ => return Err("usage: login <email> <password>".to_string()),
            },
            "logout" => Self::Logout,
            "extend" => Self::Extend,
            "whoami" => Self::WhoAmI,
            "open" => match words.next() {
                Some(name) => Self::Open(name.parse()?),
                None => return Err("usage: open <view>".to_string()),
            },
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(command)
    }
}

/// The wired-up session subsystem.
pub struct Shell {
    api: ApiClient,
    authorized: AuthorizedApi,
    store: SessionStore,
    scheduler: ExpiryScheduler,
    prompt: ExpiryPrompt,
    gates: Vec<(View, AccessGate)>,
}

impl Shell {
    /// Builds the store, scheduler, transport and one gate per view.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ShellConfig) -> allerdex_core::Result<Self, ShellError> {
        let api = ApiClient::new(config.api.clone()).map_err(|e| ShellError::Transport {
            details: e.to_string(),
        })?;
        let storage = FileStorage::new(&config.storage_dir, &config.session.storage_key);
        debug!(path = %storage.path().display(), "credential storage");

        let store = SessionStore::builder(Arc::new(storage), Arc::new(api.clone()))
            .policy(config.session.primary_role.clone())
            .build();
        let scheduler = ExpiryScheduler::new(store.clone(), &config.session);
        let prompt = scheduler.prompt();
        let authorized = AuthorizedApi::new(api.clone(), store.clone());
        let gates = View::ALL
            .into_iter()
            .map(|view| (view, AccessGate::new(store.clone(), view.required_roles())))
            .collect();

        Ok(Self {
            api,
            authorized,
            store,
            scheduler,
            prompt,
            gates,
        })
    }

    /// Restores the session and processes input until `quit` or EOF.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the terminal fails.
    pub async fn run(self) -> allerdex_core::Result<(), ShellError> {
        let restored = self.store.restore();
        println!("{}", describe(&restored));
        println!("type 'help' for commands");

        let _guard = self.scheduler.start();
        let mut events = self.scheduler.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = line.map_err(|e| ShellError::Io { details: e.to_string() })?;
                    let Some(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Command::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => self.dispatch(command).await,
                        Err(usage) => println!("{}", usage),
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => self.on_event(&event),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed expiry events"),
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        info!("shell exiting");
        Ok(())
    }

    async fn dispatch(&self, command: Command) {
        match command {
            Command::Login { email, password } => self.login(email, &password).await,
            Command::Logout => {
                let destination = self.prompt.logout();
                println!("signed out, now at {}", destination.path());
            }
            Command::Extend => match self.prompt.extend().await {
                Ok(_) => println!("{}", describe(&self.store.snapshot())),
                Err(RefreshFailure::Superseded) => {
                    println!("session changed before the extension completed");
                    println!("{}", describe(&self.store.snapshot()));
                }
                Err(failure) => {
                    println!(
                        "could not extend session ({}), now at {}",
                        failure,
                        Destination::Login.path()
                    );
                }
            },
            Command::WhoAmI => println!("{}", describe(&self.store.snapshot())),
            Command::Open(view) => self.open(view).await,
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
    }

    async fn login(&self, email: String, password: &str) {
        let email = Email::new(email);
        let credential = match self.api.authenticate(&email, password).await {
            Ok(credential) => credential,
            Err(e) => {
                println!("login failed: {}", e);
                return;
            }
        };
        match self.store.login(credential) {
            Ok(role) => println!("signed in as {} ({})", email, role),
            Err(e) => println!("login failed: {}", e),
        }
    }

    async fn open(&self, view: View) {
        let Some(gate) = self
            .gates
            .iter()
            .find_map(|(v, gate)| (*v == view).then_some(gate))
        else {
            return;
        };

        gate.mount().await;
        match gate.render(|| view) {
            Rendered::Loading => println!("{}: loading", view),
            Rendered::Redirect(destination) => {
                println!("{}: access denied, now at {}", view, destination.path());
            }
            Rendered::Children(view) => self.show(view).await,
        }
    }

    async fn show(&self, view: View) {
        println!("== {} ==", view);
        let Some(resource) = view.resource() else {
            return;
        };
        match self
            .authorized
            .get_json::<serde_json::Value>(resource)
            .await
        {
            Ok(serde_json::Value::Array(items)) => {
                for item in items {
                    println!("  {}", item);
                }
            }
            Ok(other) => println!("  {}", other),
            Err(e) => println!("  could not load {}: {}", resource, e),
        }
    }

    fn on_event(&self, event: &ExpiryEvent) {
        match event {
            ExpiryEvent::Warning { expires_at } => {
                println!(
                    "session expires at {}; type 'extend' to stay signed in or 'logout'",
                    expires_at.to_rfc3339()
                );
            }
            ExpiryEvent::WarningDismissed => println!("session extended"),
            ExpiryEvent::Expired { destination } => {
                println!("session expired, now at {}", destination.path());
            }
        }
    }
}

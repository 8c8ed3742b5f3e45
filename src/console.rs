//! Line-oriented command console.
//!
//! Each input line is one command; each reply is one JSON document.

use serde_json::{json, Value};
use thiserror::Error;

use crate::login::{IdentityGate, LoginFlow, Mailer};
use crate::store::OtpStore;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `issue <email>`
    Issue { identity: String },
    /// `verify <email> <code>`
    Verify { identity: String, code: String },
    /// `purge`
    Purge,
    /// `help`
    Help,
    /// `quit` or `exit`
    Quit,
}

/// Why a line could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseError(String);

pub const USAGE: &str = "commands: issue <email> | verify <email> <code> | purge | help | quit";

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Result<Self, ParseError>> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("issue" | "login", [identity]) => Ok(Command::Issue {
                identity: identity.to_string(),
            }),
            ("verify", [identity, code]) => Ok(Command::Verify {
                identity: identity.to_string(),
                code: code.to_string(),
            }),
            ("purge", []) => Ok(Command::Purge),
            ("help", []) => Ok(Command::Help),
            ("quit" | "exit", []) => Ok(Command::Quit),
            ("issue" | "login" | "verify" | "purge" | "help" | "quit" | "exit", _) => {
                Err(ParseError(format!("wrong number of arguments for '{}'", verb)))
            }
            _ => Err(ParseError(format!("unknown command '{}'", verb))),
        };
        Some(command)
    }
}

/// Executes console commands against a login flow.
pub struct Console<S: OtpStore, M: Mailer, G: IdentityGate> {
    flow: LoginFlow<S, M, G>,
}

impl<S: OtpStore, M: Mailer, G: IdentityGate> Console<S, M, G> {
    pub fn new(flow: LoginFlow<S, M, G>) -> Self {
        Self { flow }
    }

    /// Run one command and render its reply. `Quit` renders nothing.
    pub async fn execute(&self, command: Command) -> Option<Value> {
        let reply = match command {
            Command::Issue { identity } => to_json(&self.flow.login_now(&identity).await),
            Command::Verify { identity, code } => {
                to_json(&self.flow.verify_now(&identity, &code).await)
            }
            Command::Purge => {
                self.flow.engine().purge_expired_now().await;
                json!({ "status": "purged" })
            }
            Command::Help => json!({ "status": "help", "usage": USAGE }),
            Command::Quit => return None,
        };
        Some(reply)
    }

    /// Parse and run one input line.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        match Command::parse(line)? {
            Ok(command) => self.execute(command).await,
            Err(e) => Some(json!({ "status": "error", "reason": e.to_string(), "usage": USAGE })),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({ "status": "error", "reason": e.to_string() }))
}

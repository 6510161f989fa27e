//! Command-line parsing
//!
//! ```text
//! pitch-farmer [--config PATH] [start]
//! pitch-farmer [--config PATH] add-session PHONE URL
//! pitch-farmer [--config PATH] add-session PHONE --command PROGRAM [ARGS..]
//! pitch-farmer [--config PATH] list-sessions
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pitch_auth::HandOffSource;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to pitch-farmer.toml)
    #[arg(long, global = true, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Farm every stored account until SIGTERM/SIGINT
    Start,
    /// Record how an account obtains its web-app hand-off
    AddSession(AddSession),
    /// Print every stored account
    ListSessions,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddSession {
    /// Account phone number, with or without a leading +
    pub phone: String,

    /// Captured web-app URL carrying tgWebAppData in its fragment
    #[arg(required_unless_present = "command", conflicts_with = "command")]
    pub url: Option<String>,

    /// Helper program (and its arguments) that prints a fresh web-view URL
    #[arg(
        long,
        num_args = 1..,
        allow_hyphen_values = true,
        value_name = "PROGRAM [ARGS]"
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// The requested command; a bare invocation starts farming.
    pub fn action(&self) -> Command {
        self.command.clone().unwrap_or(Command::Start)
    }
}

impl AddSession {
    pub fn source(&self) -> HandOffSource {
        match self.command.split_first() {
            Some((program, args)) => HandOffSource::Command {
                program: program.clone(),
                args: args.to_vec(),
            },
            None => HandOffSource::WebAppUrl {
                url: self.url.clone().unwrap_or_default(),
            },
        }
    }
}

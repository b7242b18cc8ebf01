//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "gmail-autoresponder")]
#[command(version)]
#[command(about = "Replies once to first-contact Gmail threads and labels them", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "autoresponder.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 application credentials file (overrides paths.credentials)
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Path to saved token file (overrides paths.token)
    #[arg(long, global = true)]
    pub token: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Poll and reply on a fixed interval until interrupted (default)
    Run,

    /// Run a single pass and exit
    Once,

    /// Authorize with Gmail and save the token file
    Auth {
        /// Discard the saved token and run the consent flow again
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }

    /// Apply path overrides given on the command line
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(credentials) = &self.credentials {
            config.paths.credentials = credentials.clone();
        }
        if let Some(token) = &self.token {
            config.paths.token = token.clone();
        }
    }
}

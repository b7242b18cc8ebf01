//! Gmail Autoresponder
//!
//! Polls a Gmail mailbox, finds first-contact unread threads and sends each
//! one a single automated reply, tagging the thread with a watch label so it
//! is excluded from later searches.
//!
//! # Overview
//!
//! - **Authentication**: saved authorized-user credentials or an installed-app consent flow
//! - **Selection**: one search per pass, keeping threads seen exactly once in the page
//! - **Reply**: label the original message, then send `Re: <subject>` in its thread
//! - **Scheduling**: a pass at startup and every 45 seconds, never two at once
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use gmail_autoresponder::{auth, client::ProductionGmailClient, config::Config, scheduler::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("autoresponder.toml".as_ref()).await?;
//!     config.validate()?;
//!
//!     let authorization = auth::authorize(&config.paths.credentials, &config.paths.token).await?;
//!     let client = Arc::new(ProductionGmailClient::new(auth::build_hub(authorization.authenticator)?));
//!
//!     let report = Pipeline::from_config(client, &config).run_pass().await;
//!     println!("replied to {} messages", report.replied);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authorization and Gmail API hub construction
//! - [`cli`] - Command-line interface
//! - [`client`] - Gmail API client trait and production implementation
//! - [`config`] - Configuration management
//! - [`credentials`] - Token file and application-credentials file
//! - [`error`] - Error types and result aliases
//! - [`label_manager`] - Watch-label lookup, creation and application
//! - [`models`] - Core data structures
//! - [`responder`] - Reply composition and delivery
//! - [`scheduler`] - Pipeline passes and the fixed-interval driver
//! - [`selector`] - Candidate message selection

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod label_manager;
pub mod models;
pub mod responder;
pub mod scheduler;
pub mod selector;

pub use error::{GmailError, Result};

pub use models::{Header, LabelInfo, ListQuery, MessageDetail, MessageRef, OutgoingMessage};

pub use client::{GmailClient, ProductionGmailClient};

pub use config::Config;

pub use label_manager::{LabelManager, LabelOutcome};
pub use responder::{EmailResponder, ReplyDraft, ReplyOutcome};
pub use scheduler::{PassReport, Pipeline, Scheduler};
pub use selector::{EmailSelector, Selection};

pub use cli::{Cli, Commands};

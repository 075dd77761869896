//! Gmail Priority
//!
//! Signs in to Gmail, fetches a small batch of important unread messages, asks a
//! hosted language model to rank them, and keeps the ranked list for display with
//! a per-message "mark read" action.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 sign-in that forces a fresh grant, best-effort
//!   revocation on sign-out
//! - **Mail**: Gmail search plus concurrent detail fetches, read-state mutation
//! - **Ranking**: chat-completion prompt and fail-closed permutation parsing
//! - **Pipeline**: fetch → rank → persist → render, serialized per process
//! - **Persistence**: one token slot and one saved-list slot in a local file
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use gmail_priority::{app::{Popup, Services}, config::Config, render::RecordingRenderer, store::CredentialStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     let store = Arc::new(CredentialStore::open(&config.storage.path).await?);
//!     let renderer = Arc::new(RecordingRenderer::new());
//!
//!     let popup = Popup::new(&config, Services::from_config(&config)?, store, renderer.clone());
//!     popup.on_load().await;
//!     if let Some(ranked) = popup.on_sort().await? {
//!         println!("{} messages ranked", ranked.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`app`] - Popup controller: one handler per control
//! - [`auth`] - Identity broker, token revocation and the session lifecycle
//! - [`client`] - Gmail client and the important-mail fetch
//! - [`cli`] - Command-line interface
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`http`] - HTTPS transport for revocation and ranking calls
//! - [`interactive`] - Interactive mark-read review
//! - [`models`] - Core data structures
//! - [`pipeline`] - Sort pipeline and the mark-read action
//! - [`ranking`] - Priority ranking via a chat-completion endpoint
//! - [`render`] - Console and in-memory renderers
//! - [`store`] - Local session persistence

pub mod app;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod interactive;
pub mod models;
pub mod pipeline;
pub mod ranking;
pub mod render;
pub mod store;

// Re-export commonly used types for convenience
pub use error::{PriorityError, Result};

pub use models::{Message, SessionStatus, StoredSession};

pub use config::{AuthConfig, Config, MailConfig, NetworkConfig, RankingConfig, StorageConfig};

pub use auth::{AuthManager, HttpTokenRevoker, IdentityBroker, InstalledFlowBroker, TokenRevoker};
pub use client::{fetch_important, GmailClient, ProductionGmailClient};
pub use ranking::{ApiKeySource, ChatCompletionRanker, EnvApiKey, NoApiKey, PriorityRanker};

pub use app::{Popup, Services};
pub use pipeline::SortPipeline;
pub use render::{ConsoleRenderer, RecordingRenderer, Renderer, ViewState};
pub use store::CredentialStore;

//! credprov — headless credential provider plugin
//!
//! Answers a package manager's plugin-protocol requests to obtain
//! authentication secrets for protected feeds without interactive prompts.
//! The session advertises an `Authentication` claim for a fixed allow-list
//! of feed hosts and acquires tokens through a short-circuiting pipeline:
//! an optional TOTP second-factor gate followed by a local helper process
//! invoked with bounded retries and timeouts.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use credprov::config::PluginConfig;
//! use credprov::protocol::{CredentialRequest, Request};
//! use credprov::session::PluginSession;
//!
//! # async fn example() {
//! let config = Arc::new(PluginConfig::from_env());
//! let session = PluginSession::new(config);
//! let request = Request::GetAuthenticationCredentials(CredentialRequest::for_uri(
//!     "https://pkgs.dev.azure.com/org/_packaging/feed/nuget/v3/index.json",
//! ));
//! let response = session.handle(request, &CancellationToken::new()).await;
//! # let _ = response;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod protocol;
pub mod scope;
pub mod session;
pub mod totp;
pub mod util;

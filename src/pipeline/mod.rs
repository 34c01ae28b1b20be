//! Credential acquisition pipeline.
//!
//! An ordered chain of sources. The first source to yield a non-empty
//! secret wins; a source may instead pass (let the next source try) or
//! abort (stop the chain). Absence of credentials is an expected,
//! recoverable outcome: the chain resolves to `NotApplicable` — never a
//! fault — so the host can move on to its next provider. Cancellation at
//! any point also resolves as `NotApplicable`.

pub mod helper;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::PluginConfig;
use crate::protocol::CredentialRequest;
use crate::totp::SecondFactorGate;

/// Username paired with every token this provider mints.
pub const TOKEN_USERNAME: &str = "VssSessionToken";

const CANCELLED_MESSAGE: &str = "credential request was cancelled";
const EXHAUSTED_MESSAGE: &str = "no credential source produced a token";

/// A usable credential produced by some source.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl Credential {
    pub fn token(secret: impl Into<String>) -> Self {
        Self {
            username: TOKEN_USERNAME.to_string(),
            secret: secret.into(),
        }
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// What one source decided about a request.
#[derive(Debug)]
pub enum SourceDecision {
    /// This source produced a credential; the chain stops here.
    Yield(Credential),
    /// This source has nothing; let the next source try.
    Pass,
    /// Stop the chain now; resolves as `NotApplicable` with this message.
    Abort(String),
}

/// Final outcome of a pipeline run.
#[derive(Debug)]
pub enum CredentialOutcome {
    /// A non-empty secret was produced.
    Success(Credential),
    /// No credential available for this request; the host should try its
    /// next provider.
    NotApplicable { message: String },
    /// The plugin itself is unusable. Never used to mean "no credential".
    Fault { message: String },
}

/// One stage in the acquisition chain.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn acquire(
        &self,
        request: &CredentialRequest,
        cancel: &CancellationToken,
    ) -> SourceDecision;
}

/// The ordered, short-circuiting chain of credential sources.
///
/// Stateless across calls: each acquisition walks the chain from a clean
/// state, so concurrent requests need no coordination.
pub struct CredentialPipeline {
    sources: Vec<Arc<dyn CredentialSource>>,
}

impl CredentialPipeline {
    /// The in-scope chain: second-factor gate, then the helper process.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(vec![
            Arc::new(SecondFactorGate::from_config(config)),
            Arc::new(helper::HelperProcessSource::new(
                helper::default_candidate_paths(),
            )),
        ])
    }

    pub fn new(sources: Vec<Arc<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Run the chain for one request.
    pub async fn acquire(
        &self,
        request: &CredentialRequest,
        cancel: &CancellationToken,
    ) -> CredentialOutcome {
        for source in &self.sources {
            if cancel.is_cancelled() {
                return CredentialOutcome::NotApplicable {
                    message: CANCELLED_MESSAGE.to_string(),
                };
            }

            match source.acquire(request, cancel).await {
                SourceDecision::Yield(credential) => {
                    if credential.secret.is_empty() {
                        // A success outcome requires an actual secret.
                        tracing::warn!(source = source.name(), "source yielded an empty secret");
                        continue;
                    }
                    tracing::info!(source = source.name(), "credential acquired");
                    return CredentialOutcome::Success(credential);
                }
                SourceDecision::Pass => {
                    tracing::debug!(source = source.name(), "source passed");
                }
                SourceDecision::Abort(message) => {
                    tracing::debug!(source = source.name(), %message, "source aborted the chain");
                    return CredentialOutcome::NotApplicable { message };
                }
            }
        }

        CredentialOutcome::NotApplicable {
            message: EXHAUSTED_MESSAGE.to_string(),
        }
    }
}

//! Plugin session state machine.
//!
//! One session lives for the whole plugin process. The host may pipeline
//! requests, so every handler takes `&self` and tolerates arbitrary
//! interleaving; the only mutable session-scoped resource is the request
//! timeout negotiated by `Initialize`, written once and read thereafter.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::PluginConfig;
use crate::pipeline::{CredentialOutcome, CredentialPipeline};
use crate::protocol::{
    AckResponse, CredentialRequest, CredentialResponse, OperationClaim, OperationClaimsRequest,
    OperationClaimsResponse, Request, Response,
};
use crate::scope;

/// Lifecycle of a session: linear, no cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Created = 0,
    Ready = 1,
    Terminated = 2,
}

/// Message shown when the operator has switched the plugin off.
const DISABLED_MESSAGE: &str =
    "credential provider is disabled; falling back to other providers";

const OUT_OF_SCOPE_MESSAGE: &str = "package source is not handled by this provider";

/// Callback the binary installs so `SetLogLevel` can adjust the sink.
type LevelSink = Box<dyn Fn(tracing::level_filters::LevelFilter) + Send + Sync>;

/// The protocol state machine.
///
/// Holds the resolved configuration snapshot for its whole lifetime and a
/// stateless pipeline; each credential request runs the pipeline from a
/// clean state.
pub struct PluginSession {
    config: Arc<PluginConfig>,
    pipeline: CredentialPipeline,
    state: AtomicU8,
    request_timeout: RwLock<Option<Duration>>,
    level_sink: Option<LevelSink>,
}

impl PluginSession {
    /// Session with the standard in-scope pipeline (gate, then helper).
    pub fn new(config: Arc<PluginConfig>) -> Self {
        let pipeline = CredentialPipeline::from_config(&config);
        Self::with_pipeline(config, pipeline)
    }

    /// Session over an explicit pipeline; tests inject their own sources.
    pub fn with_pipeline(config: Arc<PluginConfig>, pipeline: CredentialPipeline) -> Self {
        Self {
            config,
            pipeline,
            state: AtomicU8::new(SessionState::Created as u8),
            request_timeout: RwLock::new(None),
            level_sink: None,
        }
    }

    /// Install the verbosity callback used by `SetLogLevel`.
    pub fn with_level_sink(
        mut self,
        sink: impl Fn(tracing::level_filters::LevelFilter) + Send + Sync + 'static,
    ) -> Self {
        self.level_sink = Some(Box::new(sink));
        self
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::SeqCst) {
            0 => SessionState::Created,
            1 => SessionState::Ready,
            _ => SessionState::Terminated,
        }
    }

    /// Timeout negotiated by `Initialize`, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        *self
            .request_timeout
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Dispatch one decoded request. `Close` yields no response.
    pub async fn handle(&self, request: Request, cancel: &CancellationToken) -> Option<Response> {
        match request {
            Request::Initialize(req) => {
                if let Some(ms) = req.request_timeout {
                    let mut slot = self
                        .request_timeout
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    *slot = Some(Duration::from_millis(ms));
                }
                let _ = self.state.compare_exchange(
                    SessionState::Created as u8,
                    SessionState::Ready as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                tracing::info!(
                    client_version = %req.client_version,
                    request_timeout_ms = ?req.request_timeout,
                    "session initialized"
                );
                Some(Response::Ack(AckResponse::success()))
            }
            Request::SetLogLevel(req) => {
                if let Some(sink) = &self.level_sink {
                    sink(req.log_level.level_filter());
                }
                tracing::debug!(level = ?req.log_level, "log level adjusted");
                Some(Response::Ack(AckResponse::success()))
            }
            Request::GetOperationClaims(req) => {
                Some(Response::Claims(self.operation_claims(&req)))
            }
            Request::GetAuthenticationCredentials(req) => Some(Response::Credentials(
                self.authentication_credentials(&req, cancel).await,
            )),
            Request::Close => {
                self.state
                    .store(SessionState::Terminated as u8, Ordering::SeqCst);
                tracing::info!("session closed");
                None
            }
        }
    }

    /// Claims negotiation.
    ///
    /// An absent or empty repository URI is a source-agnostic capability
    /// probe and is answered broadly; a concrete URI is answered per the
    /// host-pattern matcher. Credential issuance stays gated per URI.
    fn operation_claims(&self, request: &OperationClaimsRequest) -> OperationClaimsResponse {
        if self.config.disabled {
            return OperationClaimsResponse { claims: Vec::new() };
        }

        let in_scope = match request.package_source_repository.as_deref() {
            None | Some("") => true,
            Some(uri) => scope::matches(Some(uri)),
        };

        OperationClaimsResponse {
            claims: if in_scope {
                vec![OperationClaim::Authentication]
            } else {
                Vec::new()
            },
        }
    }

    /// Credential issuance for one concrete feed URI.
    ///
    /// Disabled mode and out-of-scope URIs resolve to `NotFound` before the
    /// pipeline is ever consulted, so no subprocess is spawned for feeds
    /// this provider will never serve.
    async fn authentication_credentials(
        &self,
        request: &CredentialRequest,
        cancel: &CancellationToken,
    ) -> CredentialResponse {
        if self.config.disabled {
            return CredentialResponse::not_found(DISABLED_MESSAGE);
        }

        if !scope::matches(Some(&request.uri)) {
            tracing::debug!(uri = %request.uri, "feed out of scope");
            return CredentialResponse::not_found(OUT_OF_SCOPE_MESSAGE);
        }

        match self.pipeline.acquire(request, cancel).await {
            CredentialOutcome::Success(credential) => {
                CredentialResponse::success(credential.username, credential.secret)
            }
            CredentialOutcome::NotApplicable { message } => {
                CredentialResponse::not_found(message)
            }
            CredentialOutcome::Fault { message } => {
                tracing::error!(%message, "credential pipeline faulted");
                CredentialResponse::error(message)
            }
        }
    }
}

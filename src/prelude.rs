//! Convenience re-exports for common use.

pub use crate::config::{PluginConfig, Verbosity};
pub use crate::error::{CredProvError, Result};
pub use crate::pipeline::{
    Credential, CredentialOutcome, CredentialPipeline, CredentialSource, SourceDecision,
};
pub use crate::protocol::{
    CredentialRequest, CredentialResponse, OperationClaim, Request, Response, ResponseCode,
};
pub use crate::session::{PluginSession, SessionState};

//! Time-based one-time codes and the second-factor gate.
//!
//! Implements the RFC 4226 HOTP truncation over HMAC-SHA1 with the RFC 6238
//! 30-second time step and 6-digit codes — the interoperable defaults every
//! authenticator app ships with. The shared secret is carried as unpadded
//! RFC 4648 base32.
//!
//! The gate fails closed: a missing code, a missing or malformed secret, and
//! a code outside the accepted window all reject, and the rejection message
//! never reveals which code was expected.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tokio_util::sync::CancellationToken;

use crate::config::PluginConfig;
use crate::error::CredProvError;
use crate::pipeline::{CredentialSource, SourceDecision};
use crate::protocol::CredentialRequest;

type HmacSha1 = Hmac<Sha1>;

/// RFC 6238 time step.
pub const STEP_SECS: u64 = 30;

const DIGITS: u32 = 6;

/// Decode an unpadded base32 shared secret.
pub fn decode_secret(encoded: &str) -> Result<Vec<u8>, CredProvError> {
    base32::decode(
        base32::Alphabet::Rfc4648 { padding: false },
        encoded.trim_end_matches('='),
    )
    .ok_or_else(|| CredProvError::Configuration("malformed base32 second-factor secret".into()))
}

fn hotp(key: &[u8], counter: u64) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // RFC 4226 dynamic truncation.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    format!("{:0width$}", bin % 10u32.pow(DIGITS), width = DIGITS as usize)
}

/// Code for the time step containing `unix_secs`.
pub fn code_at(key: &[u8], unix_secs: u64) -> String {
    hotp(key, unix_secs / STEP_SECS)
}

/// Codes accepted at `now`: the steps for `now - 30s`, `now`, and `now + 30s`.
pub fn accepted_codes(key: &[u8], now_unix: u64) -> [String; 3] {
    [
        code_at(key, now_unix.saturating_sub(STEP_SECS)),
        code_at(key, now_unix),
        code_at(key, now_unix + STEP_SECS),
    ]
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

const REJECT_MESSAGE: &str = "second factor validation failed";

/// First stage of the credential pipeline.
///
/// Contributes no secret of its own: it either lets the chain continue
/// (`Pass`) or stops it (`Abort`) before any helper subprocess is spawned.
pub struct SecondFactorGate {
    enabled: bool,
    secret: Option<String>,
    provided_code: Option<String>,
}

impl SecondFactorGate {
    /// Resolve the gate's material from the configuration snapshot.
    ///
    /// Values are taken exactly as supplied; nothing is cached beyond the
    /// gate instance itself.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            enabled: config.two_factor_enabled,
            secret: config.two_factor_secret.clone(),
            provided_code: config.two_factor_code.clone(),
        }
    }

    /// Gate verdict at an explicit clock reading.
    fn verdict_at(&self, now_unix: u64) -> SourceDecision {
        if !self.enabled {
            return SourceDecision::Pass;
        }

        let Some(code) = self.provided_code.as_deref() else {
            tracing::warn!("second factor enabled but no code was supplied");
            return SourceDecision::Abort(REJECT_MESSAGE.to_string());
        };

        let Some(secret) = self.secret.as_deref() else {
            tracing::warn!("second factor enabled but no shared secret is configured");
            return SourceDecision::Abort(REJECT_MESSAGE.to_string());
        };

        let key = match decode_secret(secret) {
            Ok(key) => key,
            Err(error) => {
                // Fail closed on a malformed secret; never crash the session.
                tracing::warn!(%error, "second factor secret could not be decoded");
                return SourceDecision::Abort(REJECT_MESSAGE.to_string());
            }
        };

        if accepted_codes(&key, now_unix).iter().any(|c| c == code) {
            tracing::debug!("second factor accepted");
            SourceDecision::Pass
        } else {
            tracing::warn!("second factor code rejected");
            SourceDecision::Abort(REJECT_MESSAGE.to_string())
        }
    }
}

#[async_trait]
impl CredentialSource for SecondFactorGate {
    fn name(&self) -> &'static str {
        "second-factor-gate"
    }

    async fn acquire(
        &self,
        _request: &CredentialRequest,
        _cancel: &CancellationToken,
    ) -> SourceDecision {
        self.verdict_at(now_unix())
    }
}

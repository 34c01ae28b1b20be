//! Plugin protocol payload types.
//!
//! The transport framing (handshake, stream mechanics) belongs to the host;
//! this module only defines the decoded request/response payloads exchanged
//! per message kind, plus the thin line-oriented envelopes the standalone
//! binary uses. The set of message kinds is closed: dispatch is an
//! exhaustive match over [`Request`], never a mutable handler registry.

use serde::{Deserialize, Serialize};

/// Capability a plugin can advertise to the package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationClaim {
    Authentication,
}

/// Contractual outcome codes for a response.
///
/// `NotFound` is the "not my feed or no credential, try the next provider"
/// signal; `Error` is reserved for conditions that make the plugin itself
/// unusable and must never mean "no credential".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseCode {
    Success,
    NotFound,
    Error,
}

/// Log levels the host may push via `SetLogLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Verbose,
    Information,
    Minimal,
    Warning,
    Error,
}

impl LogLevel {
    pub fn level_filter(self) -> tracing::level_filters::LevelFilter {
        use tracing::level_filters::LevelFilter;
        match self {
            LogLevel::Debug | LogLevel::Verbose => LevelFilter::DEBUG,
            LogLevel::Information => LevelFilter::INFO,
            LogLevel::Minimal | LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub client_version: String,
    #[serde(default)]
    pub culture: Option<String>,
    /// Negotiated per-request timeout in milliseconds, if the host sends one.
    #[serde(default)]
    pub request_timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLogLevelRequest {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationClaimsRequest {
    /// Absent or empty means a source-agnostic capability probe.
    #[serde(default)]
    pub package_source_repository: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationClaimsResponse {
    pub claims: Vec<OperationClaim>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub uri: String,
    #[serde(default)]
    pub is_retry: bool,
    #[serde(default)]
    pub is_non_interactive: bool,
    #[serde(default)]
    pub can_show_dialog: bool,
}

impl CredentialRequest {
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            is_retry: false,
            is_non_interactive: true,
            can_show_dialog: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_types: Option<Vec<String>>,
    pub response_code: ResponseCode,
}

impl CredentialResponse {
    /// Successful responses always carry `Basic` and a non-empty password.
    pub fn success(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            message: None,
            authentication_types: Some(vec!["Basic".to_string()]),
            response_code: ResponseCode::Success,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            username: None,
            password: None,
            message: Some(message.into()),
            authentication_types: None,
            response_code: ResponseCode::NotFound,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            username: None,
            password: None,
            message: Some(message.into()),
            authentication_types: None,
            response_code: ResponseCode::Error,
        }
    }
}

/// Acknowledgement payload for `Initialize` and `SetLogLevel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub response_code: ResponseCode,
}

impl AckResponse {
    pub fn success() -> Self {
        Self {
            response_code: ResponseCode::Success,
        }
    }
}

/// A decoded request, keyed by message kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "payload")]
pub enum Request {
    Initialize(InitializeRequest),
    SetLogLevel(SetLogLevelRequest),
    GetOperationClaims(OperationClaimsRequest),
    GetAuthenticationCredentials(CredentialRequest),
    Close,
}

/// A response payload; `Close` produces none.
///
/// Untagged on the wire: the plugin only ever serializes this enum, and the
/// host correlates responses by request id and reads the fields it expects.
/// Deserializing is first-match, not exact-match — an ack body also
/// satisfies the optional-heavy `Credentials` shape — so decode-side
/// consumers should match on fields rather than variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Claims(OperationClaimsResponse),
    Credentials(CredentialResponse),
    Ack(AckResponse),
}

/// One inbound line on the standalone stdio transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub request_id: u64,
    #[serde(flatten)]
    pub request: Request,
}

/// One outbound line on the standalone stdio transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub request_id: u64,
    pub payload: Response,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope_decodes_camel_case_payloads() {
        let line = r#"{
            "requestId": 7,
            "method": "GetAuthenticationCredentials",
            "payload": {
                "uri": "https://pkgs.dev.azure.com/org/_packaging/feed/nuget/v3/index.json",
                "isRetry": true,
                "isNonInteractive": true,
                "canShowDialog": false
            }
        }"#;
        let envelope: RequestEnvelope = serde_json::from_str(line).unwrap();
        assert_eq!(envelope.request_id, 7);
        match envelope.request {
            Request::GetAuthenticationCredentials(req) => {
                assert!(req.is_retry);
                assert!(req.uri.contains("pkgs.dev.azure.com"));
            }
            other => panic!("expected credentials request, got {other:?}"),
        }
    }

    #[test]
    fn initialize_tolerates_absent_optional_fields() {
        let line = r#"{"requestId": 1, "method": "Initialize", "payload": {"clientVersion": "6.9.1"}}"#;
        let envelope: RequestEnvelope = serde_json::from_str(line).unwrap();
        match envelope.request {
            Request::Initialize(req) => {
                assert_eq!(req.client_version, "6.9.1");
                assert!(req.culture.is_none());
                assert!(req.request_timeout.is_none());
            }
            other => panic!("expected initialize, got {other:?}"),
        }
    }

    #[test]
    fn close_decodes_without_payload() {
        let line = r#"{"requestId": 3, "method": "Close"}"#;
        let envelope: RequestEnvelope = serde_json::from_str(line).unwrap();
        assert!(matches!(envelope.request, Request::Close));
    }

    #[test]
    fn untagged_response_decode_is_first_match() {
        let envelope = ResponseEnvelope {
            request_id: 4,
            payload: Response::Ack(AckResponse::success()),
        };
        let line = serde_json::to_string(&envelope).unwrap();
        assert_eq!(line, r#"{"requestId":4,"payload":{"responseCode":"Success"}}"#);

        // An ack body round-trips into the optional-heavy credentials shape,
        // not back into `Ack`.
        let decoded: ResponseEnvelope = serde_json::from_str(&line).unwrap();
        match decoded.payload {
            Response::Credentials(body) => {
                assert_eq!(body.response_code, ResponseCode::Success);
                assert!(body.username.is_none());
                assert!(body.password.is_none());
            }
            other => panic!("expected credentials-shaped decode, got {other:?}"),
        }
    }

    #[test]
    fn success_response_always_carries_basic_auth_type() {
        let response = CredentialResponse::success("VssSessionToken", "tok");
        assert_eq!(
            response.authentication_types,
            Some(vec!["Basic".to_string()])
        );
        assert_eq!(response.response_code, ResponseCode::Success);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["responseCode"], "Success");
        assert_eq!(json["authenticationTypes"][0], "Basic");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn not_found_response_omits_credential_fields() {
        let json = serde_json::to_value(CredentialResponse::not_found("no feed")).unwrap();
        assert_eq!(json["responseCode"], "NotFound");
        assert!(json.get("username").is_none());
        assert!(json.get("password").is_none());
    }
}

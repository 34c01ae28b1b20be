//! Host-pattern matcher.
//!
//! Decides whether a feed URI is one this provider is willing to
//! authenticate. Matching is a case-insensitive substring test against a
//! fixed allow-list of host fragments, deliberately not URL parsing: the
//! scheme is irrelevant, and schemeless strings containing a fragment still
//! match.

/// Known feed-host markers.
const FEED_HOST_FRAGMENTS: &[&str] = &["pkgs.dev.azure.com", ".pkgs.visualstudio.com"];

/// Whether `uri` names a feed in scope for this provider.
///
/// Total over its input: `None` and empty strings are simply out of scope.
/// Note the claims path treats an empty URI as a source-agnostic probe
/// instead of calling this; that asymmetry lives in the session, not here.
pub fn matches(uri: Option<&str>) -> bool {
    let Some(uri) = uri else {
        return false;
    };
    if uri.is_empty() {
        return false;
    }
    let lowered = uri.to_ascii_lowercase();
    FEED_HOST_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

//! Classification of provider failures.
//!
//! CityTag does not document a machine-readable "session expired" code, so
//! expiry is inferred from the error text. The marker list is provider-
//! specific and brittle; it lives behind this one function so a documented
//! error-code check can replace it without touching the reconciler.

use crate::CityTagError;

/// Case-insensitive substrings that mark a failure as an expired or
/// rejected session rather than a transient fault.
const AUTH_FAILURE_MARKERS: &[&str] = &[
    "token",
    "expired",
    "invalid token",
    "invalid",
    "401",
    "unauthorized",
    "400",
    "bad request",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The session token is no longer accepted; re-authentication is the
    /// correct response.
    Expired,
    /// A transient fault (network, provider hiccup); retry next pass.
    Transient,
    /// The response itself was undecodable; retrying with the same inputs
    /// will not help this pass.
    Fatal,
}

pub fn classify_failure(error: &CityTagError) -> FailureKind {
    if matches!(error, CityTagError::MalformedCiphertext(_)) {
        return FailureKind::Fatal;
    }

    let text = error.display_chain().to_string().to_lowercase();
    if AUTH_FAILURE_MARKERS.iter().any(|marker| text.contains(marker)) {
        FailureKind::Expired
    } else {
        FailureKind::Transient
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth state and PKCE primitives.

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Entropy for the `state` parameter (32 bytes → 43 url-safe chars).
pub const STATE_BYTES: usize = 32;

/// Entropy for the PKCE code verifier (32 bytes → 43 url-safe chars,
/// within RFC 7636's 43..=128 bounds).
pub const VERIFIER_BYTES: usize = 32;

/// One in-flight authorization attempt, persisted server-side across
/// the redirect round-trip and consumed exactly once on the callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthTransaction {
    /// Single-use random state bound to this attempt.
    pub state: String,
    /// PKCE code verifier; the provider only ever sees its S256
    /// challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    /// Same-site path to return to after login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl OAuthTransaction {
    /// Start a fresh attempt. `with_pkce` decides whether a verifier is
    /// generated alongside the state.
    pub fn begin(with_pkce: bool, target: Option<String>) -> Self {
        Self {
            state: random_urlsafe(STATE_BYTES),
            code_verifier: with_pkce.then(|| random_urlsafe(VERIFIER_BYTES)),
            target,
        }
    }
}

/// Draw `bytes` of CSPRNG output, url-safe base64 encoded without
/// padding.
pub fn random_urlsafe(bytes: usize) -> String {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; bytes];
    // A process that cannot draw randomness cannot run this flow safely.
    rng.fill(&mut buf).expect("system randomness unavailable");
    Base64UrlUnpadded::encode_string(&buf)
}

/// S256 code challenge for a PKCE verifier: base64url(sha256(verifier)),
/// no padding.
pub fn pkce_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&hash)
}

/// Constant-time state comparison. Length mismatch compares unequal
/// without leaking where the difference is.
pub fn state_matches(presented: &str, expected: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(presented.as_bytes(), expected.as_bytes()).is_ok()
}

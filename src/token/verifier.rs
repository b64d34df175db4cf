// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification against pinned key material.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::claims::TokenClaimSet;
use crate::error::ConfigError;
use crate::models::{RoleSet, UserKey};

/// Token verification failure.
///
/// Verification short-circuits on the first failing step; no partial
/// claim set is ever returned alongside an error.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token does not structurally decode.
    #[error("token is structurally malformed")]
    Malformed,

    /// Signature check against the configured key failed.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// The token was signed with a different algorithm than the verifier
    /// is pinned to. Rejected even if the signature would verify under
    /// the token's own algorithm.
    #[error("token algorithm does not match the configured algorithm")]
    AlgorithmMismatch,

    /// `now < exp` does not hold (a token with `exp == now` is expired).
    #[error("token has expired")]
    Expired,

    /// A required claim is absent or empty.
    #[error("token is missing required claim `{0}`")]
    MissingClaims(&'static str),
}

/// Key material for signature verification.
#[derive(Clone)]
pub enum VerificationKey {
    /// Shared secret for the HS* family.
    HmacSecret(Vec<u8>),
    /// PEM-encoded public key for the RS*/ES*/EdDSA families.
    PublicKeyPem(String),
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        match self {
            VerificationKey::HmacSecret(_) => f.write_str("VerificationKey::HmacSecret(..)"),
            VerificationKey::PublicKeyPem(_) => f.write_str("VerificationKey::PublicKeyPem(..)"),
        }
    }
}

/// Static verifier configuration: the expected algorithm and the key
/// material to check signatures against.
#[derive(Debug, Clone)]
pub struct TokenVerifierSettings {
    pub algorithm: Algorithm,
    pub key: VerificationKey,
}

impl TokenVerifierSettings {
    pub fn hmac(algorithm: Algorithm, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm,
            key: VerificationKey::HmacSecret(secret.into()),
        }
    }

    pub fn public_key_pem(algorithm: Algorithm, pem: impl Into<String>) -> Self {
        Self {
            algorithm,
            key: VerificationKey::PublicKeyPem(pem.into()),
        }
    }
}

/// Raw claims as decoded from the wire. Everything is optional here so
/// that presence checks produce [`TokenError::MissingClaims`] instead of
/// an opaque deserialization failure.
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    roles: Option<Vec<String>>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

/// Bearer token verifier pinned to one algorithm and one key.
///
/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct TokenVerifier {
    algorithm: Algorithm,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl TokenVerifier {
    /// Build a verifier from settings.
    ///
    /// Fails at startup when the key material does not fit the pinned
    /// algorithm family (HMAC secret with an asymmetric algorithm, bad
    /// PEM, ...). The process must not come up with an unusable verifier.
    pub fn new(settings: TokenVerifierSettings) -> Result<Self, ConfigError> {
        let decoding_key = match (&settings.key, settings.algorithm) {
            (VerificationKey::HmacSecret(secret), Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) => {
                if secret.is_empty() {
                    return Err(ConfigError::MissingSecret("token HMAC secret is empty".into()));
                }
                DecodingKey::from_secret(secret)
            }
            (VerificationKey::PublicKeyPem(pem), Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 | Algorithm::PS256 | Algorithm::PS384 | Algorithm::PS512) => {
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| ConfigError::InvalidKey(format!("invalid RSA public key pem: {e}")))?
            }
            (VerificationKey::PublicKeyPem(pem), Algorithm::ES256 | Algorithm::ES384) => {
                DecodingKey::from_ec_pem(pem.as_bytes())
                    .map_err(|e| ConfigError::InvalidKey(format!("invalid EC public key pem: {e}")))?
            }
            (VerificationKey::PublicKeyPem(pem), Algorithm::EdDSA) => {
                DecodingKey::from_ed_pem(pem.as_bytes())
                    .map_err(|e| ConfigError::InvalidKey(format!("invalid ed25519 public key pem: {e}")))?
            }
            (key, algorithm) => {
                return Err(ConfigError::InvalidKey(format!(
                    "{key:?} cannot be used with {algorithm:?}"
                )));
            }
        };

        // The built-in exp check is disabled: it treats `exp == now` as
        // valid, while this pipeline requires strictly `now < exp`. The
        // boundary is applied manually in `verify_at`.
        let mut validation = Validation::new(settings.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = Default::default();
        validation.leeway = 0;

        Ok(Self {
            algorithm: settings.algorithm,
            decoding_key,
            validation,
        })
    }

    /// Verify `token` against the wall clock.
    pub fn verify(&self, token: &str) -> Result<TokenClaimSet, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify `token` as of `now`.
    ///
    /// Pure in `(token, now)`: the same token at the same instant always
    /// yields the same claim set. Steps run in order and short-circuit:
    /// structural decode, signature + algorithm pin, strict expiry,
    /// required-claim presence.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaimSet, TokenError> {
        // Structural decode of the header; also the pin point for the
        // algorithm: the token's self-declared `alg` is compared against
        // the configured one and never trusted beyond that comparison.
        let header = decode_header(token).map_err(|_| TokenError::Malformed)?;
        if header.alg != self.algorithm {
            return Err(TokenError::AlgorithmMismatch);
        }

        let data = decode::<RawClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::AlgorithmMismatch
                }
                _ => TokenError::Malformed,
            }
        })?;
        let raw = data.claims;

        let exp = raw.exp.ok_or(TokenError::MissingClaims("exp"))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or(TokenError::Malformed)?;
        if now >= expires_at {
            return Err(TokenError::Expired);
        }

        let subject = raw
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(TokenError::MissingClaims("sub"))?;
        let user_key = raw
            .user_id
            .as_ref()
            .and_then(normalize_user_key)
            .ok_or(TokenError::MissingClaims("user_id"))?;
        let email = raw
            .email
            .filter(|s| !s.trim().is_empty())
            .ok_or(TokenError::MissingClaims("email"))?;
        let roles = raw
            .roles
            .and_then(RoleSet::new)
            .ok_or(TokenError::MissingClaims("roles"))?;

        Ok(TokenClaimSet {
            subject,
            user_key: UserKey(user_key),
            email,
            roles,
            expires_at,
            extra: raw.extra,
        })
    }
}

/// Accept string or numeric user keys; numbers normalize to their
/// decimal string form.
fn normalize_user_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret-material";

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(TokenVerifierSettings::hmac(Algorithm::HS256, SECRET)).unwrap()
    }

    fn mint(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn valid_claims(exp: i64) -> serde_json::Value {
        serde_json::json!({
            "sub": "42",
            "user_id": 42,
            "email": "a@b.com",
            "roles": ["ROLE_USER"],
            "exp": exp,
        })
    }

    #[test]
    fn accepts_valid_token_and_normalizes_numeric_key() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = mint(valid_claims(now.timestamp() + 3600));

        let claims = verifier().verify_at(&token, now).unwrap();
        assert_eq!(claims.subject, "42");
        assert_eq!(claims.user_key, UserKey::from("42"));
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.roles.as_slice(), ["ROLE_USER"]);
    }

    #[test]
    fn verification_is_idempotent() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = mint(valid_claims(now.timestamp() + 3600));
        let v = verifier();

        let first = v.verify_at(&token, now).unwrap();
        let second = v.verify_at(&token, now).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = mint(valid_claims(now.timestamp()));

        // exp == now must be rejected, not accepted with <=
        assert!(matches!(
            verifier().verify_at(&token, now),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = mint(valid_claims(now.timestamp() - 10));
        assert!(matches!(
            verifier().verify_at(&token, now),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn missing_required_claim_is_a_hard_failure() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut claims = valid_claims(now.timestamp() + 3600);
        claims.as_object_mut().unwrap().remove("email");
        let token = mint(claims);

        assert!(matches!(
            verifier().verify_at(&token, now),
            Err(TokenError::MissingClaims("email"))
        ));
    }

    #[test]
    fn empty_role_list_is_a_hard_failure() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut claims = valid_claims(now.timestamp() + 3600);
        claims["roles"] = serde_json::json!([]);
        let token = mint(claims);

        assert!(matches!(
            verifier().verify_at(&token, now),
            Err(TokenError::MissingClaims("roles"))
        ));
    }

    #[test]
    fn algorithm_is_pinned() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        // Validly signed under HS384 with the same secret, but the
        // verifier is pinned to HS256.
        let token = encode(
            &Header::new(Algorithm::HS384),
            &valid_claims(now.timestamp() + 3600),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(matches!(
            verifier().verify_at(&token, now),
            Err(TokenError::AlgorithmMismatch)
        ));
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &valid_claims(now.timestamp() + 3600),
            &EncodingKey::from_secret(b"other-secret"),
        )
        .unwrap();

        assert!(matches!(
            verifier().verify_at(&token, now),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(matches!(
            verifier().verify_at("not-a-token", now),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn preserves_extra_claims() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut claims = valid_claims(now.timestamp() + 3600);
        claims["tenant"] = serde_json::json!("acme");
        let token = mint(claims);

        let decoded = verifier().verify_at(&token, now).unwrap();
        assert_eq!(decoded.extra["tenant"], serde_json::json!("acme"));
    }

    #[test]
    fn hmac_secret_with_asymmetric_algorithm_is_a_config_error() {
        let settings = TokenVerifierSettings::hmac(Algorithm::RS256, SECRET);
        assert!(TokenVerifier::new(settings).is_err());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Badge checkers: password and CSRF verification.
//!
//! Both comparisons are constant-time — argon2 verification by
//! construction, CSRF comparison via `ring`.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Verifies a presented plaintext password against a stored hash.
pub trait PasswordChecker: Send + Sync {
    fn verify(&self, plaintext: &str, stored_hash: &str) -> bool;
}

/// Argon2id password checker over PHC-formatted hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2PasswordChecker;

impl PasswordChecker for Argon2PasswordChecker {
    fn verify(&self, plaintext: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            // An unparseable stored hash can never verify. No panic: a
            // corrupt record must read as "wrong password", not take the
            // request down.
            Err(_) => false,
        }
    }
}

/// Hash a plaintext password into PHC format (seeding, account
/// creation).
pub fn hash_password(plaintext: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)?
        .to_string())
}

/// Verifies a presented CSRF token against the session's expected one.
pub trait CsrfChecker: Send + Sync {
    fn verify(&self, presented: &str, expected: &str) -> bool;
}

/// Constant-time CSRF token comparison.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantTimeCsrfChecker;

impl CsrfChecker for ConstantTimeCsrfChecker {
    fn verify(&self, presented: &str, expected: &str) -> bool {
        ring::constant_time::verify_slices_are_equal(presented.as_bytes(), expected.as_bytes())
            .is_ok()
    }
}

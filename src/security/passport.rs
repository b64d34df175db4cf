// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The in-flight authentication attempt.

use thiserror::Error;

use super::badge::{Badge, BadgeKind};
use super::principal::Principal;

/// Structural misuse of a passport. These indicate a pipeline bug or an
/// authenticator constructing credentials wrongly, not end-user error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PassportError {
    #[error("a `{0}` badge is already present")]
    DuplicateBadgeKind(BadgeKind),

    #[error("passport is already resolved to a principal")]
    AlreadyResolved,

    #[error("no `{0}` badge present")]
    MissingBadge(BadgeKind),

    #[error("`{0}` badge was already consumed")]
    AlreadyConsumed(BadgeKind),
}

/// Request-scoped bundle of badges plus, once identity is confirmed, the
/// resolved principal.
///
/// A passport never survives past a single request and is never
/// persisted. Checkers take their badge via [`consume`](Self::consume),
/// which enforces that each badge kind is verified exactly once.
#[derive(Debug)]
pub struct Passport {
    badges: Vec<Badge>,
    consumed: Vec<BadgeKind>,
    principal: Option<Principal>,
}

impl Passport {
    pub fn new() -> Self {
        Self {
            badges: Vec::new(),
            consumed: Vec::new(),
            principal: None,
        }
    }

    /// Build a passport from initial badges.
    pub fn with_badges<I>(badges: I) -> Result<Self, PassportError>
    where
        I: IntoIterator<Item = Badge>,
    {
        let mut passport = Self::new();
        for badge in badges {
            passport.add_badge(badge)?;
        }
        Ok(passport)
    }

    /// Add one badge; at most one badge per kind.
    pub fn add_badge(&mut self, badge: Badge) -> Result<(), PassportError> {
        let kind = badge.kind();
        if self.badges.iter().any(|b| b.kind() == kind) {
            return Err(PassportError::DuplicateBadgeKind(kind));
        }
        self.badges.push(badge);
        Ok(())
    }

    /// A passport with zero badges is invalid and must be rejected by
    /// the pipeline before any checker runs.
    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }

    pub fn has(&self, kind: BadgeKind) -> bool {
        self.badges.iter().any(|b| b.kind() == kind)
    }

    /// Non-consuming peek, for checkers that only need to know a badge
    /// is present.
    pub fn badge(&self, kind: BadgeKind) -> Option<&Badge> {
        self.badges.iter().find(|b| b.kind() == kind)
    }

    /// Hand the badge of `kind` to its checker, exactly once.
    pub fn consume(&mut self, kind: BadgeKind) -> Result<&Badge, PassportError> {
        if self.consumed.contains(&kind) {
            return Err(PassportError::AlreadyConsumed(kind));
        }
        let badge = self
            .badges
            .iter()
            .find(|b| b.kind() == kind)
            .ok_or(PassportError::MissingBadge(kind))?;
        self.consumed.push(kind);
        Ok(badge)
    }

    /// Badge kinds present but not yet consumed by a checker.
    pub fn unconsumed(&self) -> Vec<BadgeKind> {
        self.badges
            .iter()
            .map(Badge::kind)
            .filter(|k| !self.consumed.contains(k))
            .collect()
    }

    /// Attach the confirmed identity. A passport resolves at most once.
    pub fn resolve(&mut self, principal: Principal) -> Result<(), PassportError> {
        if self.principal.is_some() {
            return Err(PassportError::AlreadyResolved);
        }
        self.principal = Some(principal);
        Ok(())
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Take the principal out, ending the passport's useful life.
    pub fn into_principal(self) -> Option<Principal> {
        self.principal
    }
}

impl Default for Passport {
    fn default() -> Self {
        Self::new()
    }
}

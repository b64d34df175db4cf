// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ordered role-based access rules.
//!
//! Rule order is authoritative and preserved exactly as declared: the
//! first matching rule governs, which lets operators put a narrow
//! anonymous carve-out in front of a broad role requirement. This is a
//! deliberate choice over "most specific wins".

use regex::Regex;

use super::principal::Principal;
use crate::error::ConfigError;
use crate::models::RoleSet;

/// Hard gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

/// What a matching rule requires of the requester.
#[derive(Debug, Clone)]
pub enum RequiredRoles {
    /// No authentication required.
    Anonymous,
    /// A principal holding at least one of these roles (OR semantics;
    /// conjunctions are expressed as dedicated role names).
    AnyOf(Vec<String>),
}

#[derive(Debug, Clone)]
enum CompiledTarget {
    Anonymous,
    AnyOf(RoleSet),
}

#[derive(Debug)]
struct CompiledRule {
    pattern: Regex,
    target: CompiledTarget,
}

/// What applies when no rule matches. Deny is the recommended default;
/// allow is an explicit opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    Deny,
    Allow,
}

/// The ordered rule list plus the fallback policy.
#[derive(Debug)]
pub struct AccessPolicy {
    rules: Vec<CompiledRule>,
    default_policy: DefaultPolicy,
}

/// Compile a path pattern, insisting on an explicit `^` anchor so
/// matching semantics are never implicit.
pub(crate) fn compile_anchored(pattern: &str) -> Result<Regex, ConfigError> {
    if !pattern.starts_with('^') {
        return Err(ConfigError::UnanchoredPattern {
            pattern: pattern.to_string(),
        });
    }
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source: Box::new(e),
    })
}

impl AccessPolicy {
    /// Compile declared rules, in order. Fatal on unanchored or invalid
    /// patterns and on empty role lists.
    pub fn build(
        rules: Vec<(String, RequiredRoles)>,
        default_policy: DefaultPolicy,
    ) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (pattern, target) in rules {
            let regex = compile_anchored(&pattern)?;
            let target = match target {
                RequiredRoles::Anonymous => CompiledTarget::Anonymous,
                RequiredRoles::AnyOf(roles) => {
                    let roles = RoleSet::new(roles)
                        .ok_or(ConfigError::EmptyRuleRoles { pattern })?;
                    CompiledTarget::AnyOf(roles)
                }
            };
            compiled.push(CompiledRule {
                pattern: regex,
                target,
            });
        }
        Ok(Self {
            rules: compiled,
            default_policy,
        })
    }

    /// First matching rule governs; no match falls back to the default
    /// policy. Runs after authentication resolution and before any
    /// application handler.
    pub fn evaluate(&self, path: &str, principal: Option<&Principal>) -> AccessDecision {
        for rule in &self.rules {
            if !rule.pattern.is_match(path) {
                continue;
            }
            return match &rule.target {
                CompiledTarget::Anonymous => AccessDecision::Allow,
                CompiledTarget::AnyOf(required) => match principal {
                    Some(principal)
                        if principal.roles().contains_any(required.iter()) =>
                    {
                        AccessDecision::Allow
                    }
                    _ => AccessDecision::Deny,
                },
            };
        }
        match self.default_policy {
            DefaultPolicy::Allow => AccessDecision::Allow,
            DefaultPolicy::Deny => AccessDecision::Deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserKey, UserRecord};

    fn principal_with(roles: &[&str]) -> Principal {
        Principal::Real(UserRecord {
            key: UserKey::from("u1"),
            identifier: "a@b.com".to_string(),
            password_hash: None,
            roles: RoleSet::new(roles.iter().copied()).unwrap(),
            display_name: None,
        })
    }

    fn policy() -> AccessPolicy {
        AccessPolicy::build(
            vec![
                ("^/login".to_string(), RequiredRoles::Anonymous),
                (
                    "^/admin".to_string(),
                    RequiredRoles::AnyOf(vec!["ROLE_ADMIN".to_string()]),
                ),
                (
                    "^/".to_string(),
                    RequiredRoles::AnyOf(vec!["ROLE_USER".to_string()]),
                ),
            ],
            DefaultPolicy::Deny,
        )
        .unwrap()
    }

    #[test]
    fn first_match_governs_in_declaration_order() {
        let policy = policy();

        // /admin/panel hits the admin rule before the catch-all
        assert_eq!(
            policy.evaluate("/admin/panel", Some(&principal_with(&["ROLE_USER"]))),
            AccessDecision::Deny
        );
        assert_eq!(
            policy.evaluate(
                "/admin/panel",
                Some(&principal_with(&["ROLE_ADMIN", "ROLE_USER"]))
            ),
            AccessDecision::Allow
        );
    }

    #[test]
    fn anonymous_rule_allows_without_principal() {
        assert_eq!(policy().evaluate("/login", None), AccessDecision::Allow);
    }

    #[test]
    fn role_rule_denies_anonymous() {
        assert_eq!(policy().evaluate("/dashboard", None), AccessDecision::Deny);
    }

    #[test]
    fn or_semantics_across_rule_roles() {
        let policy = AccessPolicy::build(
            vec![(
                "^/ops".to_string(),
                RequiredRoles::AnyOf(vec!["ROLE_ADMIN".to_string(), "ROLE_OPS".to_string()]),
            )],
            DefaultPolicy::Deny,
        )
        .unwrap();

        assert_eq!(
            policy.evaluate("/ops", Some(&principal_with(&["ROLE_OPS"]))),
            AccessDecision::Allow
        );
    }

    #[test]
    fn no_match_applies_default_policy() {
        let deny = AccessPolicy::build(vec![], DefaultPolicy::Deny).unwrap();
        assert_eq!(deny.evaluate("/anything", None), AccessDecision::Deny);

        let allow = AccessPolicy::build(vec![], DefaultPolicy::Allow).unwrap();
        assert_eq!(allow.evaluate("/anything", None), AccessDecision::Allow);
    }

    #[test]
    fn unanchored_pattern_is_fatal() {
        let result = AccessPolicy::build(
            vec![("/login".to_string(), RequiredRoles::Anonymous)],
            DefaultPolicy::Deny,
        );
        assert!(matches!(
            result,
            Err(ConfigError::UnanchoredPattern { .. })
        ));
    }

    #[test]
    fn empty_role_list_is_fatal() {
        let result = AccessPolicy::build(
            vec![("^/x".to_string(), RequiredRoles::AnyOf(vec![]))],
            DefaultPolicy::Deny,
        );
        assert!(matches!(result, Err(ConfigError::EmptyRuleRoles { .. })));
    }

    #[test]
    fn invalid_regex_is_fatal() {
        let result = AccessPolicy::build(
            vec![("^/([".to_string(), RequiredRoles::Anonymous)],
            DefaultPolicy::Deny,
        );
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy rules and verdicts.
//!
//! Rules are data, not code: a rule carries a condition *string* that can
//! be loaded from a config file at runtime. The string is parsed into a
//! [`PolicyCondition`] once, at registration time, never re-parsed per
//! evaluation. Malformed conditions parse to [`PolicyCondition::Unknown`],
//! which never matches; rule registration itself cannot fail.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::evidence::RetrievalResponse;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid rule set: {0}")]
    InvalidRuleSet(String),
}

/// Unique identifier for a policy rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome a matched rule applies to the decision in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVerdict {
    Allow,
    Deny,
    NeedsApproval,
}

impl fmt::Display for PolicyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyVerdict::Allow => write!(f, "allow"),
            PolicyVerdict::Deny => write!(f, "deny"),
            PolicyVerdict::NeedsApproval => write!(f, "needs_approval"),
        }
    }
}

/// Parsed form of a rule condition string.
///
/// Produced by [`PolicyCondition::parse`] exactly once per rule. The
/// supported grammar (first satisfied clause wins):
///
/// - `no_evidence`: the evidence result list is empty
/// - `contains:<regex>`: the query matches the regex, case-insensitive
/// - `min_score:<float>`: top evidence score is strictly below the threshold
/// - `context:<key>=<value>`: the context map's value for key equals value
///
/// Anything else (including a regex that fails to compile or an
/// unparsable threshold) becomes `Unknown` and never matches.
#[derive(Debug, Clone)]
pub enum PolicyCondition {
    NoEvidence,
    Contains(Regex),
    MinScore(f64),
    ContextEquals { key: String, value: String },
    Unknown(String),
}

impl PolicyCondition {
    pub fn parse(raw: &str) -> Self {
        let cond = raw.trim();

        if cond == "no_evidence" {
            return PolicyCondition::NoEvidence;
        }

        if let Some(pattern) = cond.strip_prefix("contains:") {
            return match RegexBuilder::new(pattern.trim())
                .case_insensitive(true)
                .build()
            {
                Ok(re) => PolicyCondition::Contains(re),
                Err(_) => PolicyCondition::Unknown(cond.to_string()),
            };
        }

        if let Some(threshold) = cond.strip_prefix("min_score:") {
            return match threshold.trim().parse::<f64>() {
                Ok(t) => PolicyCondition::MinScore(t),
                Err(_) => PolicyCondition::Unknown(cond.to_string()),
            };
        }

        if let Some(kv) = cond.strip_prefix("context:") {
            if let Some((key, value)) = kv.split_once('=') {
                return PolicyCondition::ContextEquals {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                };
            }
            return PolicyCondition::Unknown(cond.to_string());
        }

        PolicyCondition::Unknown(cond.to_string())
    }

    /// Evaluate the condition against a query, its evidence, and the
    /// caller-supplied context map. Never fails.
    pub fn matches(
        &self,
        query: &str,
        evidence: &RetrievalResponse,
        context: &HashMap<String, String>,
    ) -> bool {
        match self {
            PolicyCondition::NoEvidence => evidence.is_empty(),
            PolicyCondition::Contains(re) => re.is_match(query),
            PolicyCondition::MinScore(threshold) => evidence.top_score() < *threshold,
            PolicyCondition::ContextEquals { key, value } => {
                context.get(key).map(String::as_str) == Some(value.as_str())
            }
            PolicyCondition::Unknown(_) => false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, PolicyCondition::Unknown(_))
    }
}

/// One declarative policy rule. Duplicate names are permitted; each rule
/// is evaluated independently in registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub rule_id: RuleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Raw condition string, kept for audit presentation.
    #[serde(default)]
    pub condition: String,
    pub verdict: PolicyVerdict,
}

impl PolicyRule {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        condition: impl Into<String>,
        verdict: PolicyVerdict,
    ) -> Self {
        Self {
            rule_id: RuleId::new(),
            name: name.into(),
            description: description.into(),
            condition: condition.into(),
            verdict,
        }
    }
}

/// Outcome of evaluating one rule against one query. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub matched: bool,
    /// Verdict applied if matched; `Allow` for unmatched rules.
    pub verdict: PolicyVerdict,
    pub explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::evidence::RetrievalStrategy;

    fn no_evidence() -> RetrievalResponse {
        RetrievalResponse::empty("q", RetrievalStrategy::Hybrid)
    }

    #[test]
    fn parse_no_evidence() {
        let cond = PolicyCondition::parse("no_evidence");
        assert!(matches!(cond, PolicyCondition::NoEvidence));
        assert!(cond.matches("anything", &no_evidence(), &HashMap::new()));
    }

    #[test]
    fn parse_contains_is_case_insensitive() {
        let cond = PolicyCondition::parse("contains:delete|drop");
        assert!(cond.matches("Please DELETE the record", &no_evidence(), &HashMap::new()));
        assert!(!cond.matches("read the record", &no_evidence(), &HashMap::new()));
    }

    #[test]
    fn parse_malformed_regex_is_unknown() {
        let cond = PolicyCondition::parse("contains:([unclosed");
        assert!(cond.is_unknown());
        assert!(!cond.matches("([unclosed", &no_evidence(), &HashMap::new()));
    }

    #[test]
    fn parse_min_score_threshold() {
        let cond = PolicyCondition::parse("min_score:0.5");
        // Empty evidence defaults the top score to 0.0, which is below 0.5.
        assert!(cond.matches("q", &no_evidence(), &HashMap::new()));
    }

    #[test]
    fn parse_min_score_garbage_is_unknown() {
        assert!(PolicyCondition::parse("min_score:abc").is_unknown());
    }

    #[test]
    fn parse_context_equality() {
        let cond = PolicyCondition::parse("context:env=prod");
        let mut ctx = HashMap::new();
        ctx.insert("env".to_string(), "prod".to_string());
        assert!(cond.matches("q", &no_evidence(), &ctx));
        ctx.insert("env".to_string(), "dev".to_string());
        assert!(!cond.matches("q", &no_evidence(), &ctx));
    }

    #[test]
    fn parse_context_without_equals_is_unknown() {
        assert!(PolicyCondition::parse("context:env").is_unknown());
    }

    #[test]
    fn parse_unrecognized_prefix_is_unknown() {
        assert!(PolicyCondition::parse("whenever:full_moon").is_unknown());
    }
}

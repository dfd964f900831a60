// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PolicyEngine — Declarative Rules over Query + Evidence
//!
//! Holds an ordered set of [`PolicyRule`]s and evaluates every rule
//! against a query/evidence/context triple. Rules are data: they can be
//! appended at runtime or loaded from a YAML file, and their condition
//! strings are compiled to [`PolicyCondition`] once at registration.
//!
//! Registration order is significant only for audit presentation;
//! verdict aggregation is priority-based (see [`PolicyEngine::check_allowed`]).

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::domain::{
    AuditLayer, AuditSink, PolicyCondition, PolicyError, PolicyEvaluation, PolicyRule,
    PolicyVerdict, RetrievalResponse,
};

struct CompiledRule {
    rule: PolicyRule,
    condition: PolicyCondition,
}

/// Evaluates a set of policy rules against a query + evidence context.
pub struct PolicyEngine {
    audit: Arc<dyn AuditSink>,
    rules: RwLock<Vec<CompiledRule>>,
}

#[derive(Deserialize)]
struct RuleSetFile {
    rules: Vec<RuleSpec>,
}

#[derive(Deserialize)]
struct RuleSpec {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    condition: String,
    verdict: PolicyVerdict,
}

impl PolicyEngine {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Append a rule. Names need not be unique; duplicates are evaluated
    /// independently. A rule whose condition does not parse still
    /// registers; it simply never matches.
    pub fn add_rule(&self, rule: PolicyRule) {
        let condition = PolicyCondition::parse(&rule.condition);
        if condition.is_unknown() {
            warn!(
                rule = %rule.name,
                condition = %rule.condition,
                "Unrecognized policy condition; rule will never match"
            );
        }
        self.rules.write().push(CompiledRule { rule, condition });
    }

    /// Load a YAML rule set, registering rules in file order. Returns
    /// the number of rules added.
    pub fn load_rules_yaml(&self, yaml: &str) -> Result<usize, PolicyError> {
        let parsed: RuleSetFile =
            serde_yaml::from_str(yaml).map_err(|e| PolicyError::InvalidRuleSet(e.to_string()))?;
        let count = parsed.rules.len();
        for spec in parsed.rules {
            self.add_rule(PolicyRule::new(
                spec.name,
                spec.description,
                spec.condition,
                spec.verdict,
            ));
        }
        Ok(count)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    pub fn rules(&self) -> Vec<PolicyRule> {
        self.rules.read().iter().map(|c| c.rule.clone()).collect()
    }

    /// Evaluate all rules in registration order. One evaluation per
    /// rule; unmatched rules report `Allow` and contribute nothing to
    /// aggregation.
    pub fn evaluate(
        &self,
        query: &str,
        evidence: &RetrievalResponse,
        context: &HashMap<String, String>,
    ) -> Vec<PolicyEvaluation> {
        let rules = self.rules.read();

        let evaluations: Vec<PolicyEvaluation> = rules
            .iter()
            .map(|compiled| {
                let matched = compiled.condition.matches(query, evidence, context);
                PolicyEvaluation {
                    rule_id: compiled.rule.rule_id,
                    rule_name: compiled.rule.name.clone(),
                    matched,
                    verdict: if matched {
                        compiled.rule.verdict
                    } else {
                        PolicyVerdict::Allow
                    },
                    explanation: format!(
                        "Rule '{}' {}",
                        compiled.rule.name,
                        if matched { "matched" } else { "did not match" }
                    ),
                }
            })
            .collect();

        self.audit.record(
            AuditLayer::Reasoning,
            "policy_evaluation",
            json!({
                "query": query,
                "rules_checked": rules.len(),
                "rules_matched": evaluations.iter().filter(|e| e.matched).count(),
                "verdicts": evaluations
                    .iter()
                    .map(|e| e.verdict.to_string())
                    .collect::<Vec<_>>(),
            }),
            None,
            "system",
        );

        evaluations
    }

    /// Aggregate verdict, independent of registration order: any matched
    /// DENY wins over everything; else any matched NEEDS_APPROVAL; else
    /// ALLOW.
    pub fn check_allowed(&self, evaluations: &[PolicyEvaluation]) -> PolicyVerdict {
        if evaluations
            .iter()
            .any(|e| e.matched && e.verdict == PolicyVerdict::Deny)
        {
            return PolicyVerdict::Deny;
        }
        if evaluations
            .iter()
            .any(|e| e.matched && e.verdict == PolicyVerdict::NeedsApproval)
        {
            return PolicyVerdict::NeedsApproval;
        }
        PolicyVerdict::Allow
    }
}

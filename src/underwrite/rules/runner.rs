//! Rule runner - evaluates every rule of a rule set against one applicant

use super::context::build_context;
use super::loader::RuleSource;
use super::report::{EvaluationReport, RuleResult, DETAIL_FALSE, DETAIL_OK};
use super::types::{RuleDefinition, RuleSet};
use crate::sandbox::value::is_truthy;
use crate::sandbox::{EvalLimits, EvaluationContext, Sandbox, SandboxError};
use crate::underwrite::error::UnderwriteError;
use serde_json::Value;

/// Load -> build context -> evaluate each rule -> aggregate
///
/// A failing condition only fails its own rule; the report always holds one
/// result per rule, in declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleRunner {
    sandbox: Sandbox,
}

impl RuleRunner {
    pub fn new(limits: EvalLimits) -> Self {
        Self {
            sandbox: Sandbox::new(limits),
        }
    }

    /// Load the rule set from `source` and evaluate it against `payload`
    ///
    /// Only a load failure is returned as an error.
    pub fn evaluate_rules<S>(&self, payload: &Value, source: &S) -> Result<EvaluationReport, UnderwriteError>
    where
        S: RuleSource + ?Sized,
    {
        let rule_set = source.load_rule_set()?;
        Ok(self.evaluate_rule_set(payload, &rule_set))
    }

    /// Evaluate an already-loaded rule set against `payload`
    pub fn evaluate_rule_set(&self, payload: &Value, rule_set: &RuleSet) -> EvaluationReport {
        let ctx = build_context(payload);
        let results: Vec<RuleResult> = rule_set
            .rules
            .iter()
            .map(|rule| self.evaluate_rule(rule, &ctx))
            .collect();

        let report = EvaluationReport::new(rule_set.version.clone(), results);
        log::info!(
            "Rule set {}: {} passed, {} failed",
            report.rules_version,
            report.summary.passed,
            report.summary.failed
        );
        report
    }

    fn evaluate_rule(&self, rule: &RuleDefinition, ctx: &EvaluationContext) -> RuleResult {
        let (passed, detail) = match self.sandbox.evaluate(&rule.condition, ctx) {
            Ok(value) if is_truthy(&value) => (true, DETAIL_OK.to_string()),
            Ok(_) => (false, DETAIL_FALSE.to_string()),
            Err(e) => {
                log::warn!("Rule {} errored: {}", rule.id, e);
                (false, format!("Error: {}", e))
            }
        };
        log::debug!("Rule {} -> passed={}", rule.id, passed);

        RuleResult {
            id: rule.id.clone(),
            description: rule.description.clone(),
            severity: rule.severity.clone(),
            passed,
            detail,
        }
    }

    /// Parse every condition without evaluating anything
    ///
    /// Returns the id and parse error of each malformed rule.
    pub fn check_rule_set(&self, rule_set: &RuleSet) -> Vec<(String, SandboxError)> {
        rule_set
            .rules
            .iter()
            .filter_map(|rule| {
                self.sandbox
                    .parse(&rule.condition)
                    .err()
                    .map(|e| (rule.id.clone(), e))
            })
            .collect()
    }
}

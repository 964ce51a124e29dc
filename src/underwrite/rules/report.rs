// SPDX-License-Identifier: MIT

//! Evaluation report types

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

pub const DETAIL_OK: &str = "OK";
pub const DETAIL_FALSE: &str = "Condition evaluated to False";

/// Outcome of one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub id: String,
    pub description: String,
    pub severity: String,
    pub passed: bool,
    /// `OK`, `Condition evaluated to False`, or `Error: <cause>`
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn record(&mut self, passed: bool) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// Result of one evaluation run, one entry per rule in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rules_version: String,
    pub results: Vec<RuleResult>,
    pub summary: Summary,
}

impl EvaluationReport {
    /// Build a report, tallying the summary from the results
    pub fn new(rules_version: impl Into<String>, results: Vec<RuleResult>) -> Self {
        let mut summary = Summary::default();
        for result in &results {
            summary.record(result.passed);
        }
        Self {
            rules_version: rules_version.into(),
            results,
            summary,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// Results that did not pass, in declaration order
    pub fn failures(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Plain-text rendering for terminals and logs
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Rules Version: {}", self.rules_version);
        let _ = writeln!(
            out,
            "Passed: {}  |  Failed: {}",
            self.summary.passed, self.summary.failed
        );
        for item in &self.results {
            let badge = if item.passed { "✅" } else { "⚠️" };
            let _ = writeln!(out, "{} {} ({})", badge, item.id, item.severity);
            if !item.description.is_empty() {
                let _ = writeln!(out, "    {}", item.description);
            }
            let _ = writeln!(out, "    {}", item.detail);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, passed: bool, detail: &str) -> RuleResult {
        RuleResult {
            id: id.to_string(),
            description: format!("rule {}", id),
            severity: "warn".to_string(),
            passed,
            detail: detail.to_string(),
        }
    }

    #[test]
    fn test_summary_matches_results() {
        let report = EvaluationReport::new(
            "1.0.0",
            vec![
                result("R1", true, DETAIL_OK),
                result("R2", false, DETAIL_FALSE),
                result("R3", false, "Error: Unknown name: x"),
            ],
        );
        assert_eq!(report.summary, Summary { passed: 1, failed: 2 });
        assert_eq!(report.summary.total(), report.results.len());
        assert!(!report.all_passed());
        let failed: Vec<&str> = report.failures().map(|r| r.id.as_str()).collect();
        assert_eq!(failed, vec!["R2", "R3"]);
    }

    #[test]
    fn test_empty_report() {
        let report = EvaluationReport::new("0.0.0", Vec::new());
        assert_eq!(report.summary.total(), 0);
        assert!(report.all_passed());
    }

    #[test]
    fn test_json_field_names_and_order() {
        let report = EvaluationReport::new("1.0.0", vec![result("R1", true, DETAIL_OK)]);
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"rules_version":"1.0.0","results":[{"id":"R1","description":"rule R1","severity":"warn","passed":true,"detail":"OK"}],"summary":{"passed":1,"failed":0}}"#
        );
    }

    #[test]
    fn test_render_text() {
        let mut quiet = result("R2", false, DETAIL_FALSE);
        quiet.description.clear();
        let report = EvaluationReport::new("2.0", vec![result("R1", true, DETAIL_OK), quiet]);
        let text = report.render_text();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Rules Version: 2.0");
        assert_eq!(lines[1], "Passed: 1  |  Failed: 1");
        assert_eq!(lines[2], "✅ R1 (warn)");
        assert_eq!(lines[3], "    rule R1");
        assert_eq!(lines[4], "    OK");
        assert_eq!(lines[5], "⚠️ R2 (warn)");
        assert_eq!(lines[6], "    Condition evaluated to False");
        assert_eq!(lines.len(), 7);
    }
}

use crate::ids::DATA_ROOT;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Rule kind, inferred from the rule's declared name.
///
/// `warn` rules produce warnings; `deny`, `violation`, and `fail` rules produce failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Warn,
    Deny,
    Violation,
    Fail,
}

impl RuleKind {
    pub const ALL: [RuleKind; 4] = [
        RuleKind::Warn,
        RuleKind::Deny,
        RuleKind::Violation,
        RuleKind::Fail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Warn => "warn",
            RuleKind::Deny => "deny",
            RuleKind::Violation => "violation",
            RuleKind::Fail => "fail",
        }
    }

    pub fn is_warning(self) -> bool {
        self == RuleKind::Warn
    }

    pub fn is_failure(self) -> bool {
        !self.is_warning()
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule discovered in a namespace, enriched with its annotation (if any).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    pub namespace: String,
    pub kind: RuleKind,
    /// Rule name without its kind prefix. Empty for bare `deny`, `warn`, etc.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form `custom` annotation fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, JsonValue>,
}

impl Rule {
    pub fn new(namespace: impl Into<String>, kind: RuleKind, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            id: id.into(),
            title: None,
            description: None,
            custom: BTreeMap::new(),
        }
    }

    /// Declared rule name: `<kind>_<id>`, or just `<kind>` when the id is empty.
    pub fn name(&self) -> String {
        if self.id.is_empty() {
            self.kind.as_str().to_string()
        } else {
            format!("{}_{}", self.kind, self.id)
        }
    }

    /// Identifier used to key rules and results in a [`Report`].
    pub fn uid(&self) -> String {
        format!("{}.{}", self.namespace, self.name())
    }

    /// Fully-qualified query evaluated for this rule.
    pub fn query(&self) -> String {
        format!("{DATA_ROOT}.{}", self.uid())
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uid())
    }
}

/// Outcome of evaluating one rule's query against one input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleResult {
    /// [`Rule::uid`] of the evaluated rule.
    pub rule: String,
    /// Exact query string that was executed.
    pub query: String,
    /// True iff the query produced an empty result set.
    pub passed: bool,
}

/// Rules and results of one check, keyed by rule uid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub rules: BTreeMap<String, Rule>,
    pub results: BTreeMap<String, RuleResult>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. A rule with the same uid replaces the previous one.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.insert(rule.uid(), rule);
    }

    pub fn add_result(&mut self, result: RuleResult) {
        self.results.insert(result.rule.clone(), result);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.results.is_empty()
    }

    /// Rules whose result did not pass, in uid order.
    pub fn failed_rules(&self) -> impl Iterator<Item = &Rule> {
        self.results
            .values()
            .filter(|r| !r.passed)
            .filter_map(|r| self.rules.get(&r.rule))
    }

    pub fn failure_count(&self) -> u32 {
        self.failed_rules().filter(|r| r.kind.is_failure()).count() as u32
    }

    pub fn warning_count(&self) -> u32 {
        self.failed_rules().filter(|r| r.kind.is_warning()).count() as u32
    }

    pub fn passed_count(&self) -> u32 {
        self.results.values().filter(|r| r.passed).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_name_and_query_follow_kind_id_convention() {
        let rule = Rule::new("org.repo", RuleKind::Deny, "missing_license");
        assert_eq!(rule.name(), "deny_missing_license");
        assert_eq!(rule.uid(), "org.repo.deny_missing_license");
        assert_eq!(rule.query(), "data.org.repo.deny_missing_license");

        let bare = Rule::new("org.repo", RuleKind::Warn, "");
        assert_eq!(bare.name(), "warn");
        assert_eq!(bare.query(), "data.org.repo.warn");
    }

    #[test]
    fn counts_split_failures_and_warnings() {
        let mut report = Report::new();
        for (kind, id, passed) in [
            (RuleKind::Deny, "a", false),
            (RuleKind::Violation, "b", true),
            (RuleKind::Warn, "c", false),
        ] {
            let rule = Rule::new("ns", kind, id);
            report.add_result(RuleResult {
                rule: rule.uid(),
                query: rule.query(),
                passed,
            });
            report.add_rule(rule);
        }

        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.passed_count(), 1);
    }

    #[test]
    fn kind_serializes_lowercase() {
        let v = serde_json::to_value(RuleKind::Violation).expect("serialize");
        assert_eq!(v, "violation");
        assert!(RuleKind::Warn.is_warning());
        assert!(RuleKind::Fail.is_failure());
    }
}

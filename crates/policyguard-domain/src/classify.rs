//! Rule kind classification from declared rule names.

use policyguard_types::RuleKind;
use regex::Regex;
use std::sync::LazyLock;

static WARNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^warn(_[a-zA-Z0-9]+)*$").expect("valid warning pattern"));

static FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(deny|violation|fail)(_[a-zA-Z0-9]+)*$").expect("valid failure pattern")
});

pub fn is_warning(name: &str) -> bool {
    WARNING.is_match(name)
}

pub fn is_failure(name: &str) -> bool {
    FAILURE.is_match(name)
}

/// Kind of a rule name, or `None` when the rule is not a check.
pub fn classify(name: &str) -> Option<RuleKind> {
    if is_warning(name) {
        return Some(RuleKind::Warn);
    }
    if !is_failure(name) {
        return None;
    }
    match name.split('_').next() {
        Some("deny") => Some(RuleKind::Deny),
        Some("violation") => Some(RuleKind::Violation),
        Some("fail") => Some(RuleKind::Fail),
        _ => None,
    }
}

/// Strip the kind prefix from a rule name: `deny_missing_license` -> `missing_license`,
/// `deny` -> ``. Names without a kind prefix are returned unchanged.
pub fn remove_rule_prefix(name: &str) -> &str {
    for kind in RuleKind::ALL {
        let prefix = kind.as_str();
        if name == prefix {
            return "";
        }
        if let Some(rest) = name.strip_prefix(prefix)
            && let Some(id) = rest.strip_prefix('_')
        {
            return id;
        }
    }
    name
}

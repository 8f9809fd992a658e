//! Rule discovery: which checks a namespace declares.

use crate::classify::{classify, remove_rule_prefix};
use crate::model::Module;
use policyguard_types::{Report, Rule};
use std::collections::HashSet;

/// Discover every check rule declared in `namespace` across `modules`.
///
/// Only modules whose namespace equals `namespace` exactly contribute. Rules whose names are
/// not checks are skipped. The returned report has rules and no results.
pub fn discover<'a>(namespace: &str, modules: impl IntoIterator<Item = &'a Module>) -> Report {
    let mut report = Report::new();

    for module in modules {
        if module.namespace() != namespace {
            continue;
        }
        for decl in &module.rules {
            let Some(kind) = classify(&decl.name) else {
                continue;
            };
            let mut rule = Rule::new(namespace, kind, remove_rule_prefix(&decl.name));
            if let Some(a) = module.rule_annotation(&decl.path) {
                rule.title = a.title.clone();
                rule.description = a.description.clone();
                rule.custom = a.custom.clone();
            }
            report.add_rule(rule);
        }
    }

    report
}

/// Namespaces declared by `modules`, in iteration order.
///
/// Deduplicated case-insensitively; the first spelling seen is kept.
pub fn namespaces<'a>(modules: impl IntoIterator<Item = &'a Module>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for module in modules {
        let ns = module.namespace();
        if seen.insert(ns.to_lowercase()) {
            out.push(ns.to_string());
        }
    }
    out
}

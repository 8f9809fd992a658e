use policyguard_types::{ModulePath, ids};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// Where an annotation applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationScope {
    Rule,
    Document,
    Package,
    Subpackages,
}

impl AnnotationScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ids::SCOPE_RULE => Some(AnnotationScope::Rule),
            ids::SCOPE_DOCUMENT => Some(AnnotationScope::Document),
            ids::SCOPE_PACKAGE => Some(AnnotationScope::Package),
            ids::SCOPE_SUBPACKAGES => Some(AnnotationScope::Subpackages),
            _ => None,
        }
    }
}

/// Metadata attached to a rule or a package.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub scope: AnnotationScope,
    /// Path of the rule or package this annotation documents (e.g. `data.org.deny_x`).
    pub target: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub custom: BTreeMap<String, JsonValue>,
}

/// A rule declared in a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleDecl {
    pub name: String,
    /// Fully-qualified rule path (`<package>.<name>`).
    pub path: String,
    pub line: u32,
}

/// A parsed rule module. Immutable once built.
#[derive(Clone, Debug)]
pub struct Module {
    pub path: ModulePath,
    /// Package path including the data root, e.g. `data.org.repo`.
    pub package: String,
    pub rules: Vec<RuleDecl>,
    pub annotations: Vec<Annotation>,
    pub source: String,

    /// Rule-scoped target path -> index into `annotations`.
    rule_annotations: HashMap<String, usize>,
}

impl Module {
    pub fn new(
        path: ModulePath,
        package: String,
        rules: Vec<RuleDecl>,
        annotations: Vec<Annotation>,
        source: String,
    ) -> Self {
        // Later annotations overwrite earlier ones: the last match wins.
        let rule_annotations = annotations
            .iter()
            .enumerate()
            .filter(|(_, a)| a.scope == AnnotationScope::Rule)
            .map(|(i, a)| (a.target.clone(), i))
            .collect();

        Self {
            path,
            package,
            rules,
            annotations,
            source,
            rule_annotations,
        }
    }

    /// Package path with the data root removed.
    pub fn namespace(&self) -> &str {
        namespace_of(&self.package)
    }

    /// Rule-scoped annotation whose target equals `rule_path`.
    pub fn rule_annotation(&self, rule_path: &str) -> Option<&Annotation> {
        self.rule_annotations
            .get(rule_path)
            .map(|&i| &self.annotations[i])
    }
}

/// Strip the `data.` root from a package path.
pub fn namespace_of(package: &str) -> &str {
    package
        .strip_prefix(ids::DATA_ROOT)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(scope: AnnotationScope, target: &str, title: &str) -> Annotation {
        Annotation {
            scope,
            target: target.to_string(),
            title: Some(title.to_string()),
            description: None,
            custom: BTreeMap::new(),
        }
    }

    #[test]
    fn namespace_strips_only_the_data_root() {
        assert_eq!(namespace_of("data.org.repo"), "org.repo");
        // A package that merely starts with the letters of the root keeps them.
        assert_eq!(namespace_of("data.data_checks"), "data_checks");
        assert_eq!(namespace_of("database"), "database");
    }

    #[test]
    fn rule_annotation_index_prefers_last_match_and_ignores_other_scopes() {
        let module = Module::new(
            ModulePath::new("a.rego"),
            "data.a".to_string(),
            Vec::new(),
            vec![
                annotation(AnnotationScope::Rule, "data.a.deny_x", "first"),
                annotation(AnnotationScope::Package, "data.a.deny_y", "package"),
                annotation(AnnotationScope::Rule, "data.a.deny_x", "second"),
            ],
            String::new(),
        );

        let got = module.rule_annotation("data.a.deny_x").expect("annotation");
        assert_eq!(got.title.as_deref(), Some("second"));
        assert!(module.rule_annotation("data.a.deny_y").is_none());
    }
}

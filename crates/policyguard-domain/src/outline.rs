//! Module outline scanner.
//!
//! Extracts what rule discovery needs from a Rego module without evaluating it: the
//! `package` clause, top-level rule heads, and `# METADATA` annotation blocks. Everything
//! else (rule bodies, imports, expressions) is left to the evaluation engine.
//!
//! Engines that parse Rego themselves still take annotations from here, since METADATA
//! blocks are comments to them. Scripted backends and fuzzing use the full outline.

use crate::error::ParseError;
use crate::model::{Annotation, AnnotationScope, Module, RuleDecl};
use policyguard_types::{ModulePath, ids};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

const METADATA_MARKER: &str = "# METADATA";

/// Keywords that can open a top-level line without declaring a rule.
const CONTINUATION_KEYWORDS: &[&str] = &["else"];

/// YAML payload of a `# METADATA` block. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
struct MetadataBlock {
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    custom: BTreeMap<String, JsonValue>,
}

struct PendingMetadata {
    line: u32,
    block: MetadataBlock,
}

/// Brace/string state carried across lines.
#[derive(Default)]
struct Nesting {
    depth: i64,
    in_raw_string: bool,
}

impl Nesting {
    /// Advance over one line. Returns false if a closing delimiter has no opener.
    fn scan(&mut self, line: &str) -> bool {
        let mut in_string = false;
        let mut escaped = false;
        for c in line.chars() {
            if self.in_raw_string {
                if c == '`' {
                    self.in_raw_string = false;
                }
                continue;
            }
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '#' => break,
                '"' => in_string = true,
                '`' => self.in_raw_string = true,
                '{' | '[' | '(' => self.depth += 1,
                '}' | ']' | ')' => {
                    self.depth -= 1;
                    if self.depth < 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        true
    }

    fn at_top_level(&self) -> bool {
        self.depth == 0 && !self.in_raw_string
    }
}

/// Parse the outline of a Rego module.
pub fn parse_module(path: &ModulePath, source: &str) -> Result<Module, ParseError> {
    let err = |line: u32, message: String| ParseError {
        path: path.as_str().to_string(),
        line,
        message,
    };

    let mut package: Option<String> = None;
    let mut rules: Vec<RuleDecl> = Vec::new();
    let mut seen_rules: BTreeSet<String> = BTreeSet::new();
    let mut annotations: Vec<Annotation> = Vec::new();

    let mut nesting = Nesting::default();
    let mut collecting: Option<(u32, Vec<String>)> = None;
    let mut pending: Option<PendingMetadata> = None;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx as u32 + 1;

        if nesting.at_top_level() {
            let trimmed = raw_line.trim();

            if let Some((start, lines)) = collecting.as_mut() {
                if let Some(comment) = trimmed.strip_prefix('#') {
                    lines.push(comment.strip_prefix(' ').unwrap_or(comment).to_string());
                    continue;
                }
                let start = *start;
                let text = lines.join("\n");
                collecting = None;
                let block = parse_metadata(&text).map_err(|m| err(start, m))?;
                pending = Some(PendingMetadata { line: start, block });
            }

            if trimmed == METADATA_MARKER {
                if let Some(p) = &pending {
                    return Err(err(p.line, "METADATA block is not attached to a statement".into()));
                }
                collecting = Some((line_no, Vec::new()));
                continue;
            }

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("package ") {
                if package.is_some() {
                    return Err(err(line_no, "duplicate package clause".into()));
                }
                let name = strip_comment(rest).trim();
                if name.is_empty() {
                    return Err(err(line_no, "empty package clause".into()));
                }
                let pkg = format!("{}.{name}", ids::DATA_ROOT);
                if let Some(p) = pending.take() {
                    let line = p.line;
                    let a = annotation(p, AnnotationScope::Package, &pkg, &pkg)
                        .map_err(|m| err(line, m))?;
                    annotations.push(a);
                }
                package = Some(pkg);
            } else if trimmed.starts_with("import ") {
                if let Some(p) = pending.take() {
                    return Err(err(p.line, "METADATA block must precede a package or rule".into()));
                }
            } else {
                let Some(pkg) = package.as_deref() else {
                    return Err(err(line_no, "expected package clause before rules".into()));
                };
                if let Some(name) = rule_name(trimmed) {
                    let rule_path = format!("{pkg}.{name}");
                    if let Some(p) = pending.take() {
                        let line = p.line;
                        let a = annotation(p, AnnotationScope::Rule, &rule_path, pkg)
                            .map_err(|m| err(line, m))?;
                        annotations.push(a);
                    }
                    if seen_rules.insert(name.to_string()) {
                        rules.push(RuleDecl {
                            name: name.to_string(),
                            path: rule_path,
                            line: line_no,
                        });
                    }
                }
            }
        }

        if !nesting.scan(raw_line) {
            return Err(err(line_no, "unbalanced closing delimiter".into()));
        }
    }

    let last_line = source.lines().count() as u32;
    if nesting.in_raw_string {
        return Err(err(last_line, "unterminated raw string".into()));
    }
    if nesting.depth != 0 {
        return Err(err(last_line, "unexpected end of module: unclosed delimiter".into()));
    }
    if let Some((start, _)) = collecting {
        return Err(err(start, "METADATA block is not attached to a statement".into()));
    }
    if let Some(p) = pending {
        return Err(err(p.line, "METADATA block is not attached to a statement".into()));
    }
    let Some(package) = package else {
        return Err(err(1, "missing package clause".into()));
    };

    Ok(Module::new(
        path.clone(),
        package,
        rules,
        annotations,
        source.to_string(),
    ))
}

fn parse_metadata(text: &str) -> Result<MetadataBlock, String> {
    if text.trim().is_empty() {
        return Ok(MetadataBlock::default());
    }
    serde_yaml::from_str(text).map_err(|e| format!("invalid METADATA yaml: {e}"))
}

/// Build an annotation for the statement that follows a METADATA block.
///
/// `statement_path` is the rule or package path, `package` the enclosing package path.
fn annotation(
    pending: PendingMetadata,
    default_scope: AnnotationScope,
    statement_path: &str,
    package: &str,
) -> Result<Annotation, String> {
    let block = pending.block;
    let scope = match block.scope.as_deref() {
        None => default_scope,
        Some(s) => {
            AnnotationScope::parse(s).ok_or_else(|| format!("unknown annotation scope: {s}"))?
        }
    };
    let target = match scope {
        AnnotationScope::Rule | AnnotationScope::Document => statement_path,
        AnnotationScope::Package | AnnotationScope::Subpackages => package,
    };
    Ok(Annotation {
        scope,
        target: target.to_string(),
        title: block.title,
        description: block.description,
        custom: block.custom,
    })
}

/// Name declared by a top-level rule head, e.g. `deny_x` for `deny_x if {` or
/// `default allow := false`.
fn rule_name(head: &str) -> Option<&str> {
    let head = match head.strip_prefix("default ") {
        Some(rest) => rest.trim_start(),
        None => head,
    };
    let end = head
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(head.len());
    let name = &head[..end];
    if CONTINUATION_KEYWORDS.contains(&name) {
        return None;
    }
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_ok.then_some(name)
}

fn strip_comment(s: &str) -> &str {
    match s.find('#') {
        Some(i) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<Module, ParseError> {
        parse_module(&ModulePath::new("policy/test.rego"), src)
    }

    #[test]
    fn extracts_package_rules_and_rule_annotations() {
        let src = r#"# METADATA
# title: Repository policies
package org.repo

import rego.v1

# METADATA
# title: License is required
# description: Every repository must declare a license.
# custom:
#   severity: high
#   tags: [legal]
deny_missing_license if {
	not input.license
	msg := sprintf("%s has no license", [input.name])
}

warn_stale if input.pushed_days > 365

default allow := false

deny_missing_license if {
	input.license == ""
}
"#;
        let module = parse(src).expect("parse");
        assert_eq!(module.package, "data.org.repo");
        assert_eq!(module.namespace(), "org.repo");

        let names: Vec<&str> = module.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["deny_missing_license", "warn_stale", "allow"]);
        assert_eq!(module.rules[0].path, "data.org.repo.deny_missing_license");
        assert_eq!(module.rules[0].line, 13);

        assert_eq!(module.annotations.len(), 2);
        assert_eq!(module.annotations[0].scope, AnnotationScope::Package);
        assert_eq!(module.annotations[0].target, "data.org.repo");

        let a = module
            .rule_annotation("data.org.repo.deny_missing_license")
            .expect("rule annotation");
        assert_eq!(a.title.as_deref(), Some("License is required"));
        assert_eq!(
            a.description.as_deref(),
            Some("Every repository must declare a license.")
        );
        assert_eq!(a.custom["severity"], "high");
        assert_eq!(a.custom["tags"][0], "legal");
    }

    #[test]
    fn braces_in_strings_and_comments_do_not_affect_nesting() {
        let src = "package a\n\ndeny_x if {\n\tmsg := \"}{\" # }\n\tx := `{\n}`\n}\n\nwarn_y := true\n";
        let module = parse(src).expect("parse");
        let names: Vec<&str> = module.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["deny_x", "warn_y"]);
    }

    #[test]
    fn indented_top_level_heads_are_rules() {
        let src = "package a\n\n  deny_indented if {\n    input.x\n  }\n\n\twarn_tabbed := true\n";
        let module = parse(src).expect("parse");
        let names: Vec<&str> = module.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["deny_indented", "warn_tabbed"]);
        assert_eq!(module.rules[0].line, 3);
    }

    #[test]
    fn else_branches_are_not_rules() {
        let src = "package a\n\nallow := true if {\n\tinput.ok\n}\nelse := false if {\n\tinput.maybe\n}\n  else := false\n";
        let module = parse(src).expect("parse");
        let names: Vec<&str> = module.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["allow"]);
    }

    #[test]
    fn explicit_scope_overrides_default() {
        let src = "package a\n\n# METADATA\n# scope: package\n# title: pkg\ndeny_x := true\n";
        let module = parse(src).expect("parse");
        assert_eq!(module.annotations[0].scope, AnnotationScope::Package);
        assert_eq!(module.annotations[0].target, "data.a");
        assert!(module.rule_annotation("data.a.deny_x").is_none());
    }

    #[test]
    fn missing_package_is_an_error() {
        let err = parse("deny := true\n").unwrap_err();
        assert!(err.message.contains("package"));
        assert_eq!(err.path, "policy/test.rego");

        let err = parse("# just a comment\n").unwrap_err();
        assert!(err.message.contains("missing package"));
    }

    #[test]
    fn unbalanced_braces_are_errors() {
        let err = parse("package a\n\ndeny if {\n  true\n").unwrap_err();
        assert!(err.message.contains("unclosed"));

        let err = parse("package a\n}\n").unwrap_err();
        assert!(err.message.contains("unbalanced"));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn dangling_or_invalid_metadata_is_an_error() {
        let err = parse("package a\n\n# METADATA\n# title: x\n").unwrap_err();
        assert!(err.message.contains("not attached"));

        let err = parse("package a\n# METADATA\n# title: [unclosed\ndeny := true\n").unwrap_err();
        assert!(err.message.contains("invalid METADATA"));

        let err = parse("package a\n# METADATA\n# scope: galaxy\ndeny := true\n").unwrap_err();
        assert!(err.message.contains("unknown annotation scope"));
    }

    #[test]
    fn rule_name_handles_head_shapes() {
        assert_eq!(rule_name("deny[msg] {"), Some("deny"));
        assert_eq!(rule_name("deny contains msg if {"), Some("deny"));
        assert_eq!(rule_name("default allow := false"), Some("allow"));
        assert_eq!(rule_name("f(x) := y if {"), Some("f"));
        assert_eq!(rule_name("} else := 1"), None);
        assert_eq!(rule_name("else := 1 if {"), None);
        assert_eq!(rule_name("1 == 1"), None);
    }
}

//! Rule heads from the interpreter's JSON AST.
//!
//! The AST is the serde rendering of the interpreter's own syntax tree. Enum nodes are
//! externally tagged (`{"Spec": {...}}`), and a rule head's `refr` is the reference the rule
//! defines. Only the leftmost variable of that reference is needed.

use serde_json::Value as JsonValue;

/// A rule head as the interpreter parsed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclaredRule {
    pub name: String,
    pub line: Option<u32>,
}

/// Rule heads of every module in `ast`, in declaration order.
pub fn declared_rules(ast: &str) -> Result<Vec<DeclaredRule>, String> {
    let ast: JsonValue = serde_json::from_str(ast).map_err(|e| format!("decode ast: {e}"))?;
    let modules = match &ast {
        JsonValue::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };

    let mut rules = Vec::new();
    for module in modules {
        let module = module.get("ast").unwrap_or(module);
        let Some(policy) = module.get("policy").and_then(JsonValue::as_array) else {
            continue;
        };
        rules.extend(policy.iter().filter_map(rule_head));
    }
    Ok(rules)
}

fn rule_head(rule: &JsonValue) -> Option<DeclaredRule> {
    let rule = untag(rule).1;
    let (head, refr) = match rule.get("head") {
        Some(head) => {
            let head = untag(head).1;
            (head, head.get("refr")?)
        }
        // `default` rules carry the reference directly.
        None => (rule, rule.get("refr")?),
    };
    Some(DeclaredRule {
        name: base_var(refr)?,
        line: span_line(head).or_else(|| span_line(rule)),
    })
}

/// Split `{"Tag": payload}` into its parts. Other values come back untouched.
fn untag(value: &JsonValue) -> (Option<&str>, &JsonValue) {
    if let Some(map) = value.as_object()
        && map.len() == 1
        && let Some((tag, payload)) = map.iter().next()
        && tag.starts_with(|c: char| c.is_ascii_uppercase())
    {
        return (Some(tag.as_str()), payload);
    }
    (None, value)
}

fn base_var(expr: &JsonValue) -> Option<String> {
    match untag(expr) {
        (Some("Var"), payload) => var_name(payload),
        (Some("RefDot" | "RefBrack"), payload) => base_var(payload.get("refr")?),
        _ => None,
    }
}

/// Name carried by a `Var` node: a bare string, a `(span, value)` pair, or a struct with a
/// `value` or `text` field.
fn var_name(payload: &JsonValue) -> Option<String> {
    match payload {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => items.iter().rev().find_map(var_name),
        JsonValue::Object(map) => ["value", "text", "name"]
            .iter()
            .find_map(|k| map.get(*k).and_then(JsonValue::as_str))
            .map(str::to_string)
            .or_else(|| map.get("span").and_then(var_name)),
        _ => None,
    }
}

fn span_line(node: &JsonValue) -> Option<u32> {
    let line = node.get("span")?.get("line")?.as_u64()?;
    u32::try_from(line).ok()
}

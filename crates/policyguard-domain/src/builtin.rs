//! Host functions callable from rule bodies.

use crate::error::BuiltinError;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

pub type BuiltinResult = Result<JsonValue, Box<dyn std::error::Error + Send + Sync>>;

/// A named function with a fixed number of positional JSON arguments.
pub trait Builtin: Send + Sync {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    /// Identical calls within one evaluation may be served from a single invocation.
    fn memoize(&self) -> bool {
        false
    }

    fn call(&self, args: &[JsonValue]) -> BuiltinResult;
}

type MemoKey = (String, String);

/// Builtins available to an engine, plus the per-evaluation memo.
///
/// Clones share the registered builtins and the memo, so a backend can hand a clone to
/// callbacks that outlive one borrow.
#[derive(Clone, Default)]
pub struct BuiltinRegistry {
    builtins: BTreeMap<String, Arc<dyn Builtin>>,
    memo: Arc<Mutex<HashMap<MemoKey, JsonValue>>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builtin. A builtin with the same name is replaced.
    pub fn register(&mut self, builtin: Arc<dyn Builtin>) {
        self.builtins.insert(builtin.name().to_string(), builtin);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Builtin>> {
        self.builtins.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builtins.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    /// Drop memoized results. Called before every query evaluation.
    pub fn begin_evaluation(&self) {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Invoke `name` with `args`, honoring memoization. Failed calls are never memoized.
    pub fn call(&self, name: &str, args: &[JsonValue]) -> Result<JsonValue, BuiltinError> {
        let builtin = self
            .builtins
            .get(name)
            .ok_or_else(|| BuiltinError::new(name, "unknown builtin"))?;

        if args.len() != builtin.arity() {
            return Err(BuiltinError::new(
                name,
                format!(
                    "expected {} arguments, got {}",
                    builtin.arity(),
                    args.len()
                ),
            ));
        }

        if !builtin.memoize() {
            return builtin.call(args).map_err(|e| BuiltinError::new(name, e));
        }

        let key = (name.to_string(), canonical_args(args));
        if let Some(hit) = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            tracing::debug!(builtin = name, "memoized builtin result");
            return Ok(hit.clone());
        }

        let value = builtin.call(args).map_err(|e| BuiltinError::new(name, e))?;
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.clone());
        Ok(value)
    }
}

impl std::fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("builtins", &self.builtins.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// JSON text of `args` with object keys sorted at every depth.
fn canonical_args(args: &[JsonValue]) -> String {
    let mut out = String::new();
    out.push('[');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_canonical(&mut out, arg);
    }
    out.push(']');
    out
}

fn write_canonical(out: &mut String, value: &JsonValue) {
    match value {
        JsonValue::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", JsonValue::String(k.clone()));
                write_canonical(out, v);
            }
            out.push('}');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, v);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

use crate::builtin::{Builtin, BuiltinResult};
use crate::model::Module;
use crate::outline;
use policyguard_types::ModulePath;
use serde_json::{Value as JsonValue, json};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn module(path: &str, source: &str) -> Module {
    outline::parse_module(&ModulePath::new(path), source).expect("test module parses")
}

/// Two-argument builtin that echoes its arguments and counts invocations.
/// A first argument of `"fail"` makes the call fail.
pub struct CountingBuiltin {
    name: String,
    memoize: bool,
    calls: AtomicUsize,
}

impl CountingBuiltin {
    pub fn new(name: &str, memoize: bool) -> Self {
        Self {
            name: name.to_string(),
            memoize,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Builtin for CountingBuiltin {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        2
    }

    fn memoize(&self) -> bool {
        self.memoize
    }

    fn call(&self, args: &[JsonValue]) -> BuiltinResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if args[0] == "fail" {
            return Err("asked to fail".into());
        }
        Ok(json!({ "args": args }))
    }
}

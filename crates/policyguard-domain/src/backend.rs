//! The seam between policyguard and a Rego evaluation engine.

use crate::builtin::BuiltinRegistry;
use crate::error::{CompileErrors, EvalError, ParseError};
use crate::model::Module;
use policyguard_types::ModulePath;
use serde_json::Value as JsonValue;

/// Values produced by one query. Empty means the rule did not trigger.
pub type ResultSet = Vec<JsonValue>;

/// An evaluation engine able to compile rule modules and run queries against them.
///
/// A compiled program is read-only and may be shared across threads.
pub trait Backend: Send + Sync {
    /// Compiled, query-ready form of a module set.
    type Program: Send + Sync;

    /// Parse one module with the engine's own parser.
    fn parse_module(&self, path: &ModulePath, source: &str) -> Result<Module, ParseError>;

    /// Whether rule bodies can call host builtins from a [`BuiltinRegistry`].
    fn supports_builtins(&self) -> bool {
        false
    }

    /// Compile every module into one program. All diagnostics are reported together.
    ///
    /// `builtins` lists the host functions rule bodies may call.
    fn compile(
        &self,
        modules: &[&Module],
        builtins: &BuiltinRegistry,
    ) -> Result<Self::Program, CompileErrors>;

    /// Evaluate `query` against `input`. Builtin calls are served from `builtins`.
    fn evaluate(
        &self,
        program: &Self::Program,
        query: &str,
        input: &JsonValue,
        builtins: &BuiltinRegistry,
    ) -> Result<ResultSet, EvalError>;
}

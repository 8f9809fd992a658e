//! Compiled policy engine: module set, builtins, and the backend program they produced.
//!
//! [`Engine::check`] discovers the rules of one namespace and evaluates each with a fresh
//! builtin memo. Rule discovery lives in [`crate::discovery`].

use crate::backend::Backend;
use crate::builtin::BuiltinRegistry;
use crate::discovery;
use crate::error::{CompileErrors, EngineError};
use crate::model::Module;
use policyguard_types::{ModulePath, Report, RuleResult};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Compiled rule modules, ready to check inputs.
///
/// Immutable after construction; `check` may be called any number of times.
pub struct Engine<B: Backend> {
    backend: B,
    modules: BTreeMap<ModulePath, Module>,
    builtins: BuiltinRegistry,
    program: B::Program,
}

impl<B: Backend> Engine<B> {
    /// Compile `modules` with no host builtins.
    pub fn new(backend: B, modules: Vec<Module>) -> Result<Self, EngineError> {
        Self::with_builtins(backend, modules, BuiltinRegistry::new())
    }

    /// Compile `modules`, making `builtins` callable from rule bodies.
    pub fn with_builtins(
        backend: B,
        modules: Vec<Module>,
        builtins: BuiltinRegistry,
    ) -> Result<Self, EngineError> {
        if !builtins.is_empty() && !backend.supports_builtins() {
            let names: Vec<&str> = builtins.names().collect();
            return Err(EngineError::Compile(CompileErrors::single(format!(
                "backend does not support custom builtins: {}",
                names.join(", ")
            ))));
        }

        let modules: BTreeMap<ModulePath, Module> =
            modules.into_iter().map(|m| (m.path.clone(), m)).collect();
        let refs: Vec<&Module> = modules.values().collect();

        let program = backend
            .compile(&refs, &builtins)
            .map_err(EngineError::Compile)?;

        tracing::info!(
            modules = modules.len(),
            builtins = builtins.len(),
            "compiled policy modules"
        );

        Ok(Self {
            backend,
            modules,
            builtins,
            program,
        })
    }

    /// Namespaces declared by the loaded modules, in module path order.
    ///
    /// Deduplicated case-insensitively; the first spelling seen is kept.
    pub fn namespaces(&self) -> Vec<String> {
        discovery::namespaces(self.modules.values())
    }

    pub fn modules(&self) -> &BTreeMap<ModulePath, Module> {
        &self.modules
    }

    pub fn program(&self) -> &B::Program {
        &self.program
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    /// Check `input` against every rule of `namespace`.
    ///
    /// A namespace without modules yields an empty report. The first query error aborts the
    /// whole check.
    pub fn check(&self, namespace: &str, input: &JsonValue) -> Result<Report, EngineError> {
        let mut report = discovery::discover(namespace, self.modules.values());

        let rules: Vec<(String, String)> = report
            .rules
            .iter()
            .map(|(uid, rule)| (uid.clone(), rule.query()))
            .collect();

        for (uid, query) in rules {
            tracing::debug!(rule = %uid, query = %query, "evaluating rule");
            self.builtins.begin_evaluation();
            let set = self
                .backend
                .evaluate(&self.program, &query, input, &self.builtins)
                .map_err(|cause| EngineError::Query {
                    rule: uid.clone(),
                    cause,
                })?;
            report.add_result(RuleResult {
                rule: uid,
                query,
                passed: set.is_empty(),
            });
        }

        tracing::info!(
            namespace,
            rules = report.rules.len(),
            failed = report.failed_rules().count(),
            "checked namespace"
        );
        Ok(report)
    }
}

impl<B: Backend + std::fmt::Debug> std::fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend)
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("builtins", &self.builtins)
            .finish_non_exhaustive()
    }
}

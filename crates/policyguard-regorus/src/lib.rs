//! In-process [`Backend`] on the `regorus` Rego interpreter.
//!
//! Modules are parsed by the interpreter. Host builtins from the [`BuiltinRegistry`] are
//! registered as interpreter extensions, so rule bodies call `github.request` like any other
//! function. `print` output is forwarded to stderr after each query.

#![forbid(unsafe_code)]

mod ast;

use policyguard_domain::{
    Backend, BuiltinError, BuiltinRegistry, CompileError, CompileErrors, EvalError, Module,
    ParseError, ResultSet, RuleDecl, outline,
};
use policyguard_types::{ModulePath, ids};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

pub use ast::{DeclaredRule, declared_rules};

static ERROR_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+):\d+:\s*error").expect("valid error location pattern"));

/// Rego backend that evaluates in-process. Supports host builtins.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegorusBackend;

/// Module sources, loaded into a fresh interpreter for every query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegorusProgram {
    sources: Vec<(ModulePath, String)>,
}

impl RegorusProgram {
    pub fn modules(&self) -> impl Iterator<Item = &ModulePath> {
        self.sources.iter().map(|(path, _)| path)
    }
}

impl RegorusBackend {
    pub fn new() -> Self {
        Self
    }

    fn interpreter(&self, program: &RegorusProgram) -> Result<regorus::Engine, EvalError> {
        let mut engine = regorus::Engine::new();
        for (path, source) in &program.sources {
            engine
                .add_policy(path.as_str().to_string(), source.clone())
                .map_err(|e| EvalError::Engine(format!("load {path}: {e:#}")))?;
        }
        Ok(engine)
    }
}

impl Backend for RegorusBackend {
    type Program = RegorusProgram;

    fn parse_module(&self, path: &ModulePath, source: &str) -> Result<Module, ParseError> {
        let mut engine = regorus::Engine::new();
        let package = engine
            .add_policy(path.as_str().to_string(), source.to_string())
            .map_err(|e| parse_error(path, &e))?;
        let package = qualified_package(&package);

        let ast = engine
            .get_ast_as_json()
            .map_err(|e| parse_error(path, &e))?;
        let declared = declared_rules(&ast).map_err(|message| ParseError {
            path: path.as_str().to_string(),
            line: 1,
            message,
        })?;

        // METADATA blocks are comments to the interpreter.
        let outline = outline::parse_module(path, source)?;
        let rules = rule_decls(&package, declared, &outline.rules);

        Ok(Module::new(
            path.clone(),
            package,
            rules,
            outline.annotations,
            source.to_string(),
        ))
    }

    fn supports_builtins(&self) -> bool {
        true
    }

    fn compile(
        &self,
        modules: &[&Module],
        builtins: &BuiltinRegistry,
    ) -> Result<Self::Program, CompileErrors> {
        let mut engine = regorus::Engine::new();
        let mut errors = Vec::new();
        for module in modules {
            if let Err(e) = engine.add_policy(module.path.as_str().to_string(), module.source.clone())
            {
                errors.push(CompileError {
                    path: Some(module.path.to_string()),
                    message: format!("{e:#}").trim().to_string(),
                });
            }
        }
        if let Err(e) = register_builtins(&mut engine, builtins, &FailureSlot::default()) {
            errors.push(CompileError {
                path: None,
                message: format!("register builtins: {e:#}"),
            });
        }
        if !errors.is_empty() {
            return Err(CompileErrors(errors));
        }

        tracing::debug!(modules = modules.len(), "regorus compile passed");
        Ok(RegorusProgram {
            sources: modules
                .iter()
                .map(|m| (m.path.clone(), m.source.clone()))
                .collect(),
        })
    }

    fn evaluate(
        &self,
        program: &Self::Program,
        query: &str,
        input: &JsonValue,
        builtins: &BuiltinRegistry,
    ) -> Result<ResultSet, EvalError> {
        let mut engine = self.interpreter(program)?;
        let failure = FailureSlot::default();
        register_builtins(&mut engine, builtins, &failure)
            .map_err(|e| EvalError::Engine(format!("register builtins: {e:#}")))?;

        let input =
            to_value(input).map_err(|e| EvalError::Engine(format!("encode input: {e:#}")))?;
        engine.set_input(input);
        engine.set_gather_prints(true);

        let outcome = engine.eval_query(query.to_string(), false);

        match engine.take_prints() {
            Ok(lines) => {
                if let Err(e) = forward_prints(&mut std::io::stderr().lock(), &lines) {
                    tracing::debug!(error = %e, "could not forward print output");
                }
            }
            Err(e) => tracing::debug!(error = %e, "could not collect print output"),
        }

        // A failed builtin call is fatal even when the interpreter treated it as undefined.
        if let Some(err) = failure.take() {
            return Err(EvalError::Builtin(err));
        }

        let results = outcome.map_err(|e| EvalError::Engine(format!("{e:#}").trim().to_string()))?;
        let mut set = Vec::new();
        for result in results.result {
            let Some(expr) = result.expressions.into_iter().next() else {
                set.push(JsonValue::Null);
                continue;
            };
            if matches!(expr.value, regorus::Value::Undefined) {
                continue;
            }
            set.push(
                to_json(&expr.value)
                    .map_err(|e| EvalError::Engine(format!("decode result: {e:#}")))?,
            );
        }
        Ok(set)
    }
}

/// Write `print` output from one query, one line each.
pub fn forward_prints(out: &mut impl Write, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// First builtin failure of one evaluation.
#[derive(Clone, Default)]
struct FailureSlot(Arc<Mutex<Option<BuiltinError>>>);

impl FailureSlot {
    fn record(&self, err: BuiltinError) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take(&self) -> Option<BuiltinError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Expose every builtin as an interpreter extension with the builtin's arity.
fn register_builtins(
    engine: &mut regorus::Engine,
    builtins: &BuiltinRegistry,
    failure: &FailureSlot,
) -> anyhow::Result<()> {
    for name in builtins.names() {
        let Some(builtin) = builtins.get(name) else {
            continue;
        };
        let nargs = u8::try_from(builtin.arity())?;
        let registry = builtins.clone();
        let failure = failure.clone();
        let function = name.to_string();
        engine.add_extension(
            name.to_string(),
            nargs,
            Box::new(
                move |args: Vec<regorus::Value>| -> anyhow::Result<regorus::Value> {
                    let args = args
                        .iter()
                        .map(to_json)
                        .collect::<anyhow::Result<Vec<JsonValue>>>()?;
                    match registry.call(&function, &args) {
                        Ok(value) => to_value(&value),
                        Err(err) => {
                            let message = err.to_string();
                            failure.record(err);
                            Err(anyhow::anyhow!(message))
                        }
                    }
                },
            ),
        )?;
    }
    Ok(())
}

fn to_json(value: &regorus::Value) -> anyhow::Result<JsonValue> {
    Ok(serde_json::from_str(&value.to_json_str()?)?)
}

fn to_value(value: &JsonValue) -> anyhow::Result<regorus::Value> {
    regorus::Value::from_json_str(&value.to_string())
}

fn qualified_package(package: &str) -> String {
    if package == ids::DATA_ROOT || package.starts_with(&format!("{}.", ids::DATA_ROOT)) {
        package.to_string()
    } else {
        format!("{}.{package}", ids::DATA_ROOT)
    }
}

/// Declarations for the interpreter's rule heads. Lines the AST does not carry come from
/// the outline.
fn rule_decls(package: &str, declared: Vec<DeclaredRule>, outlined: &[RuleDecl]) -> Vec<RuleDecl> {
    if declared.is_empty() && !outlined.is_empty() {
        tracing::debug!(package, "no rule heads in interpreter ast; using module outline");
        return outlined.to_vec();
    }

    let mut seen = BTreeSet::new();
    declared
        .into_iter()
        .filter(|rule| seen.insert(rule.name.clone()))
        .map(|rule| {
            let line = rule
                .line
                .or_else(|| outlined.iter().find(|o| o.name == rule.name).map(|o| o.line))
                .unwrap_or(1);
            RuleDecl {
                path: format!("{package}.{}", rule.name),
                name: rule.name,
                line,
            }
        })
        .collect()
}

fn parse_error(path: &ModulePath, err: &anyhow::Error) -> ParseError {
    let text = format!("{err:#}");
    let line = ERROR_LOCATION
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1);
    let message = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("invalid module")
        .to_string();
    ParseError {
        path: path.as_str().to_string(),
        line,
        message,
    }
}

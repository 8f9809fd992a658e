use policyguard_domain::{
    Backend, BuiltinRegistry, CompileErrors, EvalError, Module, ParseError, ResultSet, outline,
};
use policyguard_types::ModulePath;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Answer for one query: gets the input and the engine's builtins.
pub type QueryScript =
    Box<dyn Fn(&JsonValue, &BuiltinRegistry) -> Result<ResultSet, EvalError> + Send + Sync>;

/// What [`ScriptedBackend::compile`] produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptedProgram {
    pub modules: Vec<ModulePath>,
    pub builtins: Vec<String>,
}

/// In-memory [`Backend`] whose query results are scripted per query string.
///
/// Modules are parsed with the outline scanner. Queries without a script produce an
/// empty result set, i.e. the rule passes.
pub struct ScriptedBackend {
    scripts: HashMap<String, QueryScript>,
    compile_errors: Option<CompileErrors>,
    builtins_supported: bool,
    evaluated: Mutex<Vec<String>>,
}

impl std::fmt::Debug for ScriptedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut scripted: Vec<&String> = self.scripts.keys().collect();
        scripted.sort();
        f.debug_struct("ScriptedBackend")
            .field("scripted", &scripted)
            .field("compile_errors", &self.compile_errors)
            .field("builtins_supported", &self.builtins_supported)
            .finish_non_exhaustive()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            compile_errors: None,
            builtins_supported: true,
            evaluated: Mutex::new(Vec::new()),
        }
    }

    pub fn on<F>(mut self, query: &str, script: F) -> Self
    where
        F: Fn(&JsonValue, &BuiltinRegistry) -> Result<ResultSet, EvalError> + Send + Sync + 'static,
    {
        self.scripts.insert(query.to_string(), Box::new(script));
        self
    }

    /// `query` always yields one value.
    pub fn triggering(self, query: &str) -> Self {
        self.on(query, |_, _| Ok(vec![JsonValue::Bool(true)]))
    }

    /// `query` fails with an engine error carrying `message`.
    pub fn failing(self, query: &str, message: &str) -> Self {
        let message = message.to_string();
        self.on(query, move |_, _| Err(EvalError::Engine(message.clone())))
    }

    /// Every compile fails with `errors`.
    pub fn failing_compile(mut self, errors: CompileErrors) -> Self {
        self.compile_errors = Some(errors);
        self
    }

    pub fn without_builtins(mut self) -> Self {
        self.builtins_supported = false;
        self
    }

    /// Queries evaluated so far, in order.
    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Backend for ScriptedBackend {
    type Program = ScriptedProgram;

    fn parse_module(&self, path: &ModulePath, source: &str) -> Result<Module, ParseError> {
        outline::parse_module(path, source)
    }

    fn supports_builtins(&self) -> bool {
        self.builtins_supported
    }

    fn compile(
        &self,
        modules: &[&Module],
        builtins: &BuiltinRegistry,
    ) -> Result<Self::Program, CompileErrors> {
        if let Some(errors) = &self.compile_errors {
            return Err(errors.clone());
        }
        Ok(ScriptedProgram {
            modules: modules.iter().map(|m| m.path.clone()).collect(),
            builtins: builtins.names().map(str::to_string).collect(),
        })
    }

    fn evaluate(
        &self,
        _program: &Self::Program,
        query: &str,
        input: &JsonValue,
        builtins: &BuiltinRegistry,
    ) -> Result<ResultSet, EvalError> {
        self.evaluated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.to_string());
        match self.scripts.get(query) {
            Some(script) => script(input, builtins),
            None => Ok(Vec::new()),
        }
    }
}

//! Error taxonomy for the evaluation pipeline.
//!
//! Every fatal condition surfaces through [`EngineError`], whose display is labeled with the
//! stage that failed (`load`, `compiler`, `check`). Causes are rendered inline.

use thiserror::Error;

/// A rule module could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse {path}:{line}: {message}")]
pub struct ParseError {
    pub path: String,
    pub line: u32,
    pub message: String,
}

/// Failure to collect or read rule modules.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no policies found in {paths:?}")]
    NoPolicies { paths: Vec<String> },

    #[error("policy path does not exist: {path}")]
    Missing { path: String },

    #[error("walk {path}: {message}")]
    Walk { path: String, message: String },

    #[error("invalid exclude pattern {pattern:?}: {message}")]
    InvalidExclude { pattern: String, message: String },

    #[error("read {path}: {error}")]
    Read { path: String, error: std::io::Error },

    #[error("{0}")]
    Parse(ParseError),
}

impl From<ParseError> for LoadError {
    fn from(value: ParseError) -> Self {
        LoadError::Parse(value)
    }
}

/// One diagnostic reported by the evaluation engine while compiling modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub path: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Every diagnostic of a failed compilation, aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![CompileError {
            path: None,
            message: message.into(),
        }])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::error::Error for CompileErrors {}

impl std::fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("compilation failed"),
            [one] => write!(f, "1 error occurred: {one}"),
            many => {
                write!(f, "{} errors occurred:", many.len())?;
                for e in many {
                    write!(f, "\n{e}")?;
                }
                Ok(())
            }
        }
    }
}

/// A builtin function call failed. Fatal to the rule invocation that made it.
#[derive(Debug, Error)]
#[error("{name}: {cause}")]
pub struct BuiltinError {
    pub name: String,
    pub cause: Box<dyn std::error::Error + Send + Sync>,
}

impl BuiltinError {
    pub fn new(
        name: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            name: name.into(),
            cause: cause.into(),
        }
    }
}

/// Evaluation of a single query failed.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("query eval: {0}")]
    Engine(String),

    #[error("query eval: {0}")]
    Builtin(BuiltinError),
}

impl From<BuiltinError> for EvalError {
    fn from(value: BuiltinError) -> Self {
        EvalError::Builtin(value)
    }
}

/// Stage-labeled error surfaced by [`crate::Engine`] and the loader.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("load: {0}")]
    Load(LoadError),

    #[error("compiler: {0}")]
    Compile(CompileErrors),

    #[error("check: query rule: {rule}: {cause}")]
    Query { rule: String, cause: EvalError },
}

impl From<LoadError> for EngineError {
    fn from(value: LoadError) -> Self {
        EngineError::Load(value)
    }
}

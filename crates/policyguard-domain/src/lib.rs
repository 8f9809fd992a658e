//! Pure policy evaluation pipeline (no IO).
//!
//! Input: rule modules parsed elsewhere, an evaluation [`Backend`], and a JSON input document.
//! Output: a [`policyguard_types::Report`] of discovered rules and their pass/fail results.

#![forbid(unsafe_code)]

pub mod backend;
pub mod builtin;
pub mod classify;
pub mod discovery;
pub mod error;
pub mod model;
pub mod outline;

mod engine;

#[cfg(test)]
mod test_support;

pub use backend::{Backend, ResultSet};
pub use builtin::{Builtin, BuiltinRegistry};
pub use engine::Engine;
pub use error::{
    BuiltinError, CompileError, CompileErrors, EngineError, EvalError, LoadError, ParseError,
};
pub use model::{Annotation, AnnotationScope, Module, RuleDecl};

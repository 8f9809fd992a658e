//! Filesystem adapters: find Rego policy modules, read them, and build an [`Engine`].
//!
//! This crate is allowed to do filesystem IO. Parsing and compilation are delegated to the
//! [`Backend`] the caller supplies.

#![forbid(unsafe_code)]

mod discover;

use camino::Utf8PathBuf;
use policyguard_domain::{Backend, BuiltinRegistry, Engine, EngineError, LoadError, Module};
use policyguard_types::ModulePath;
use rayon::prelude::*;

pub use discover::collect_policy_files;

/// Fuzz-friendly API for exercising module parsing without filesystem access.
pub mod fuzz {
    use policyguard_domain::outline;
    use policyguard_types::ModulePath;

    /// Run the outline scanner over arbitrary text. **Never panics** on any input.
    pub fn parse_module_outline(text: &str) -> Result<usize, String> {
        outline::parse_module(&ModulePath::new("fuzz.rego"), text)
            .map(|m| m.rules.len())
            .map_err(|e| e.to_string())
    }
}

/// Where to look for policy modules.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<Utf8PathBuf>,
    /// Glob patterns of files to leave out.
    pub exclude: Vec<String>,
}

impl LoadOptions {
    pub fn new(paths: Vec<Utf8PathBuf>) -> Self {
        Self {
            paths,
            exclude: Vec::new(),
        }
    }
}

/// Read and parse every policy module selected by `options`.
///
/// Zero modules is [`LoadError::NoPolicies`]. Unreadable files and parse errors are fatal.
pub fn load_modules<B: Backend>(
    options: &LoadOptions,
    backend: &B,
) -> Result<Vec<Module>, LoadError> {
    let files = collect_policy_files(&options.paths, &options.exclude)?;
    if files.is_empty() {
        return Err(LoadError::NoPolicies {
            paths: options.paths.iter().map(|p| p.to_string()).collect(),
        });
    }

    let modules = files
        .par_iter()
        .map(|file| -> Result<Module, LoadError> {
            let text = std::fs::read_to_string(file).map_err(|error| LoadError::Read {
                path: file.to_string(),
                error,
            })?;
            let module = backend.parse_module(&ModulePath::from(file.as_path()), &text)?;
            tracing::debug!(
                path = %module.path,
                package = %module.package,
                rules = module.rules.len(),
                "loaded policy module"
            );
            Ok(module)
        })
        .collect::<Result<Vec<Module>, LoadError>>()?;

    tracing::info!(modules = modules.len(), "loaded policies");
    Ok(modules)
}

/// Load policy modules from `paths` and compile them with `backend`.
pub fn load_engine<B: Backend>(paths: &[Utf8PathBuf], backend: B) -> Result<Engine<B>, EngineError> {
    load_engine_with(&LoadOptions::new(paths.to_vec()), backend, BuiltinRegistry::new())
}

/// Like [`load_engine`], with exclusions and host builtins.
pub fn load_engine_with<B: Backend>(
    options: &LoadOptions,
    backend: B,
    builtins: BuiltinRegistry,
) -> Result<Engine<B>, EngineError> {
    let modules = load_modules(options, &backend)?;
    Engine::with_builtins(backend, modules, builtins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn outline_parser_never_panics(input in ".*") {
            let _ = fuzz::parse_module_outline(&input);
        }

        #[test]
        fn outline_parser_never_panics_on_rego_like_text(
            lines in proptest::collection::vec(
                prop::sample::select(vec![
                    "package a.b", "# METADATA", "# title: x", "# scope: rule", "deny_x if {",
                    "}", "warn := true", "`raw {", "\"str }\"", "default allow := false", "",
                    "import rego.v1", "  [1, 2]",
                ]),
                0..24,
            )
        ) {
            let _ = fuzz::parse_module_outline(&lines.join("\n"));
        }
    }
}

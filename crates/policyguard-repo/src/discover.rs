use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use policyguard_domain::LoadError;
use policyguard_types::ids;
use walkdir::WalkDir;

/// Collect the policy module files named by `paths`.
///
/// Behavior:
/// - a file is taken if it has the `.rego` extension
/// - a directory is walked recursively for `.rego` files
/// - files matching any `exclude` glob (against the full path or the path below the walked
///   directory) are dropped
///
/// The result is sorted and deduplicated. A nonexistent path is an error; an empty result is not
/// (the caller decides).
pub fn collect_policy_files(
    paths: &[Utf8PathBuf],
    exclude: &[String],
) -> Result<Vec<Utf8PathBuf>, LoadError> {
    let exclude_set = build_globset(exclude)?;
    let mut out: Vec<Utf8PathBuf> = Vec::new();

    for root in paths {
        if !root.exists() {
            return Err(LoadError::Missing {
                path: root.to_string(),
            });
        }

        if root.is_file() {
            if is_policy_file(root) && !is_excluded(&exclude_set, root, root) {
                out.push(root.clone());
            }
            continue;
        }

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| LoadError::Walk {
                path: root.to_string(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
                tracing::warn!(root = %root, "skipping non-UTF-8 path");
                continue;
            };
            if is_policy_file(&path) && !is_excluded(&exclude_set, root, &path) {
                out.push(path);
            }
        }
    }

    // Stable order.
    out.sort();
    out.dedup();

    Ok(out)
}

fn is_policy_file(path: &Utf8Path) -> bool {
    path.extension() == Some(ids::MODULE_EXTENSION)
}

fn is_excluded(set: &GlobSet, root: &Utf8Path, path: &Utf8Path) -> bool {
    if set.is_empty() {
        return false;
    }
    let full = path.as_str().replace('\\', "/");
    let rel = path
        .strip_prefix(root)
        .map(|p| p.as_str().replace('\\', "/"))
        .unwrap_or_else(|_| full.clone());
    set.is_match(&full) || set.is_match(&rel)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, LoadError> {
    let invalid = |pattern: &str, e: globset::Error| LoadError::InvalidExclude {
        pattern: pattern.to_string(),
        message: e.to_string(),
    };
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        b.add(Glob::new(p).map_err(|e| invalid(p, e))?);
    }
    b.build().map_err(|e| invalid(&patterns.join(","), e))
}

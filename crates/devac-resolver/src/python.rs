//! Python module resolution (relative imports, `__init__.py`, submodules)

use crate::export_index::ExportIndex;
use crate::resolver::{ModuleRules, SemanticResolver};
use devac_core::Language;

pub struct PyRules;

/// Resolve the directory a relative specifier is anchored in: one leading
/// dot is the importing file's package, each further dot goes up one level.
fn anchor_dir(from_file: &str, dots: usize) -> Option<Vec<String>> {
    let dir = match from_file.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };
    let mut segments: Vec<String> = dir
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    for _ in 1..dots {
        segments.pop()?;
    }
    Some(segments)
}

/// Candidate files for a module path: `pkg/mod.py` or `pkg/mod/__init__.py`.
fn module_candidates(segments: &[String]) -> Vec<String> {
    let joined = segments.join("/");
    if joined.is_empty() {
        return vec!["__init__.py".to_string()];
    }
    vec![
        format!("{joined}.py"),
        format!("{joined}/__init__.py"),
    ]
}

fn split_specifier(specifier: &str) -> (usize, Vec<String>) {
    let dots = specifier.chars().take_while(|&c| c == '.').count();
    let rest: Vec<String> = specifier[dots..]
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (dots, rest)
}

impl ModuleRules for PyRules {
    fn language(&self) -> Language {
        Language::Python
    }

    fn resolve_module(&self, from_file: &str, specifier: &str, index: &ExportIndex) -> Option<String> {
        let (dots, rest) = split_specifier(specifier);
        if dots == 0 {
            return None; // absolute imports are external by contract
        }
        let mut segments = anchor_dir(from_file, dots)?;
        segments.extend(rest);
        module_candidates(&segments)
            .into_iter()
            .find(|candidate| index.files.contains(candidate))
    }

    /// `from . import submodule`: the imported name may itself be a module
    /// file rather than a symbol in `__init__.py`.
    fn resolve_symbol_fallback(
        &self,
        from_file: &str,
        specifier: &str,
        symbol: &str,
        index: &ExportIndex,
    ) -> Option<String> {
        let (dots, rest) = split_specifier(specifier);
        if dots == 0 || symbol == "*" {
            return None;
        }
        let mut segments = anchor_dir(from_file, dots)?;
        segments.extend(rest);
        segments.push(symbol.to_string());
        module_candidates(&segments)
            .into_iter()
            .find_map(|candidate| index.module_id(&candidate).cloned())
    }
}

pub type PythonResolver = SemanticResolver<PyRules>;

impl SemanticResolver<PyRules> {
    pub fn new(branch: &str) -> Self {
        SemanticResolver::with_rules(PyRules, branch)
    }
}

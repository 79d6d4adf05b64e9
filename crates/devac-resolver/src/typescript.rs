//! TypeScript / JavaScript module resolution

use crate::export_index::ExportIndex;
use crate::resolver::{ModuleRules, SemanticResolver};
use devac_core::Language;

const EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];

pub struct TsRules;

/// Join a relative specifier onto the importing file's directory,
/// normalizing `.` and `..` segments. Pure string manipulation; the index,
/// not the filesystem, decides what exists.
fn join_relative(from_file: &str, specifier: &str) -> Option<String> {
    let dir = match from_file.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

impl ModuleRules for TsRules {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn resolve_module(&self, from_file: &str, specifier: &str, index: &ExportIndex) -> Option<String> {
        let joined = join_relative(from_file, specifier)?;

        // Exact path (specifier already carries an extension).
        if index.files.contains(&joined) {
            return Some(joined);
        }
        for ext in EXTENSIONS {
            let candidate = format!("{joined}{ext}");
            if index.files.contains(&candidate) {
                return Some(candidate);
            }
        }
        for ext in EXTENSIONS {
            let candidate = format!("{joined}/index{ext}");
            if index.files.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

pub type TypeScriptResolver = SemanticResolver<TsRules>;

impl SemanticResolver<TsRules> {
    pub fn new(branch: &str) -> Self {
        SemanticResolver::with_rules(TsRules, branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(files: &[&str]) -> ExportIndex {
        let mut index = ExportIndex::default();
        for f in files {
            index.files.insert(f.to_string());
        }
        index
    }

    #[test]
    fn test_relative_specifier_extensions() {
        let index = index_with(&["src/helper.ts", "src/ui/index.tsx"]);
        let rules = TsRules;
        assert_eq!(
            rules.resolve_module("src/consumer.ts", "./helper", &index),
            Some("src/helper.ts".to_string())
        );
        assert_eq!(
            rules.resolve_module("src/consumer.ts", "./ui", &index),
            Some("src/ui/index.tsx".to_string())
        );
    }

    #[test]
    fn test_parent_directory_specifier() {
        let index = index_with(&["shared/util.ts"]);
        let rules = TsRules;
        assert_eq!(
            rules.resolve_module("src/deep/consumer.ts", "../../shared/util", &index),
            Some("shared/util.ts".to_string())
        );
        // Escaping above the package root fails cleanly.
        assert_eq!(rules.resolve_module("a.ts", "../../../x", &index), None);
    }

    #[test]
    fn test_unknown_module_is_none() {
        let index = index_with(&["src/helper.ts"]);
        assert_eq!(TsRules.resolve_module("src/a.ts", "./nope", &index), None);
    }
}

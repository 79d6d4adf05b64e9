//! C# resolution: namespace lookup over the package's declared types

use crate::export_index::ExportIndex;
use crate::resolver::{ModuleRules, SemanticResolver};
use devac_core::Language;

pub struct CsRules;

impl ModuleRules for CsRules {
    fn language(&self) -> Language {
        Language::CSharp
    }

    /// C# has no relative specifiers; a using directive resolves when the
    /// namespace is declared somewhere in this package.
    fn resolve_module(&self, _from_file: &str, specifier: &str, index: &ExportIndex) -> Option<String> {
        let module_id = index.namespaces.get(specifier)?;
        index
            .module_ids
            .iter()
            .find(|(_, id)| *id == module_id)
            .map(|(file, _)| file.clone())
    }

    fn allows_bare_specifiers(&self) -> bool {
        true
    }
}

pub type CSharpResolver = SemanticResolver<CsRules>;

impl SemanticResolver<CsRules> {
    pub fn new(branch: &str) -> Self {
        SemanticResolver::with_rules(CsRules, branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_resolves_to_declaring_file() {
        let mut index = ExportIndex::default();
        index.files.insert("Services/Invoice.cs".to_string());
        index
            .module_ids
            .insert("Services/Invoice.cs".to_string(), "module:invoice".to_string());
        index
            .namespaces
            .insert("Billing.Services".to_string(), "module:invoice".to_string());

        assert_eq!(
            CsRules.resolve_module("Program.cs", "Billing.Services", &index),
            Some("Services/Invoice.cs".to_string())
        );
        assert_eq!(CsRules.resolve_module("Program.cs", "System", &index), None);
    }
}

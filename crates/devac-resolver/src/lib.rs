//! DevAC Resolver — rebinds syntactic references to stable entity ids
//!
//! Parsers leave cross-file names as `unresolved:<symbol>` edge targets and
//! unresolved external refs. The resolver builds a per-package export index
//! from the seeds and rewrites both back with concrete entity ids, leaving
//! genuinely external references untouched for future runs.

pub mod csharp;
pub mod export_index;
pub mod python;
mod resolver;
pub mod typescript;


pub use csharp::CSharpResolver;
pub use export_index::{ExportEntry, ExportIndex};
pub use python::PythonResolver;
pub use resolver::{
    LanguageResolver, PackageResolution, ResolvedEdge, ResolvedRef, ResolutionMethod,
    ResolutionSummary, ResolverConfig, resolve_and_persist,
};
pub use typescript::TypeScriptResolver;

use devac_core::Language;

/// All language resolvers, for packages of unknown or mixed language.
pub fn all_resolvers(branch: &str) -> Vec<Box<dyn LanguageResolver>> {
    vec![
        Box::new(TypeScriptResolver::new(branch)),
        Box::new(PythonResolver::new(branch)),
        Box::new(CSharpResolver::new(branch)),
    ]
}

/// The resolver for one language.
pub fn resolver_for(language: Language, branch: &str) -> Box<dyn LanguageResolver> {
    match language {
        Language::TypeScript | Language::JavaScript => Box::new(TypeScriptResolver::new(branch)),
        Language::Python => Box::new(PythonResolver::new(branch)),
        Language::CSharp => Box::new(CSharpResolver::new(branch)),
    }
}

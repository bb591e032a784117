// Parser and extractor layer
//
// One declarative extractor per language, all emitting the uniform record
// shapes from `base`. Extraction is pure and file-local; parse failures are
// non-fatal and degrade to a diagnostic with an empty symbol set.

pub mod base;
pub mod go;
pub mod java;
pub mod python;
pub mod typescript;

pub use base::{
    CallSiteRecord, DiagnosticSeverity, ExtractionContext, FileExtraction, ImportRecord,
    ParamRecord, ParseDiagnostic, Relationship, SymbolKind, SymbolRecord, Visibility,
};

use crate::scanner::Language;
use tracing::debug;
use tree_sitter::Parser;

pub fn grammar(language: Language, file_path: &str) -> tree_sitter::Language {
    match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::TypeScript => {
            if file_path.ends_with(".tsx") {
                tree_sitter_typescript::LANGUAGE_TSX.into()
            } else {
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
            }
        }
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
    }
}

/// Whether the grammar for a language is linked into this build. Grammars are
/// compiled in, so this is a static yes; the strict runtime profile still
/// checks it at startup so a future dynamically-loaded grammar fails early.
pub fn grammar_available(language: Language) -> bool {
    let _ = language;
    true
}

/// Pure extraction entry point: no IO, no store access.
pub fn extract(source: &[u8], language: Language, file_path: &str) -> FileExtraction {
    let text = String::from_utf8_lossy(source).into_owned();

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar(language, file_path)) {
        return FileExtraction {
            diagnostics: vec![ParseDiagnostic::parse_error(
                file_path,
                format!("grammar init failed for {language}: {e}"),
            )],
            ..Default::default()
        };
    }

    let Some(tree) = parser.parse(&text, None) else {
        return FileExtraction {
            diagnostics: vec![ParseDiagnostic::parse_error(file_path, "parser returned no tree")],
            ..Default::default()
        };
    };

    let mut extraction = match language {
        Language::Python => python::PythonExtractor::new(file_path, text).extract(&tree),
        Language::TypeScript => {
            typescript::TypeScriptExtractor::new(file_path, text).extract(&tree)
        }
        Language::Java => java::JavaExtractor::new(file_path, text).extract(&tree),
        Language::Go => go::GoExtractor::new(file_path, text).extract(&tree),
    };

    if tree.root_node().has_error() {
        extraction.diagnostics.push(ParseDiagnostic {
            stage: "parse".to_string(),
            category: "syntax".to_string(),
            severity: DiagnosticSeverity::Warning,
            file: file_path.to_string(),
            message: "syntax errors in file; extraction is best-effort".to_string(),
            hint: None,
        });
    }

    debug!(
        "extracted {} symbols, {} imports, {} call sites from {}",
        extraction.symbols.len(),
        extraction.imports.len(),
        extraction.call_sites.len(),
        file_path
    );
    extraction
}

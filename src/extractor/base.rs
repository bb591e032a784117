// Uniform extraction record shapes
//
// Extraction is pure: (source bytes, language) -> records + diagnostics, no IO
// and no store access. Per-language quirks live in the language modules; the
// record shape here is shared by all of them and by the merge stage.

use crate::scanner::Language;
use serde::{Deserialize, Serialize};
use std::fmt;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Interface,
    Constant,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Interface => "interface",
            SymbolKind::Constant => "constant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "method" => Some(SymbolKind::Method),
            "interface" => Some(SymbolKind::Interface),
            "constant" => Some(SymbolKind::Constant),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "protected" => Some(Visibility::Protected),
            _ => None,
        }
    }
}

/// Typed directed relation kinds persisted on edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    Calls,
    Imports,
    ImportsSymbol,
    Extends,
    Implements,
    Defines,
    HasMethod,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Calls => "CALLS",
            Relationship::Imports => "IMPORTS",
            Relationship::ImportsSymbol => "IMPORTS_SYMBOL",
            Relationship::Extends => "EXTENDS",
            Relationship::Implements => "IMPLEMENTS",
            Relationship::Defines => "DEFINES",
            Relationship::HasMethod => "HAS_METHOD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CALLS" => Some(Relationship::Calls),
            "IMPORTS" => Some(Relationship::Imports),
            "IMPORTS_SYMBOL" => Some(Relationship::ImportsSymbol),
            "EXTENDS" => Some(Relationship::Extends),
            "IMPLEMENTS" => Some(Relationship::Implements),
            "DEFINES" => Some(Relationship::Defines),
            "HAS_METHOD" => Some(Relationship::HasMethod),
            _ => None,
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    pub name: String,
    pub type_hint: Option<String>,
    pub default_value: Option<String>,
}

/// One extracted symbol. `parent_index` points into the same batch (method
/// to its owning class); the merge stage rewrites it to a store id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: String,
    pub return_type: Option<String>,
    pub visibility: Visibility,
    pub is_async: bool,
    pub is_static: bool,
    pub parent_index: Option<usize>,
    pub docstring: Option<String>,
    pub parameters: Vec<ParamRecord>,
    /// Textual base-class names, resolved to EXTENDS edges later.
    pub extends: Vec<String>,
    /// Textual interface names, resolved to IMPLEMENTS edges later.
    pub implements: Vec<String>,
}

impl SymbolRecord {
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        kind: SymbolKind,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            start_line,
            end_line,
            signature: String::new(),
            return_type: None,
            visibility: Visibility::Public,
            is_async: false,
            is_static: false,
            parent_index: None,
            docstring: None,
            parameters: Vec::new(),
            extends: Vec::new(),
            implements: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub raw_text: String,
    /// Declared target module ("a.b", "./util", "fmt").
    pub module: String,
    /// Specific imported name when the statement names one.
    pub imported_name: Option<String>,
    pub alias: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSiteRecord {
    /// Index of the enclosing function/method in the symbol batch; None for
    /// module-level call sites.
    pub caller_index: Option<usize>,
    /// Callee as written: "foo", "obj.method", "pkg.Fn".
    pub callee_text: String,
    pub line: u32,
    /// Receiver type where statically inferable (e.g. self/this methods).
    pub receiver_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    Warning,
    Error,
}

impl DiagnosticSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    pub stage: String,
    /// Failure class within the stage: "syntax", "io", "resource".
    pub category: String,
    pub severity: DiagnosticSeverity,
    pub file: String,
    pub message: String,
    pub hint: Option<String>,
}

impl ParseDiagnostic {
    pub fn parse_error(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: "parse".to_string(),
            category: "syntax".to_string(),
            severity: DiagnosticSeverity::Error,
            file: file.into(),
            message: message.into(),
            hint: Some("file is skipped for this run; fix syntax and reindex".to_string()),
        }
    }
}

/// Everything the extractor produces for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileExtraction {
    pub symbols: Vec<SymbolRecord>,
    pub imports: Vec<ImportRecord>,
    pub call_sites: Vec<CallSiteRecord>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Shared helpers for tree walking; each language extractor wraps one.
pub struct ExtractionContext {
    pub language: Language,
    pub file_path: String,
    pub source: String,
}

impl ExtractionContext {
    pub fn new(language: Language, file_path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            language,
            file_path: file_path.into(),
            source: source.into(),
        }
    }

    pub fn node_text(&self, node: &Node) -> String {
        self.source
            .get(node.start_byte()..node.end_byte())
            .unwrap_or("")
            .to_string()
    }

    /// 1-based start line.
    pub fn start_line(&self, node: &Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    /// 1-based end line.
    pub fn end_line(&self, node: &Node) -> u32 {
        node.end_position().row as u32 + 1
    }

    /// Declaration text up to (not including) the body child, single-spaced.
    pub fn signature_before_body(&self, node: &Node, body_field: &str) -> String {
        let end = node
            .child_by_field_name(body_field)
            .map(|b| b.start_byte())
            .unwrap_or_else(|| node.end_byte());
        let raw = self.source.get(node.start_byte()..end).unwrap_or("");
        normalize_whitespace(raw)
    }

    /// Comment block immediately preceding the node, for languages that keep
    /// docs above the declaration.
    pub fn preceding_comment(&self, node: &Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut current = node.prev_sibling();
        while let Some(sibling) = current {
            let kind = sibling.kind();
            if kind != "comment" && kind != "line_comment" && kind != "block_comment" {
                break;
            }
            lines.push(strip_comment_markers(&self.node_text(&sibling)));
            current = sibling.prev_sibling();
        }
        if lines.is_empty() {
            None
        } else {
            lines.reverse();
            Some(lines.join("\n").trim().to_string())
        }
    }
}

pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_comment_markers(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("///")
                .trim_start_matches("//")
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_start_matches('*')
                .trim_end_matches("*/")
                .trim()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

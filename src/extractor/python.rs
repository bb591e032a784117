// Python extractor
//
// Dotted qualified names come from the file path (pkg/mod.py -> pkg.mod,
// __init__.py collapses to the package). Leading-underscore names are
// private; classes with a Protocol base are interfaces; self-receiver calls
// carry the enclosing class as a receiver hint.

use crate::extractor::base::{
    CallSiteRecord, ExtractionContext, FileExtraction, ImportRecord, ParamRecord, SymbolKind,
    SymbolRecord, Visibility,
};
use crate::scanner::Language;
use tree_sitter::{Node, Tree};

pub struct PythonExtractor {
    ctx: ExtractionContext,
    module: String,
    out: FileExtraction,
}

struct Scope {
    /// Index of the enclosing function/method symbol, for call attribution.
    caller: Option<usize>,
    /// Index and name of the enclosing class, for methods and self-hints.
    class: Option<(usize, String)>,
    /// Dotted prefix for qualified names at this level.
    prefix: String,
}

impl PythonExtractor {
    pub fn new(file_path: &str, source: String) -> Self {
        let module = module_path(file_path);
        Self {
            ctx: ExtractionContext::new(Language::Python, file_path, source),
            module,
            out: FileExtraction::default(),
        }
    }

    pub fn extract(mut self, tree: &Tree) -> FileExtraction {
        let scope = Scope {
            caller: None,
            class: None,
            prefix: self.module.clone(),
        };
        self.walk(tree.root_node(), &scope);
        self.out
    }

    fn walk(&mut self, node: Node, scope: &Scope) {
        match node.kind() {
            "decorated_definition" => {
                if let Some(inner) = node.child_by_field_name("definition") {
                    self.walk(inner, scope);
                }
                return;
            }
            "class_definition" => {
                self.extract_class(node, scope);
                return;
            }
            "function_definition" => {
                self.extract_function(node, scope);
                return;
            }
            "import_statement" | "import_from_statement" => {
                self.extract_import(node);
                return;
            }
            "call" => {
                self.extract_call(node, scope);
                // fall through: arguments may contain nested calls
            }
            "assignment" => {
                // Module-level UPPER_CASE assignments become constants.
                if scope.caller.is_none() && scope.class.is_none() {
                    self.extract_constant(node, scope);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, scope);
        }
    }

    fn extract_class(&mut self, node: Node, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let qualified = format!("{}.{}", scope.prefix, name);

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for child in superclasses.children(&mut cursor) {
                match child.kind() {
                    "identifier" | "attribute" => bases.push(self.ctx.node_text(&child)),
                    _ => {}
                }
            }
        }
        let is_protocol = bases.iter().any(|b| b == "Protocol" || b.ends_with(".Protocol"));

        let mut record = SymbolRecord::new(
            &name,
            &qualified,
            if is_protocol {
                SymbolKind::Interface
            } else {
                SymbolKind::Class
            },
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.visibility = visibility_of(&name);
        record.docstring = node
            .child_by_field_name("body")
            .and_then(|body| self.docstring_of(&body));
        record.extends = bases.into_iter().filter(|b| b != "object").collect();

        let index = self.push_symbol(record, scope);
        let class_scope = Scope {
            caller: scope.caller,
            class: Some((index, name)),
            prefix: qualified,
        };
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk(child, &class_scope);
            }
        }
    }

    fn extract_function(&mut self, node: Node, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let qualified = format!("{}.{}", scope.prefix, name);
        let in_class = scope.class.is_some();

        let mut record = SymbolRecord::new(
            &name,
            &qualified,
            if in_class {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            },
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.is_async = record.signature.starts_with("async ")
            || node
                .prev_sibling()
                .is_some_and(|sibling| sibling.kind() == "async");
        record.is_static = self.has_decorator(&node, "staticmethod");
        record.visibility = visibility_of(&name);
        record.return_type = node
            .child_by_field_name("return_type")
            .map(|rt| self.ctx.node_text(&rt));
        record.docstring = node
            .child_by_field_name("body")
            .and_then(|body| self.docstring_of(&body));
        if let Some(params) = node.child_by_field_name("parameters") {
            record.parameters = self.extract_params(&params);
        }

        let index = self.push_symbol(record, scope);
        let fn_scope = Scope {
            caller: Some(index),
            class: scope.class.clone(),
            prefix: qualified,
        };
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk(child, &fn_scope);
            }
        }
    }

    fn extract_constant(&mut self, node: Node, scope: &Scope) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = self.ctx.node_text(&left);
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit()) {
            return;
        }
        let mut record = SymbolRecord::new(
            &name,
            format!("{}.{}", scope.prefix, name),
            SymbolKind::Constant,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = crate::extractor::base::normalize_whitespace(&self.ctx.node_text(&node));
        record.visibility = visibility_of(&name);
        self.push_symbol(record, scope);
    }

    fn extract_import(&mut self, node: Node) {
        let raw = self.ctx.node_text(&node);
        let line = self.ctx.start_line(&node);

        if node.kind() == "import_statement" {
            // import a.b [as c][, d.e]
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => {
                        self.out.imports.push(ImportRecord {
                            raw_text: raw.clone(),
                            module: self.ctx.node_text(&child),
                            imported_name: None,
                            alias: None,
                            line,
                        });
                    }
                    "aliased_import" => {
                        let module = child
                            .child_by_field_name("name")
                            .map(|n| self.ctx.node_text(&n))
                            .unwrap_or_default();
                        let alias = child
                            .child_by_field_name("alias")
                            .map(|a| self.ctx.node_text(&a));
                        self.out.imports.push(ImportRecord {
                            raw_text: raw.clone(),
                            module,
                            imported_name: None,
                            alias,
                            line,
                        });
                    }
                    _ => {}
                }
            }
            return;
        }

        // from a.b import c [as d][, e]
        let module = node
            .child_by_field_name("module_name")
            .map(|m| self.ctx.node_text(&m))
            .unwrap_or_default();
        let mut cursor = node.walk();
        let mut saw_import_kw = false;
        for child in node.children(&mut cursor) {
            if child.kind() == "import" {
                saw_import_kw = true;
                continue;
            }
            if !saw_import_kw {
                continue;
            }
            match child.kind() {
                "dotted_name" | "identifier" => {
                    self.out.imports.push(ImportRecord {
                        raw_text: raw.clone(),
                        module: module.clone(),
                        imported_name: Some(self.ctx.node_text(&child)),
                        alias: None,
                        line,
                    });
                }
                "aliased_import" => {
                    let imported = child
                        .child_by_field_name("name")
                        .map(|n| self.ctx.node_text(&n));
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|a| self.ctx.node_text(&a));
                    self.out.imports.push(ImportRecord {
                        raw_text: raw.clone(),
                        module: module.clone(),
                        imported_name: imported,
                        alias,
                        line,
                    });
                }
                "wildcard_import" => {
                    self.out.imports.push(ImportRecord {
                        raw_text: raw.clone(),
                        module: module.clone(),
                        imported_name: Some("*".to_string()),
                        alias: None,
                        line,
                    });
                }
                _ => {}
            }
        }
    }

    fn extract_call(&mut self, node: Node, scope: &Scope) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let callee_text = self.ctx.node_text(&function);
        if callee_text.is_empty() {
            return;
        }

        // self.method() resolves against the enclosing class.
        let receiver_hint = match scope.class.as_ref() {
            Some((_, class_name))
                if callee_text.starts_with("self.") || callee_text.starts_with("cls.") =>
            {
                Some(class_name.clone())
            }
            _ => None,
        };

        self.out.call_sites.push(CallSiteRecord {
            caller_index: scope.caller,
            callee_text,
            line: self.ctx.start_line(&node),
            receiver_hint,
        });
    }

    fn extract_params(&self, params: &Node) -> Vec<ParamRecord> {
        let mut out = Vec::new();
        let mut cursor = params.walk();
        for child in params.children(&mut cursor) {
            match child.kind() {
                "identifier" => out.push(ParamRecord {
                    name: self.ctx.node_text(&child),
                    type_hint: None,
                    default_value: None,
                }),
                "typed_parameter" => {
                    let name = child
                        .child(0)
                        .map(|n| self.ctx.node_text(&n))
                        .unwrap_or_default();
                    let type_hint = child
                        .child_by_field_name("type")
                        .map(|t| self.ctx.node_text(&t));
                    out.push(ParamRecord {
                        name,
                        type_hint,
                        default_value: None,
                    });
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.ctx.node_text(&n))
                        .unwrap_or_default();
                    let type_hint = child
                        .child_by_field_name("type")
                        .map(|t| self.ctx.node_text(&t));
                    let default_value = child
                        .child_by_field_name("value")
                        .map(|v| self.ctx.node_text(&v));
                    out.push(ParamRecord {
                        name,
                        type_hint,
                        default_value,
                    });
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => out.push(ParamRecord {
                    name: self.ctx.node_text(&child),
                    type_hint: None,
                    default_value: None,
                }),
                _ => {}
            }
        }
        out
    }

    fn docstring_of(&self, body: &Node) -> Option<String> {
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        let raw = self.ctx.node_text(&string);
        Some(strip_string_quotes(&raw))
    }

    fn has_decorator(&self, node: &Node, name: &str) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        if parent.kind() != "decorated_definition" {
            return false;
        }
        let mut cursor = parent.walk();
        parent.children(&mut cursor).any(|child| {
            child.kind() == "decorator" && self.ctx.node_text(&child).contains(name)
        })
    }

    fn push_symbol(&mut self, mut record: SymbolRecord, scope: &Scope) -> usize {
        if record.kind == SymbolKind::Method {
            record.parent_index = scope.class.as_ref().map(|(index, _)| *index);
        }
        self.out.symbols.push(record);
        self.out.symbols.len() - 1
    }
}

fn strip_string_quotes(raw: &str) -> String {
    raw.trim_start_matches("r\"\"\"")
        .trim_start_matches("\"\"\"")
        .trim_end_matches("\"\"\"")
        .trim_start_matches("'''")
        .trim_end_matches("'''")
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}

fn visibility_of(name: &str) -> Visibility {
    if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

pub(crate) fn module_path(file_path: &str) -> String {
    let trimmed = file_path
        .trim_end_matches(".py")
        .trim_end_matches("/__init__");
    trimmed.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract;
    use crate::scanner::Language;

    fn run(source: &str) -> FileExtraction {
        extract(source.as_bytes(), Language::Python, "pkg/mod.py")
    }

    #[test]
    fn extracts_functions_classes_methods() {
        let out = run(r#"
class Animal:
    """Base creature."""

    def speak(self):
        return self.sound()

    def sound(self):
        return ""


async def feed(animal, amount=1):
    animal.speak()
"#);
        let names: Vec<&str> = out.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Animal", "speak", "sound", "feed"]);

        let animal = &out.symbols[0];
        assert_eq!(animal.kind, SymbolKind::Class);
        assert_eq!(animal.qualified_name, "pkg.mod.Animal");
        assert_eq!(animal.docstring.as_deref(), Some("Base creature."));

        let speak = &out.symbols[1];
        assert_eq!(speak.kind, SymbolKind::Method);
        assert_eq!(speak.parent_index, Some(0));
        assert_eq!(speak.qualified_name, "pkg.mod.Animal.speak");

        let feed = &out.symbols[3];
        assert!(feed.is_async);
        assert_eq!(feed.parameters.len(), 2);
        assert_eq!(feed.parameters[1].default_value.as_deref(), Some("1"));
    }

    #[test]
    fn self_calls_carry_receiver_hint() {
        let out = run(r#"
class Dog:
    def bark(self):
        self.growl()

    def growl(self):
        pass
"#);
        let call = out
            .call_sites
            .iter()
            .find(|c| c.callee_text == "self.growl")
            .unwrap();
        assert_eq!(call.receiver_hint.as_deref(), Some("Dog"));
        assert_eq!(call.caller_index, Some(1));
    }

    #[test]
    fn imports_both_forms() {
        let out = run("import os.path\nfrom collections import OrderedDict as OD\n");
        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].module, "os.path");
        assert_eq!(out.imports[1].module, "collections");
        assert_eq!(out.imports[1].imported_name.as_deref(), Some("OrderedDict"));
        assert_eq!(out.imports[1].alias.as_deref(), Some("OD"));
    }

    #[test]
    fn module_constants_and_visibility() {
        let out = run("MAX_RETRIES = 3\n_hidden = 1\n\ndef _internal():\n    pass\n");
        let constant = out
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Constant)
            .unwrap();
        assert_eq!(constant.name, "MAX_RETRIES");
        let internal = out.symbols.iter().find(|s| s.name == "_internal").unwrap();
        assert_eq!(internal.visibility, Visibility::Private);
        // lowercase assignment is not a constant
        assert!(!out.symbols.iter().any(|s| s.name == "_hidden"));
    }

    #[test]
    fn protocol_base_is_interface() {
        let out = run("from typing import Protocol\n\nclass Walker(Protocol):\n    def walk(self): ...\n");
        let walker = out.symbols.iter().find(|s| s.name == "Walker").unwrap();
        assert_eq!(walker.kind, SymbolKind::Interface);
    }

    #[test]
    fn broken_source_yields_diagnostic_not_panic() {
        let out = run("def broken(:\n");
        assert!(
            out.diagnostics
                .iter()
                .any(|d| d.stage == "parse"),
            "expected a parse diagnostic"
        );
    }

    #[test]
    fn init_module_collapses_to_package() {
        let out = extract(b"def boot():\n    pass\n", Language::Python, "pkg/__init__.py");
        assert_eq!(out.symbols[0].qualified_name, "pkg.boot");
    }
}

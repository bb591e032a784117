// Go extractor
//
// Package identity comes from the package clause. Methods attach to their
// receiver's type when it is declared in the same file; struct and interface
// embedding is recorded as extension. Exported means capitalized.

use crate::extractor::base::{
    CallSiteRecord, ExtractionContext, FileExtraction, ImportRecord, ParamRecord, SymbolKind,
    SymbolRecord, Visibility,
};
use crate::scanner::Language;
use std::collections::HashMap;
use tree_sitter::{Node, Tree};

pub struct GoExtractor {
    ctx: ExtractionContext,
    package: String,
    out: FileExtraction,
    /// (symbol index, receiver type name) for post-walk parent fixup, since Go
    /// allows methods to precede their receiver's type declaration.
    pending_methods: Vec<(usize, String)>,
}

#[derive(Clone, Default)]
struct Scope {
    caller: Option<usize>,
    /// Receiver binding inside a method body: (variable name, type name).
    receiver: Option<(String, String)>,
}

impl GoExtractor {
    pub fn new(file_path: &str, source: String) -> Self {
        Self {
            ctx: ExtractionContext::new(Language::Go, file_path, source),
            package: String::new(),
            out: FileExtraction::default(),
            pending_methods: Vec::new(),
        }
    }

    pub fn extract(mut self, tree: &Tree) -> FileExtraction {
        let root = tree.root_node();

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "package_clause"
                && let Some(name) = child.named_child(0)
            {
                self.package = self.ctx.node_text(&name);
            }
        }

        self.walk(root, &Scope::default());
        self.attach_methods();
        self.out
    }

    fn walk(&mut self, node: Node, scope: &Scope) {
        match node.kind() {
            "import_declaration" => {
                self.extract_imports(node);
                return;
            }
            "function_declaration" => {
                self.extract_function(node);
                return;
            }
            "method_declaration" => {
                self.extract_method(node);
                return;
            }
            "type_declaration" => {
                self.extract_types(node);
                return;
            }
            "const_declaration" => {
                self.extract_consts(node);
                return;
            }
            "call_expression" => {
                self.extract_call(node, scope);
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, scope);
        }
    }

    fn extract_function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let mut record = SymbolRecord::new(
            &name,
            format!("{}.{}", self.package, name),
            SymbolKind::Function,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.visibility = exported_visibility(&name);
        record.docstring = self.ctx.preceding_comment(&node);
        record.return_type = node
            .child_by_field_name("result")
            .map(|r| self.ctx.node_text(&r));
        if let Some(params) = node.child_by_field_name("parameters") {
            record.parameters = self.extract_params(&params);
        }

        self.out.symbols.push(record);
        let index = self.out.symbols.len() - 1;
        self.walk_body(node, Scope {
            caller: Some(index),
            receiver: None,
        });
    }

    fn extract_method(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|r| self.receiver_binding(&r));
        let type_name = receiver
            .as_ref()
            .map(|(_, ty)| ty.clone())
            .unwrap_or_default();

        let qualified = if type_name.is_empty() {
            format!("{}.{}", self.package, name)
        } else {
            format!("{}.{}.{}", self.package, type_name, name)
        };

        let mut record = SymbolRecord::new(
            &name,
            qualified,
            SymbolKind::Method,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.visibility = exported_visibility(&name);
        record.docstring = self.ctx.preceding_comment(&node);
        record.return_type = node
            .child_by_field_name("result")
            .map(|r| self.ctx.node_text(&r));
        if let Some(params) = node.child_by_field_name("parameters") {
            record.parameters = self.extract_params(&params);
        }

        self.out.symbols.push(record);
        let index = self.out.symbols.len() - 1;
        if !type_name.is_empty() {
            self.pending_methods.push((index, type_name));
        }
        self.walk_body(node, Scope {
            caller: Some(index),
            receiver,
        });
    }

    fn extract_types(&mut self, node: Node) {
        let mut cursor = node.walk();
        for spec in node.children(&mut cursor) {
            if spec.kind() != "type_spec" {
                continue;
            }
            let Some(name_node) = spec.child_by_field_name("name") else {
                continue;
            };
            let name = self.ctx.node_text(&name_node);
            let Some(ty) = spec.child_by_field_name("type") else {
                continue;
            };
            let kind = match ty.kind() {
                "interface_type" => SymbolKind::Interface,
                _ => SymbolKind::Class,
            };

            let mut record = SymbolRecord::new(
                &name,
                format!("{}.{}", self.package, name),
                kind,
                self.ctx.start_line(&spec),
                self.ctx.end_line(&spec),
            );
            record.signature = format!(
                "type {} {}",
                name,
                match ty.kind() {
                    "struct_type" => "struct",
                    "interface_type" => "interface",
                    other => other,
                }
            );
            record.visibility = exported_visibility(&name);
            record.docstring = self.ctx.preceding_comment(&node);
            record.extends = self.embedded_types(&ty);
            self.out.symbols.push(record);
        }
    }

    fn extract_consts(&mut self, node: Node) {
        let mut cursor = node.walk();
        for spec in node.children(&mut cursor) {
            if spec.kind() != "const_spec" {
                continue;
            }
            let Some(name_node) = spec.child_by_field_name("name") else {
                continue;
            };
            let name = self.ctx.node_text(&name_node);
            let mut record = SymbolRecord::new(
                &name,
                format!("{}.{}", self.package, name),
                SymbolKind::Constant,
                self.ctx.start_line(&spec),
                self.ctx.end_line(&spec),
            );
            record.signature =
                crate::extractor::base::normalize_whitespace(&self.ctx.node_text(&spec));
            record.visibility = exported_visibility(&name);
            self.out.symbols.push(record);
        }
    }

    fn extract_imports(&mut self, node: Node) {
        let line = self.ctx.start_line(&node);
        let mut specs = Vec::new();
        collect_import_specs(&node, &mut specs);
        for spec in specs {
            let Some(path_node) = spec.child_by_field_name("path") else {
                continue;
            };
            let module = self
                .ctx
                .node_text(&path_node)
                .trim_matches('"')
                .to_string();
            let alias = spec
                .child_by_field_name("name")
                .map(|n| self.ctx.node_text(&n))
                .filter(|a| a != "_" && a != ".");
            self.out.imports.push(ImportRecord {
                raw_text: crate::extractor::base::normalize_whitespace(&self.ctx.node_text(&spec)),
                module,
                imported_name: None,
                alias,
                line: self.ctx.start_line(&spec).max(line),
            });
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

        // Calls through the receiver variable hint at the receiver's type.
        let receiver_hint = scope.receiver.as_ref().and_then(|(var, ty)| {
            callee_text
                .strip_prefix(var.as_str())
                .filter(|rest| rest.starts_with('.'))
                .map(|_| ty.clone())
        });

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
            if child.kind() != "parameter_declaration"
                && child.kind() != "variadic_parameter_declaration"
            {
                continue;
            }
            let type_hint = child
                .child_by_field_name("type")
                .map(|t| self.ctx.node_text(&t));
            // One declaration may bind several names: (a, b int).
            let mut named_any = false;
            let mut name_cursor = child.walk();
            for name in child.children(&mut name_cursor) {
                if name.kind() == "identifier" {
                    named_any = true;
                    out.push(ParamRecord {
                        name: self.ctx.node_text(&name),
                        type_hint: type_hint.clone(),
                        default_value: None,
                    });
                }
            }
            if !named_any && let Some(type_hint) = type_hint {
                out.push(ParamRecord {
                    name: String::new(),
                    type_hint: Some(type_hint),
                    default_value: None,
                });
            }
        }
        out
    }

    fn receiver_binding(&self, receiver: &Node) -> Option<(String, String)> {
        let mut cursor = receiver.walk();
        for child in receiver.children(&mut cursor) {
            if child.kind() != "parameter_declaration" {
                continue;
            }
            let var = child
                .child_by_field_name("name")
                .map(|n| self.ctx.node_text(&n))
                .unwrap_or_default();
            let ty = child
                .child_by_field_name("type")
                .map(|t| self.ctx.node_text(&t).trim_start_matches('*').to_string())?;
            return Some((var, ty));
        }
        None
    }

    fn embedded_types(&self, ty: &Node) -> Vec<String> {
        let mut embedded = Vec::new();
        match ty.kind() {
            "struct_type" => {
                // field_declaration without a name field is an embedding
                if let Some(body) = ty.named_child(0) {
                    let mut cursor = body.walk();
                    for field in body.children(&mut cursor) {
                        if field.kind() == "field_declaration"
                            && field.child_by_field_name("name").is_none()
                            && let Some(embedded_type) = field.child_by_field_name("type")
                        {
                            embedded.push(
                                self.ctx
                                    .node_text(&embedded_type)
                                    .trim_start_matches('*')
                                    .to_string(),
                            );
                        }
                    }
                }
            }
            "interface_type" => {
                let mut cursor = ty.walk();
                for child in ty.children(&mut cursor) {
                    match child.kind() {
                        "type_identifier" | "qualified_type" | "type_elem" => {
                            embedded.push(self.ctx.node_text(&child));
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        embedded
    }

    /// Attach methods to their receiver type, which may be declared after
    /// them in the file.
    fn attach_methods(&mut self) {
        let type_indices: HashMap<String, usize> = self
            .out
            .symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.kind == SymbolKind::Class || s.kind == SymbolKind::Interface
            })
            .map(|(index, s)| (s.name.clone(), index))
            .collect();
        for (method_index, type_name) in self.pending_methods.drain(..) {
            if let Some(&type_index) = type_indices.get(&type_name) {
                self.out.symbols[method_index].parent_index = Some(type_index);
            }
        }
    }

    fn walk_body(&mut self, node: Node, scope: Scope) {
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk(child, &scope);
            }
        }
    }
}

fn collect_import_specs<'a>(node: &Node<'a>, specs: &mut Vec<Node<'a>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_spec" => specs.push(child),
            "import_spec_list" => collect_import_specs(&child, specs),
            _ => {}
        }
    }
}

fn exported_visibility(name: &str) -> Visibility {
    if name.chars().next().is_some_and(|c| c.is_uppercase()) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract;
    use crate::scanner::Language;

    fn run(source: &str) -> FileExtraction {
        extract(source.as_bytes(), Language::Go, "svc/server.go")
    }

    #[test]
    fn structs_methods_and_receiver_hints() {
        let out = run(r#"
package svc

import (
    "fmt"
    log "example.com/logging"
)

type Server struct {
    Base
    addr string
}

func (s *Server) Run() error {
    s.listen()
    return nil
}

func (s *Server) listen() {
    fmt.Println(s.addr)
}

func NewServer(addr string) *Server {
    return &Server{addr: addr}
}
"#);
        let server = out
            .symbols
            .iter()
            .find(|s| s.name == "Server")
            .unwrap();
        assert_eq!(server.kind, SymbolKind::Class);
        assert_eq!(server.extends, vec!["Base"]);
        assert_eq!(server.qualified_name, "svc.Server");

        let run_method = out.symbols.iter().find(|s| s.name == "Run").unwrap();
        assert_eq!(run_method.kind, SymbolKind::Method);
        assert_eq!(run_method.qualified_name, "svc.Server.Run");
        assert_eq!(run_method.visibility, Visibility::Public);

        // method precedes nothing here, but parent fixup must hold regardless
        let server_index = out.symbols.iter().position(|s| s.name == "Server").unwrap();
        assert_eq!(run_method.parent_index, Some(server_index));

        let call = out
            .call_sites
            .iter()
            .find(|c| c.callee_text == "s.listen")
            .unwrap();
        assert_eq!(call.receiver_hint.as_deref(), Some("Server"));

        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].module, "fmt");
        assert_eq!(out.imports[1].alias.as_deref(), Some("log"));

        let new_server = out.symbols.iter().find(|s| s.name == "NewServer").unwrap();
        assert_eq!(new_server.kind, SymbolKind::Function);
        assert_eq!(new_server.return_type.as_deref(), Some("*Server"));
    }

    #[test]
    fn interfaces_and_constants() {
        let out = run(r#"
package svc

type Handler interface {
    Reader
    Handle() error
}

const MaxConns = 128
const internalBuf = 4
"#);
        let handler = out.symbols.iter().find(|s| s.name == "Handler").unwrap();
        assert_eq!(handler.kind, SymbolKind::Interface);
        assert_eq!(handler.extends, vec!["Reader"]);

        let max = out.symbols.iter().find(|s| s.name == "MaxConns").unwrap();
        assert_eq!(max.kind, SymbolKind::Constant);
        assert_eq!(max.visibility, Visibility::Public);
        let buf = out.symbols.iter().find(|s| s.name == "internalBuf").unwrap();
        assert_eq!(buf.visibility, Visibility::Private);
    }

    #[test]
    fn methods_before_their_type_still_attach() {
        let out = run("package svc\n\nfunc (w worker) step() {}\n\ntype worker struct{}\n");
        let step = out.symbols.iter().find(|s| s.name == "step").unwrap();
        let worker = out.symbols.iter().position(|s| s.name == "worker").unwrap();
        assert_eq!(step.parent_index, Some(worker));
    }
}

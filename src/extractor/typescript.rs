// TypeScript extractor
//
// Module identity is the slashed file path without extension; members are
// dotted onto it. Exported declarations are public, other top-level
// declarations are module-private. Arrow functions bound to a const are
// treated as functions, matching how TS codebases actually define them.

use crate::extractor::base::{
    CallSiteRecord, ExtractionContext, FileExtraction, ImportRecord, ParamRecord, SymbolKind,
    SymbolRecord, Visibility,
};
use crate::scanner::Language;
use tree_sitter::{Node, Tree};

pub struct TypeScriptExtractor {
    ctx: ExtractionContext,
    module: String,
    out: FileExtraction,
}

#[derive(Clone)]
struct Scope {
    caller: Option<usize>,
    class: Option<(usize, String)>,
    prefix: String,
    exported: bool,
}

impl TypeScriptExtractor {
    pub fn new(file_path: &str, source: String) -> Self {
        let module = file_path
            .trim_end_matches(".tsx")
            .trim_end_matches(".ts")
            .to_string();
        Self {
            ctx: ExtractionContext::new(Language::TypeScript, file_path, source),
            module,
            out: FileExtraction::default(),
        }
    }

    pub fn extract(mut self, tree: &Tree) -> FileExtraction {
        let scope = Scope {
            caller: None,
            class: None,
            prefix: self.module.clone(),
            exported: false,
        };
        self.walk(tree.root_node(), &scope);
        self.out
    }

    fn walk(&mut self, node: Node, scope: &Scope) {
        match node.kind() {
            "export_statement" => {
                let exported = Scope {
                    exported: true,
                    ..scope.clone()
                };
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.walk(child, &exported);
                }
                return;
            }
            "import_statement" => {
                self.extract_import(node);
                return;
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.extract_class(node, scope);
                return;
            }
            "interface_declaration" => {
                self.extract_interface(node, scope);
                return;
            }
            "function_declaration" | "generator_function_declaration" => {
                self.extract_function(node, scope);
                return;
            }
            "method_definition" => {
                self.extract_method(node, scope);
                return;
            }
            "lexical_declaration" | "variable_declaration" => {
                self.extract_bindings(node, scope);
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

    fn extract_class(&mut self, node: Node, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let qualified = format!("{}.{}", scope.prefix, name);

        let mut record = SymbolRecord::new(
            &name,
            &qualified,
            SymbolKind::Class,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.visibility = top_level_visibility(scope);
        record.docstring = self.ctx.preceding_comment(&node);

        // class_heritage holds both extends and implements clauses.
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "class_heritage" {
                continue;
            }
            let mut heritage_cursor = child.walk();
            for clause in child.children(&mut heritage_cursor) {
                match clause.kind() {
                    "extends_clause" => {
                        record.extends.extend(self.heritage_names(&clause));
                    }
                    "implements_clause" => {
                        record.implements.extend(self.heritage_names(&clause));
                    }
                    _ => {}
                }
            }
        }

        let index = self.push_symbol(record, scope);
        let class_scope = Scope {
            caller: scope.caller,
            class: Some((index, name)),
            prefix: qualified,
            exported: false,
        };
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk(child, &class_scope);
            }
        }
    }

    fn extract_interface(&mut self, node: Node, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let mut record = SymbolRecord::new(
            &name,
            format!("{}.{}", scope.prefix, name),
            SymbolKind::Interface,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.visibility = top_level_visibility(scope);
        record.docstring = self.ctx.preceding_comment(&node);
        // interface Foo extends Bar
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "extends_type_clause" || child.kind() == "extends_clause" {
                record.extends.extend(self.heritage_names(&child));
            }
        }
        self.push_symbol(record, scope);
    }

    fn extract_function(&mut self, node: Node, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let qualified = format!("{}.{}", scope.prefix, name);
        let mut record = SymbolRecord::new(
            &name,
            &qualified,
            SymbolKind::Function,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.is_async = record.signature.starts_with("async ");
        record.visibility = top_level_visibility(scope);
        record.docstring = self.ctx.preceding_comment(&node);
        record.return_type = node
            .child_by_field_name("return_type")
            .map(|rt| self.ctx.node_text(&rt).trim_start_matches(':').trim().to_string());
        if let Some(params) = node.child_by_field_name("parameters") {
            record.parameters = self.extract_params(&params);
        }

        let index = self.push_symbol(record, scope);
        self.walk_body(node, "body", Scope {
            caller: Some(index),
            class: scope.class.clone(),
            prefix: qualified,
            exported: false,
        });
    }

    fn extract_method(&mut self, node: Node, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let qualified = format!("{}.{}", scope.prefix, name);
        let mut record = SymbolRecord::new(
            &name,
            &qualified,
            SymbolKind::Method,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.is_async = record.signature.contains("async ");
        record.is_static = record.signature.starts_with("static ")
            || record.signature.contains(" static ");
        record.visibility = member_visibility(&record.signature);
        record.docstring = self.ctx.preceding_comment(&node);
        record.return_type = node
            .child_by_field_name("return_type")
            .map(|rt| self.ctx.node_text(&rt).trim_start_matches(':').trim().to_string());
        if let Some(params) = node.child_by_field_name("parameters") {
            record.parameters = self.extract_params(&params);
        }

        let index = self.push_symbol(record, scope);
        self.walk_body(node, "body", Scope {
            caller: Some(index),
            class: scope.class.clone(),
            prefix: qualified,
            exported: false,
        });
    }

    /// const/let bindings: arrow functions become functions, ALL_CAPS
    /// initializers become constants.
    fn extract_bindings(&mut self, node: Node, scope: &Scope) {
        let is_const = self.ctx.node_text(&node).starts_with("const")
            || self
                .ctx
                .node_text(&node)
                .starts_with("export const");
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue;
            }
            let name = self.ctx.node_text(&name_node);
            let value = declarator.child_by_field_name("value");

            if let Some(value) = value
                && (value.kind() == "arrow_function" || value.kind() == "function_expression")
            {
                let qualified = format!("{}.{}", scope.prefix, name);
                let mut record = SymbolRecord::new(
                    &name,
                    &qualified,
                    SymbolKind::Function,
                    self.ctx.start_line(&declarator),
                    self.ctx.end_line(&declarator),
                );
                record.signature = self.ctx.signature_before_body(&value, "body");
                if record.signature.is_empty() {
                    record.signature = format!("const {name} = (...)");
                }
                record.is_async = self.ctx.node_text(&value).starts_with("async");
                record.visibility = top_level_visibility(scope);
                record.docstring = self.ctx.preceding_comment(&node);
                if let Some(params) = value.child_by_field_name("parameters") {
                    record.parameters = self.extract_params(&params);
                }
                let index = self.push_symbol(record, scope);
                self.walk_body(value, "body", Scope {
                    caller: Some(index),
                    class: scope.class.clone(),
                    prefix: qualified,
                    exported: false,
                });
                continue;
            }

            if is_const
                && scope.caller.is_none()
                && name
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
            {
                let mut record = SymbolRecord::new(
                    &name,
                    format!("{}.{}", scope.prefix, name),
                    SymbolKind::Constant,
                    self.ctx.start_line(&declarator),
                    self.ctx.end_line(&declarator),
                );
                record.signature =
                    crate::extractor::base::normalize_whitespace(&self.ctx.node_text(&declarator));
                record.visibility = top_level_visibility(scope);
                self.push_symbol(record, scope);
                continue;
            }

            // Still walk initializers for call sites.
            if let Some(value) = value {
                self.walk(value, scope);
            }
        }
    }

    fn extract_import(&mut self, node: Node) {
        let raw = self.ctx.node_text(&node);
        let line = self.ctx.start_line(&node);
        let module = node
            .child_by_field_name("source")
            .map(|s| self.ctx.node_text(&s).trim_matches(['"', '\'']).to_string())
            .unwrap_or_default();
        if module.is_empty() {
            return;
        }

        let mut pushed_any = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = child.walk();
            for clause in child.children(&mut clause_cursor) {
                match clause.kind() {
                    "identifier" => {
                        // default import
                        self.out.imports.push(ImportRecord {
                            raw_text: raw.clone(),
                            module: module.clone(),
                            imported_name: Some("default".to_string()),
                            alias: Some(self.ctx.node_text(&clause)),
                            line,
                        });
                        pushed_any = true;
                    }
                    "namespace_import" => {
                        let alias = clause
                            .named_child(0)
                            .map(|n| self.ctx.node_text(&n));
                        self.out.imports.push(ImportRecord {
                            raw_text: raw.clone(),
                            module: module.clone(),
                            imported_name: Some("*".to_string()),
                            alias,
                            line,
                        });
                        pushed_any = true;
                    }
                    "named_imports" => {
                        let mut named_cursor = clause.walk();
                        for spec in clause.children(&mut named_cursor) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let imported = spec
                                .child_by_field_name("name")
                                .map(|n| self.ctx.node_text(&n));
                            let alias = spec
                                .child_by_field_name("alias")
                                .map(|a| self.ctx.node_text(&a));
                            self.out.imports.push(ImportRecord {
                                raw_text: raw.clone(),
                                module: module.clone(),
                                imported_name: imported,
                                alias,
                                line,
                            });
                            pushed_any = true;
                        }
                    }
                    _ => {}
                }
            }
        }

        if !pushed_any {
            // side-effect import: `import './polyfill'`
            self.out.imports.push(ImportRecord {
                raw_text: raw,
                module,
                imported_name: None,
                alias: None,
                line,
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
        let receiver_hint = match scope.class.as_ref() {
            Some((_, class_name)) if callee_text.starts_with("this.") => Some(class_name.clone()),
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
                "required_parameter" | "optional_parameter" => {
                    let name = child
                        .child_by_field_name("pattern")
                        .map(|p| self.ctx.node_text(&p))
                        .unwrap_or_default();
                    let type_hint = child
                        .child_by_field_name("type")
                        .map(|t| self.ctx.node_text(&t).trim_start_matches(':').trim().to_string());
                    let default_value = child
                        .child_by_field_name("value")
                        .map(|v| self.ctx.node_text(&v));
                    out.push(ParamRecord {
                        name,
                        type_hint,
                        default_value,
                    });
                }
                "identifier" => out.push(ParamRecord {
                    name: self.ctx.node_text(&child),
                    type_hint: None,
                    default_value: None,
                }),
                _ => {}
            }
        }
        out
    }

    fn heritage_names(&self, clause: &Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "identifier" | "type_identifier" | "member_expression" | "nested_type_identifier" => {
                    names.push(self.ctx.node_text(&child));
                }
                "generic_type" => {
                    if let Some(base) = child.named_child(0) {
                        names.push(self.ctx.node_text(&base));
                    }
                }
                _ => {}
            }
        }
        names
    }

    fn walk_body(&mut self, node: Node, field: &str, scope: Scope) {
        if let Some(body) = node.child_by_field_name(field) {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk(child, &scope);
            }
        }
    }

    fn push_symbol(&mut self, mut record: SymbolRecord, scope: &Scope) -> usize {
        if record.kind == SymbolKind::Method {
            record.parent_index = scope.class.as_ref().map(|(index, _)| *index);
        }
        self.out.symbols.push(record);
        self.out.symbols.len() - 1
    }
}

fn top_level_visibility(scope: &Scope) -> Visibility {
    if scope.exported {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

fn member_visibility(signature: &str) -> Visibility {
    if signature.starts_with("private ") || signature.contains(" private ") {
        Visibility::Private
    } else if signature.starts_with("protected ") || signature.contains(" protected ") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract;
    use crate::scanner::Language;

    fn run(source: &str) -> FileExtraction {
        extract(source.as_bytes(), Language::TypeScript, "src/app.ts")
    }

    #[test]
    fn classes_with_heritage() {
        let out = run(r#"
export interface Runnable {
  run(): void;
}

export class Task extends Base implements Runnable {
  private count: number = 0;

  async run(): Promise<void> {
    this.step();
  }

  protected step(): void {}
}
"#);
        let task = out.symbols.iter().find(|s| s.name == "Task").unwrap();
        assert_eq!(task.kind, SymbolKind::Class);
        assert_eq!(task.extends, vec!["Base"]);
        assert_eq!(task.implements, vec!["Runnable"]);
        assert_eq!(task.visibility, Visibility::Public);
        assert_eq!(task.qualified_name, "src/app.Task");

        let run_method = out.symbols.iter().find(|s| s.name == "run" && s.kind == SymbolKind::Method).unwrap();
        assert!(run_method.is_async);
        let step = out.symbols.iter().find(|s| s.name == "step").unwrap();
        assert_eq!(step.visibility, Visibility::Protected);

        let hint = out
            .call_sites
            .iter()
            .find(|c| c.callee_text == "this.step")
            .unwrap();
        assert_eq!(hint.receiver_hint.as_deref(), Some("Task"));
    }

    #[test]
    fn arrow_function_consts_are_functions() {
        let out = run("export const handler = async (req: Request) => {\n  dispatch(req);\n};\n");
        let handler = out.symbols.iter().find(|s| s.name == "handler").unwrap();
        assert_eq!(handler.kind, SymbolKind::Function);
        assert!(handler.is_async);
        assert_eq!(handler.visibility, Visibility::Public);
        assert!(out.call_sites.iter().any(|c| c.callee_text == "dispatch"));
    }

    #[test]
    fn import_forms() {
        let out = run(
            "import dflt from './a';\nimport * as ns from 'lib';\nimport { x, y as z } from '../b';\nimport './polyfill';\n",
        );
        assert_eq!(out.imports.len(), 5);
        assert_eq!(out.imports[0].imported_name.as_deref(), Some("default"));
        assert_eq!(out.imports[1].imported_name.as_deref(), Some("*"));
        assert_eq!(out.imports[1].alias.as_deref(), Some("ns"));
        assert_eq!(out.imports[2].module, "../b");
        assert_eq!(out.imports[3].alias.as_deref(), Some("z"));
        assert_eq!(out.imports[4].imported_name, None);
    }

    #[test]
    fn non_exported_top_level_is_private() {
        let out = run("function helper() {}\nexport function api() { helper(); }\n");
        let helper = out.symbols.iter().find(|s| s.name == "helper").unwrap();
        assert_eq!(helper.visibility, Visibility::Private);
        let api = out.symbols.iter().find(|s| s.name == "api").unwrap();
        assert_eq!(api.visibility, Visibility::Public);
    }

    #[test]
    fn screaming_const_is_constant() {
        let out = run("export const MAX_DEPTH = 6;\nconst other = 1;\n");
        let max = out.symbols.iter().find(|s| s.name == "MAX_DEPTH").unwrap();
        assert_eq!(max.kind, SymbolKind::Constant);
        assert!(!out.symbols.iter().any(|s| s.name == "other"));
    }
}

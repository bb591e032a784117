// Java extractor
//
// Qualified names are real dotted names rooted at the package declaration.
// Constructors are recorded as methods; static final fields become constants.

use crate::extractor::base::{
    CallSiteRecord, ExtractionContext, FileExtraction, ImportRecord, ParamRecord, SymbolKind,
    SymbolRecord, Visibility,
};
use crate::scanner::Language;
use tree_sitter::{Node, Tree};

pub struct JavaExtractor {
    ctx: ExtractionContext,
    package: String,
    out: FileExtraction,
}

#[derive(Clone)]
struct Scope {
    caller: Option<usize>,
    class: Option<(usize, String)>,
    prefix: String,
}

impl JavaExtractor {
    pub fn new(file_path: &str, source: String) -> Self {
        Self {
            ctx: ExtractionContext::new(Language::Java, file_path, source),
            package: String::new(),
            out: FileExtraction::default(),
        }
    }

    pub fn extract(mut self, tree: &Tree) -> FileExtraction {
        let root = tree.root_node();

        // Package declaration anchors all qualified names in the file.
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "package_declaration"
                && let Some(name) = child.named_child(0)
            {
                self.package = self.ctx.node_text(&name);
            }
        }

        let scope = Scope {
            caller: None,
            class: None,
            prefix: self.package.clone(),
        };
        self.walk(root, &scope);
        self.out
    }

    fn walk(&mut self, node: Node, scope: &Scope) {
        match node.kind() {
            "import_declaration" => {
                self.extract_import(node);
                return;
            }
            "class_declaration" | "enum_declaration" => {
                self.extract_class(node, scope, SymbolKind::Class);
                return;
            }
            "interface_declaration" => {
                self.extract_class(node, scope, SymbolKind::Interface);
                return;
            }
            "method_declaration" | "constructor_declaration" => {
                self.extract_method(node, scope);
                return;
            }
            "field_declaration" => {
                self.extract_field(node, scope);
                return;
            }
            "method_invocation" | "object_creation_expression" => {
                self.extract_call(node, scope);
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, scope);
        }
    }

    fn extract_class(&mut self, node: Node, scope: &Scope, kind: SymbolKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let qualified = qualify(&scope.prefix, &name);

        let mut record = SymbolRecord::new(
            &name,
            &qualified,
            kind,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.visibility = modifier_visibility(&record.signature);
        record.is_static = record.signature.contains("static ");
        record.docstring = self.ctx.preceding_comment(&node);

        if let Some(superclass) = node.child_by_field_name("superclass") {
            // "superclass" wraps `extends Type`
            if let Some(ty) = superclass.named_child(0) {
                record.extends.push(self.ctx.node_text(&ty));
            }
        }
        if let Some(interfaces) = node.child_by_field_name("interfaces") {
            record.implements.extend(self.type_list_names(&interfaces));
        }
        if kind == SymbolKind::Interface {
            // interface Foo extends A, B
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "extends_interfaces" {
                    record.extends.extend(self.type_list_names(&child));
                }
            }
        }

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

    fn extract_method(&mut self, node: Node, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.node_text(&name_node);
        let qualified = qualify(&scope.prefix, &name);

        let mut record = SymbolRecord::new(
            &name,
            &qualified,
            SymbolKind::Method,
            self.ctx.start_line(&node),
            self.ctx.end_line(&node),
        );
        record.signature = self.ctx.signature_before_body(&node, "body");
        record.visibility = modifier_visibility(&record.signature);
        record.is_static = record.signature.contains("static ");
        record.docstring = self.ctx.preceding_comment(&node);
        record.return_type = node
            .child_by_field_name("type")
            .map(|t| self.ctx.node_text(&t));
        if let Some(params) = node.child_by_field_name("parameters") {
            record.parameters = self.extract_params(&params);
        }

        let index = self.push_symbol(record, scope);
        if let Some(body) = node.child_by_field_name("body") {
            let method_scope = Scope {
                caller: Some(index),
                class: scope.class.clone(),
                prefix: qualified,
            };
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.walk(child, &method_scope);
            }
        }
    }

    /// `static final` fields are the Java spelling of constants.
    fn extract_field(&mut self, node: Node, scope: &Scope) {
        let signature =
            crate::extractor::base::normalize_whitespace(&self.ctx.node_text(&node));
        if !(signature.contains("static") && signature.contains("final")) {
            return;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = child.child_by_field_name("name") else {
                continue;
            };
            let name = self.ctx.node_text(&name_node);
            let mut record = SymbolRecord::new(
                &name,
                qualify(&scope.prefix, &name),
                SymbolKind::Constant,
                self.ctx.start_line(&node),
                self.ctx.end_line(&node),
            );
            record.signature = signature.clone();
            record.visibility = modifier_visibility(&signature);
            record.is_static = true;
            self.push_symbol(record, scope);
        }
    }

    fn extract_import(&mut self, node: Node) {
        let raw = self.ctx.node_text(&node);
        let line = self.ctx.start_line(&node);
        let Some(path_node) = node
            .named_children(&mut node.walk())
            .find(|c| c.kind() == "scoped_identifier" || c.kind() == "identifier")
        else {
            return;
        };
        let full = self.ctx.node_text(&path_node);
        let wildcard = raw.contains(".*");

        // `import a.b.C;` targets class C in package a.b.
        let (module, imported) = if wildcard {
            (full.clone(), Some("*".to_string()))
        } else {
            match full.rsplit_once('.') {
                Some((pkg, cls)) => (pkg.to_string(), Some(cls.to_string())),
                None => (full.clone(), None),
            }
        };

        self.out.imports.push(ImportRecord {
            raw_text: raw,
            module,
            imported_name: imported,
            alias: None,
            line,
        });
    }

    fn extract_call(&mut self, node: Node, scope: &Scope) {
        let (callee_text, receiver) = if node.kind() == "object_creation_expression" {
            let Some(ty) = node.child_by_field_name("type") else {
                return;
            };
            (self.ctx.node_text(&ty), None)
        } else {
            let Some(name) = node.child_by_field_name("name") else {
                return;
            };
            let name_text = self.ctx.node_text(&name);
            match node.child_by_field_name("object") {
                Some(object) => {
                    let object_text = self.ctx.node_text(&object);
                    (format!("{object_text}.{name_text}"), Some(object_text))
                }
                None => (name_text, None),
            }
        };

        let receiver_hint = match (receiver.as_deref(), scope.class.as_ref()) {
            (Some("this"), Some((_, class_name))) | (None, Some((_, class_name))) => {
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
            if child.kind() != "formal_parameter" && child.kind() != "spread_parameter" {
                continue;
            }
            let name = child
                .child_by_field_name("name")
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
        out
    }

    fn type_list_names(&self, node: &Node) -> Vec<String> {
        let mut names = Vec::new();
        collect_type_names(node, &self.ctx, &mut names);
        names
    }

    fn push_symbol(&mut self, mut record: SymbolRecord, scope: &Scope) -> usize {
        if record.kind == SymbolKind::Method || record.kind == SymbolKind::Constant {
            record.parent_index = scope.class.as_ref().map(|(index, _)| *index);
        }
        self.out.symbols.push(record);
        self.out.symbols.len() - 1
    }
}

fn collect_type_names(node: &Node, ctx: &ExtractionContext, names: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "type_identifier" | "scoped_type_identifier" => names.push(ctx.node_text(&child)),
            "generic_type" => {
                if let Some(base) = child.named_child(0) {
                    names.push(ctx.node_text(&base));
                }
            }
            "type_list" => collect_type_names(&child, ctx, names),
            _ => {}
        }
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn modifier_visibility(signature: &str) -> Visibility {
    if signature.starts_with("public ") || signature.contains(" public ") {
        Visibility::Public
    } else if signature.starts_with("protected ") || signature.contains(" protected ") {
        Visibility::Protected
    } else {
        Visibility::Private
    }
}

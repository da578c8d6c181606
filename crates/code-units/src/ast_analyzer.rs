use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Result};
use crate::language::Language;
use crate::types::{BranchKind, BranchMarker, ByteSpan, RawReference, ReferenceKind, UnitDraft, UnitKind};
use tree_sitter::{Node, Parser};

/// Lexical position while walking declarations
#[derive(Debug, Clone, Default)]
struct Scope {
    /// Enclosing inline modules (Rust `mod` blocks)
    modules: Vec<String>,
    /// Enclosing class/impl/trait, already qualified with `modules`
    owner: Option<String>,
}

/// AST-based analyzer that turns one file into unit drafts
pub struct AstAnalyzer {
    config: AnalyzerConfig,
    parser: Parser,
    language: Language,
}

impl AstAnalyzer {
    /// Create new AST analyzer for a language
    pub fn new(config: AnalyzerConfig, language: Language) -> Result<Self> {
        if !language.supports_ast() {
            return Err(AnalysisError::unsupported_language(language.as_str()));
        }

        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| AnalysisError::tree_sitter(format!("Failed to set language: {e}")))?;

        Ok(Self {
            config,
            parser,
            language,
        })
    }

    /// Parse the file and extract its units in source order
    pub fn analyze(&mut self, content: &str, file_path: &str) -> Result<Vec<UnitDraft>> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| AnalysisError::parse(file_path, 1, "parser produced no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, message) = first_syntax_error(root);
            return Err(AnalysisError::parse(file_path, line, message));
        }

        let mut units = Vec::new();
        self.extract_declarations(content, root, &Scope::default(), &mut units);
        link_members(&mut units);

        Ok(units)
    }

    /// Walk the direct children of a container node for declarations
    fn extract_declarations(
        &self,
        content: &str,
        node: Node,
        scope: &Scope,
        units: &mut Vec<UnitDraft>,
    ) {
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();

        for child in children {
            match self.language {
                Language::Rust => self.extract_rust_item(content, child, scope, units),
                Language::Python => self.extract_python_item(content, child, scope, units),
                Language::JavaScript | Language::TypeScript => {
                    self.extract_js_item(content, child, scope, units);
                }
                Language::Unknown => {}
            }
        }
    }

    fn extract_rust_item(&self, content: &str, node: Node, scope: &Scope, units: &mut Vec<UnitDraft>) {
        match node.kind() {
            "function_item" => {
                let kind = if scope.owner.is_some() {
                    UnitKind::Method
                } else {
                    UnitKind::Function
                };
                if let Some(unit) = self.callable_unit(content, node, node, scope, kind) {
                    units.push(unit);
                }
            }
            "struct_item" | "enum_item" | "union_item" => {
                if let Some(unit) = self.class_unit(content, node, scope) {
                    units.push(unit);
                }
            }
            "trait_item" => {
                let Some(unit) = self.class_unit(content, node, scope) else {
                    return;
                };
                let inner = Scope {
                    modules: scope.modules.clone(),
                    owner: Some(unit.symbol.clone()),
                };
                units.push(unit);
                if let Some(body) = node.child_by_field_name("body") {
                    self.extract_declarations(content, body, &inner, units);
                }
            }
            "impl_item" => {
                let Some(target) = extract_impl_target(content, node) else {
                    return;
                };
                let inner = Scope {
                    modules: scope.modules.clone(),
                    owner: Some(self.qualify(&scope.modules, None, &target)),
                };
                if let Some(body) = node.child_by_field_name("body") {
                    self.extract_declarations(content, body, &inner, units);
                }
            }
            "mod_item" => {
                let (Some(name), Some(body)) = (
                    field_text(content, node, "name"),
                    node.child_by_field_name("body"),
                ) else {
                    return;
                };
                let mut inner = scope.clone();
                inner.modules.push(name);
                self.extract_declarations(content, body, &inner, units);
            }
            _ => {}
        }
    }

    fn extract_python_item(
        &self,
        content: &str,
        node: Node,
        scope: &Scope,
        units: &mut Vec<UnitDraft>,
    ) {
        match node.kind() {
            "function_definition" => {
                let kind = if scope.owner.is_some() {
                    UnitKind::Method
                } else {
                    UnitKind::Function
                };
                if let Some(unit) = self.callable_unit(content, node, node, scope, kind) {
                    units.push(unit);
                }
            }
            "class_definition" => {
                let Some(unit) = self.class_unit(content, node, scope) else {
                    return;
                };
                let inner = Scope {
                    modules: scope.modules.clone(),
                    owner: Some(unit.symbol.clone()),
                };
                units.push(unit);
                if let Some(body) = node.child_by_field_name("body") {
                    self.extract_declarations(content, body, &inner, units);
                }
            }
            "decorated_definition" => {
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.extract_python_item(content, definition, scope, units);
                }
            }
            _ => {}
        }
    }

    fn extract_js_item(&self, content: &str, node: Node, scope: &Scope, units: &mut Vec<UnitDraft>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(unit) =
                    self.callable_unit(content, node, node, scope, UnitKind::Function)
                {
                    units.push(unit);
                }
            }
            "method_definition" if scope.owner.is_some() => {
                if let Some(unit) = self.callable_unit(content, node, node, scope, UnitKind::Method)
                {
                    units.push(unit);
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                let Some(unit) = self.class_unit(content, node, scope) else {
                    return;
                };
                let inner = Scope {
                    modules: scope.modules.clone(),
                    owner: Some(unit.symbol.clone()),
                };
                units.push(unit);
                if let Some(body) = node.child_by_field_name("body") {
                    self.extract_declarations(content, body, &inner, units);
                }
            }
            "interface_declaration" | "enum_declaration" => {
                if let Some(unit) = self.class_unit(content, node, scope) {
                    units.push(unit);
                }
            }
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    self.extract_js_item(content, declaration, scope, units);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                // const checkout = (cart) => { ... }
                let mut cursor = node.walk();
                for declarator in node.children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let is_function = declarator.child_by_field_name("value").is_some_and(|v| {
                        matches!(v.kind(), "arrow_function" | "function_expression" | "function")
                    });
                    if is_function {
                        if let Some(unit) = self.callable_unit(
                            content,
                            declarator,
                            node,
                            scope,
                            UnitKind::Function,
                        ) {
                            units.push(unit);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Build a function/method unit; `doc_anchor` is the node whose preceding
    /// lines hold the doc comment
    fn callable_unit(
        &self,
        content: &str,
        node: Node,
        doc_anchor: Node,
        scope: &Scope,
        kind: UnitKind,
    ) -> Option<UnitDraft> {
        let name = symbol_name(content, node)?;
        let symbol = self.qualify(&scope.modules, scope.owner.as_deref(), &name);

        let mut references = Vec::new();
        self.collect_references(content, node, &mut references);
        references.truncate(self.config.max_references_per_unit);

        let mut branches = Vec::new();
        self.collect_branches(node, &mut branches);

        Some(UnitDraft {
            symbol,
            name,
            kind,
            span: ByteSpan::of_node(node),
            parent_scope: scope.owner.clone(),
            documentation: self.documentation(content, node, doc_anchor),
            references,
            branches,
        })
    }

    /// Build a class-like unit; member links are added by `link_members`
    fn class_unit(&self, content: &str, node: Node, scope: &Scope) -> Option<UnitDraft> {
        let name = symbol_name(content, node)?;
        let symbol = self.qualify(&scope.modules, scope.owner.as_deref(), &name);

        Some(UnitDraft {
            symbol,
            name,
            kind: UnitKind::Class,
            span: ByteSpan::of_node(node),
            parent_scope: scope.owner.clone(),
            documentation: self.documentation(content, node, node),
            references: Vec::new(),
            branches: Vec::new(),
        })
    }

    fn qualify(&self, modules: &[String], owner: Option<&str>, name: &str) -> String {
        let sep = self.language.scope_separator();
        match owner {
            // owner is already module-qualified
            Some(owner) => format!("{owner}{sep}{name}"),
            None if modules.is_empty() => name.to_string(),
            None => format!("{}{sep}{name}", modules.join(sep)),
        }
    }

    /// Traverse AST for calls and type references
    fn collect_references(&self, content: &str, node: Node, out: &mut Vec<RawReference>) {
        let kind = node.kind();

        let call_target = match (self.language, kind) {
            (Language::Rust, "call_expression")
            | (Language::JavaScript | Language::TypeScript, "call_expression")
            | (Language::Python, "call") => node.child_by_field_name("function"),
            (Language::JavaScript | Language::TypeScript, "new_expression") => {
                node.child_by_field_name("constructor")
            }
            (Language::Rust, "struct_expression") => node.child_by_field_name("name"),
            _ => None,
        };

        if let Some(target) = call_target {
            if let Some((name, qualifier)) = self.callee_name(content, target) {
                out.push(RawReference {
                    name,
                    qualifier,
                    kind: ReferenceKind::Call,
                    site: ByteSpan::of_node(node),
                });
            }
        }

        let is_type = self.config.include_type_references
            && matches!(
                (self.language, kind),
                (Language::Rust | Language::TypeScript, "type_identifier")
            );
        if is_type {
            let name = node_text(content, node);
            if !name.is_empty() && name != "Self" {
                out.push(RawReference {
                    name: name.to_string(),
                    qualifier: None,
                    kind: ReferenceKind::Reference,
                    site: ByteSpan::of_node(node),
                });
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_references(content, child, out);
        }
    }

    /// Extract (name, qualifier) from the callee expression of a call
    fn callee_name(&self, content: &str, node: Node) -> Option<(String, Option<String>)> {
        let (name_field, qualifier_field) = match node.kind() {
            "identifier" | "type_identifier" => return Some((node_text(content, node).to_string(), None)),
            "generic_function" => {
                let inner = node.child_by_field_name("function")?;
                return self.callee_name(content, inner);
            }
            "field_expression" => ("field", "value"),
            "scoped_identifier" | "scoped_type_identifier" => ("name", "path"),
            "attribute" => ("attribute", "object"),
            "member_expression" => ("property", "object"),
            _ => return None,
        };

        let name = field_text(content, node, name_field)?;
        let qualifier = node
            .child_by_field_name(qualifier_field)
            .map(|q| last_segment(node_text(content, q)).to_string())
            .filter(|q| !q.is_empty());

        Some((name, qualifier))
    }

    /// Traverse AST for branching constructs
    fn collect_branches(&self, node: Node, out: &mut Vec<BranchMarker>) {
        let kind = node.kind();
        let in_else = node.parent().is_some_and(|p| p.kind() == "else_clause");

        let marker = match (self.language, kind) {
            (Language::Rust, "if_expression") | (_, "if_statement") => {
                let branch = if in_else { BranchKind::ElseIf } else { BranchKind::If };
                node.child_by_field_name("condition").map(|c| (branch, c))
            }
            (Language::Python, "elif_clause") => {
                node.child_by_field_name("condition").map(|c| (BranchKind::ElseIf, c))
            }
            (Language::Rust, "match_expression") => {
                node.child_by_field_name("value").map(|c| (BranchKind::Match, c))
            }
            (Language::Python, "match_statement") => {
                node.child_by_field_name("subject").map(|c| (BranchKind::Match, c))
            }
            (Language::JavaScript | Language::TypeScript, "switch_statement") => {
                node.child_by_field_name("value").map(|c| (BranchKind::Match, c))
            }
            (Language::Rust, "while_expression")
            | (Language::Python, "while_statement")
            | (Language::JavaScript | Language::TypeScript, "while_statement" | "do_statement") => {
                node.child_by_field_name("condition").map(|c| (BranchKind::Loop, c))
            }
            (Language::JavaScript | Language::TypeScript, "ternary_expression") => {
                node.child_by_field_name("condition").map(|c| (BranchKind::Ternary, c))
            }
            // body if condition else alternative
            (Language::Python, "conditional_expression") => {
                node.named_child(1).map(|c| (BranchKind::Ternary, c))
            }
            _ => None,
        };

        if let Some((kind, condition)) = marker {
            out.push(BranchMarker {
                kind,
                construct: ByteSpan::of_node(node),
                condition: ByteSpan::of_node(condition),
            });
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_branches(child, out);
        }
    }

    fn documentation(&self, content: &str, node: Node, doc_anchor: Node) -> Option<String> {
        if !self.config.include_documentation {
            return None;
        }

        let mut doc = self.extract_doc_comments(content, doc_anchor);
        if doc.is_empty() && self.language == Language::Python {
            doc = python_docstring(content, node).unwrap_or_default();
        }

        (!doc.is_empty()).then_some(doc)
    }

    /// Extract documentation comments before a node.
    /// Uses text-based scanning since comments are not part of the declaration node.
    fn extract_doc_comments(&self, content: &str, node: Node) -> String {
        let node_start_line = node.start_position().row;
        let lines: Vec<&str> = content.lines().collect();

        if node_start_line == 0 || node_start_line > lines.len() {
            return String::new();
        }

        let mut doc_lines = Vec::new();
        let mut line_idx = node_start_line;
        while line_idx > 0 {
            line_idx -= 1;
            let line = lines[line_idx].trim();

            if self.language.is_doc_line(line) {
                doc_lines.push(line);
            } else if line.starts_with("#[") || line.starts_with('@') {
                // attributes and decorators sit between docs and the item
                continue;
            } else {
                break;
            }
        }

        doc_lines.reverse();
        doc_lines.join("\n")
    }
}

/// Add containment references from each class-like unit to its members
fn link_members(units: &mut [UnitDraft]) {
    let members: Vec<(String, RawReference)> = units
        .iter()
        .filter_map(|unit| {
            let owner = unit.parent_scope.clone()?;
            let qualifier = last_segment(&owner).to_string();
            Some((
                owner,
                RawReference {
                    name: unit.name.clone(),
                    qualifier: Some(qualifier),
                    kind: ReferenceKind::Reference,
                    site: unit.span,
                },
            ))
        })
        .collect();

    for unit in units.iter_mut().filter(|u| u.kind == UnitKind::Class) {
        unit.references.extend(
            members
                .iter()
                .filter(|(owner, _)| owner == &unit.symbol)
                .map(|(_, reference)| reference.clone()),
        );
    }
}

/// Extract the target of an impl block (struct/trait name)
fn extract_impl_target(content: &str, impl_node: Node) -> Option<String> {
    let target = impl_node.child_by_field_name("type")?;

    match target.kind() {
        // impl MyStruct
        "type_identifier" => Some(node_text(content, target).to_string()),

        // impl<T> MyStruct<T>
        "generic_type" => target
            .child_by_field_name("type")
            .map(|t| last_segment(node_text(content, t)).to_string()),

        // impl module::MyStruct
        "scoped_type_identifier" => field_text(content, target, "name"),

        _ => None,
    }
}

fn python_docstring(content: &str, node: Node) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }

    let text = node_text(content, string)
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// Locate the first ERROR/MISSING node (line is 1-indexed)
fn first_syntax_error(root: Node) -> (usize, String) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return (node.start_position().row + 1, format!("missing `{}`", node.kind()));
        }
        if node.is_error() {
            return (node.start_position().row + 1, "unexpected syntax".to_string());
        }

        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        // reversed so the leftmost child is visited first
        stack.extend(children.into_iter().rev().filter(|c| c.has_error() || c.is_missing()));
    }

    (root.start_position().row + 1, "unexpected syntax".to_string())
}

fn symbol_name(content: &str, node: Node) -> Option<String> {
    if let Some(name) = field_text(content, node, "name") {
        return Some(name);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "identifier" | "name" | "type_identifier" | "property_identifier"
        ) {
            return Some(node_text(content, child).to_string());
        }
    }
    None
}

fn field_text(content: &str, node: Node, field: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(content, n).to_string())
        .filter(|s| !s.is_empty())
}

fn node_text<'a>(content: &'a str, node: Node) -> &'a str {
    content.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// `crate::billing::Invoice` → `Invoice`, `self.repo` → `repo`
fn last_segment(path: &str) -> &str {
    let path = path.trim();
    let after_colons = path.rsplit("::").next().unwrap_or(path);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

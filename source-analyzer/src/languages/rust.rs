//! Rust extractor.
//!
//! Panic-family macros are treated as the raise sites of this language;
//! their first string literal and the messages of `error!`-style logging
//! macros feed the error-string list. Methods come from `impl` blocks, with
//! the implemented type as owner.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::languages::{header_line, line_range, looks_like_type, text};
use crate::model::reference::{RefCandidate, RefKind};
use crate::model::symbol::{ImportRecord, ParsedSymbol, SymbolFacts, SymbolKind};

const PANIC_MACROS: [&str; 5] = ["panic", "unreachable", "todo", "unimplemented", "assert"];
const LOG_ERROR_MACROS: [&str; 2] = ["error", "warn"];

pub struct Extraction {
    pub symbols: Vec<ParsedSymbol>,
    pub imports: Vec<ImportRecord>,
    pub candidates: Vec<RefCandidate>,
    pub local_types: HashMap<String, String>,
}

pub fn extract(root: &Node, code: &str, file_path: &str) -> Extraction {
    let mut out = Extraction {
        symbols: Vec::new(),
        imports: Vec::new(),
        candidates: Vec::new(),
        local_types: HashMap::new(),
    };

    let module_statics = collect_module_statics(root, code);

    let mut w = root.walk();
    for item in root.children(&mut w) {
        walk_item(&item, code, file_path, &module_statics, &mut out, None);
    }
    out
}

fn collect_module_statics(root: &Node, code: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut w = root.walk();
    for item in root.children(&mut w) {
        if matches!(item.kind(), "static_item" | "const_item") {
            if let Some(n) = item.child_by_field_name("name") {
                names.push(text(code, &n));
            }
        }
    }
    names
}

fn walk_item(
    node: &Node,
    code: &str,
    file_path: &str,
    module_statics: &[String],
    out: &mut Extraction,
    owner: Option<&str>,
) {
    match node.kind() {
        "use_declaration" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                collect_use(&arg, code, line_range(node).0, out);
            }
        }
        "function_item" => {
            collect_function(node, code, file_path, module_statics, out, owner);
        }
        "struct_item" | "enum_item" | "trait_item" | "union_item" => {
            if let Some(n) = node.child_by_field_name("name") {
                let (line_start, line_end) = line_range(node);
                out.symbols.push(ParsedSymbol {
                    name: text(code, &n),
                    kind: SymbolKind::Class,
                    file_path: file_path.to_string(),
                    line_start,
                    line_end,
                    signature: Some(header_line(code, node)),
                    docstring: doc_comment_above(code, node),
                    owner: None,
                    facts: SymbolFacts::default(),
                });
            }
        }
        "impl_item" => {
            let type_name = node
                .child_by_field_name("type")
                .map(|n| text(code, &n))
                .unwrap_or_default();
            // `impl Trait for Type` is an inheritance-shaped relation.
            if let Some(tr) = node.child_by_field_name("trait") {
                out.candidates.push(RefCandidate {
                    name: last_path_segment(&text(code, &tr)),
                    qualifier: None,
                    kind: RefKind::Inherits,
                    line: line_range(node).0,
                    enclosing: Some(type_name.clone()),
                });
            }
            if let Some(body) = node.child_by_field_name("body") {
                let mut w = body.walk();
                for item in body.children(&mut w) {
                    walk_item(
                        &item,
                        code,
                        file_path,
                        module_statics,
                        out,
                        Some(type_name.as_str()),
                    );
                }
            }
        }
        "static_item" | "const_item" => {
            if let Some(n) = node.child_by_field_name("name") {
                let (line_start, line_end) = line_range(node);
                out.symbols.push(ParsedSymbol {
                    name: text(code, &n),
                    kind: SymbolKind::Variable,
                    file_path: file_path.to_string(),
                    line_start,
                    line_end,
                    signature: Some(header_line(code, node)),
                    docstring: None,
                    owner: None,
                    facts: SymbolFacts::default(),
                });
            }
        }
        "mod_item" => {
            if let Some(body) = node.child_by_field_name("body") {
                let mut w = body.walk();
                for item in body.children(&mut w) {
                    walk_item(&item, code, file_path, module_statics, out, owner);
                }
            }
        }
        _ => {}
    }
}

fn collect_use(arg: &Node, code: &str, line: u32, out: &mut Extraction) {
    match arg.kind() {
        "identifier" | "scoped_identifier" | "crate" => {
            let module = text(code, arg);
            let name = last_path_segment(&module);
            out.imports.push(ImportRecord {
                module: module.clone(),
                name: (name != module).then_some(name),
                alias: None,
                line,
            });
        }
        "use_as_clause" => {
            let module = arg
                .child_by_field_name("path")
                .map(|n| text(code, &n))
                .unwrap_or_default();
            let alias = arg.child_by_field_name("alias").map(|n| text(code, &n));
            let name = last_path_segment(&module);
            out.imports.push(ImportRecord {
                module: module.clone(),
                name: (name != module).then_some(name),
                alias,
                line,
            });
        }
        "scoped_use_list" => {
            let prefix = arg
                .child_by_field_name("path")
                .map(|n| text(code, &n))
                .unwrap_or_default();
            if let Some(list) = arg.child_by_field_name("list") {
                let mut w = list.walk();
                for item in list.children(&mut w) {
                    match item.kind() {
                        "identifier" | "scoped_identifier" => {
                            let leaf = text(code, &item);
                            out.imports.push(ImportRecord {
                                module: format!("{prefix}::{leaf}"),
                                name: Some(last_path_segment(&leaf)),
                                alias: None,
                                line,
                            });
                        }
                        "use_as_clause" => collect_use(&item, code, line, out),
                        _ => {}
                    }
                }
            }
        }
        _ => {}
    }
}

fn collect_function(
    node: &Node,
    code: &str,
    file_path: &str,
    module_statics: &[String],
    out: &mut Extraction,
    owner: Option<&str>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = text(code, &name_node);
    let (line_start, line_end) = line_range(node);

    let mut facts = SymbolFacts::default();
    let enclosing = match owner {
        Some(o) => format!("{o}.{name}"),
        None => name.clone(),
    };
    if let Some(body) = node.child_by_field_name("body") {
        collect_body_facts(
            &body,
            code,
            module_statics,
            Some(enclosing.as_str()),
            &mut facts,
            out,
        );
    }

    out.symbols.push(ParsedSymbol {
        name,
        kind: if owner.is_some() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        },
        file_path: file_path.to_string(),
        line_start,
        line_end,
        signature: Some(header_line(code, node)),
        docstring: doc_comment_above(code, node),
        owner: owner.map(str::to_string),
        facts,
    });
}

fn collect_body_facts(
    node: &Node,
    code: &str,
    module_statics: &[String],
    enclosing: Option<&str>,
    facts: &mut SymbolFacts,
    out: &mut Extraction,
) {
    match node.kind() {
        "macro_invocation" => collect_macro(node, code, facts),
        "call_expression" => collect_call(node, code, enclosing, facts, out),
        "struct_expression" => {
            if let Some(n) = node.child_by_field_name("name") {
                let ty = last_path_segment(&text(code, &n));
                out.candidates.push(RefCandidate {
                    name: ty,
                    qualifier: None,
                    kind: RefKind::Instantiates,
                    line: line_range(node).0,
                    enclosing: enclosing.map(str::to_string),
                });
            }
        }
        "let_declaration" => collect_let_binding(node, code, out),
        "assignment_expression" => {
            if let Some(left) = node.child_by_field_name("left") {
                match left.kind() {
                    "identifier" => {
                        let name = text(code, &left);
                        if module_statics.iter().any(|m| *m == name) {
                            SymbolFacts::push_unique(&mut facts.mutates, name);
                        }
                    }
                    "field_expression" => {
                        let value = left.child_by_field_name("value").map(|n| text(code, &n));
                        let field = left.child_by_field_name("field").map(|n| text(code, &n));
                        if let (Some(v), Some(f)) = (value, field) {
                            if v == "self" {
                                SymbolFacts::push_unique(&mut facts.mutates, format!("self.{f}"));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "function_item" => return,
        _ => {}
    }

    let mut w = node.walk();
    for ch in node.children(&mut w) {
        collect_body_facts(&ch, code, module_statics, enclosing, facts, out);
    }
}

fn collect_macro(node: &Node, code: &str, facts: &mut SymbolFacts) {
    let Some(mac) = node.child_by_field_name("macro") else {
        return;
    };
    let name = last_path_segment(&text(code, &mac));
    let is_panic = PANIC_MACROS.iter().any(|m| name.starts_with(m));
    let is_log_error = LOG_ERROR_MACROS.contains(&name.as_str());
    if !is_panic && !is_log_error {
        return;
    }
    if is_panic {
        SymbolFacts::push_unique(&mut facts.raises, format!("{name}!"));
    }
    if let Some(s) = first_string_token(node, code) {
        facts.push_error_string(&s);
    }
}

fn collect_call(
    node: &Node,
    code: &str,
    enclosing: Option<&str>,
    facts: &mut SymbolFacts,
    out: &mut Extraction,
) {
    let Some(f) = node.child_by_field_name("function") else {
        return;
    };
    let (line, _) = line_range(node);

    match f.kind() {
        "identifier" => {
            let name = text(code, &f);
            SymbolFacts::push_unique(&mut facts.calls, name.clone());
            out.candidates.push(RefCandidate {
                name,
                qualifier: None,
                kind: RefKind::Calls,
                line,
                enclosing: enclosing.map(str::to_string),
            });
        }
        "scoped_identifier" => {
            let path = f.child_by_field_name("path").map(|n| text(code, &n));
            let name = f
                .child_by_field_name("name")
                .map(|n| text(code, &n))
                .unwrap_or_default();
            SymbolFacts::push_unique(&mut facts.calls, name.clone());
            // `Type::new(..)` reads as instantiation of `Type`.
            let kind = match &path {
                Some(p) if looks_like_type(&last_path_segment(p)) && name == "new" => {
                    RefKind::Instantiates
                }
                _ => RefKind::Calls,
            };
            let (cand_name, qualifier) = match kind {
                RefKind::Instantiates => (last_path_segment(path.as_deref().unwrap_or("")), None),
                _ => (name, path.map(|p| p.replace("::", "."))),
            };
            out.candidates.push(RefCandidate {
                name: cand_name,
                qualifier,
                kind,
                line,
                enclosing: enclosing.map(str::to_string),
            });
        }
        "field_expression" => {
            let value = f.child_by_field_name("value").map(|n| text(code, &n));
            let field = f
                .child_by_field_name("field")
                .map(|n| text(code, &n))
                .unwrap_or_default();
            SymbolFacts::push_unique(&mut facts.calls, field.clone());
            let qualifier = value.filter(|v| {
                v.chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
            });
            out.candidates.push(RefCandidate {
                name: field,
                qualifier,
                kind: RefKind::Calls,
                line,
                enclosing: enclosing.map(str::to_string),
            });
        }
        _ => {}
    }
}

fn collect_let_binding(node: &Node, code: &str, out: &mut Extraction) {
    let Some(pattern) = node.child_by_field_name("pattern") else {
        return;
    };
    if pattern.kind() != "identifier" {
        return;
    }
    let var = text(code, &pattern);
    let Some(value) = node.child_by_field_name("value") else {
        return;
    };
    match value.kind() {
        "call_expression" => {
            if let Some(f) = value.child_by_field_name("function") {
                if f.kind() == "scoped_identifier" {
                    if let Some(path) = f.child_by_field_name("path") {
                        let ty = last_path_segment(&text(code, &path));
                        if looks_like_type(&ty) {
                            out.local_types.insert(var, ty);
                        }
                    }
                }
            }
        }
        "struct_expression" => {
            if let Some(n) = value.child_by_field_name("name") {
                let ty = last_path_segment(&text(code, &n));
                if looks_like_type(&ty) {
                    out.local_types.insert(var, ty);
                }
            }
        }
        _ => {}
    }
}

fn last_path_segment(path: &str) -> String {
    path.rsplit("::")
        .next()
        .unwrap_or(path)
        .trim()
        .to_string()
}

/// First string literal inside a macro's token tree.
fn first_string_token(node: &Node, code: &str) -> Option<String> {
    let mut stack = vec![*node];
    while let Some(n) = stack.pop() {
        if n.kind() == "string_literal" {
            let raw = text(code, &n);
            return Some(raw.trim_matches('"').to_string());
        }
        let mut w = n.walk();
        for ch in n.children(&mut w) {
            stack.push(ch);
        }
    }
    None
}

/// Consecutive `///` (or trailing `//!`) lines immediately above the item.
fn doc_comment_above(code: &str, node: &Node) -> Option<String> {
    let start_line = node.start_position().row;
    if start_line == 0 {
        return None;
    }
    let lines: Vec<&str> = code.lines().collect();
    let mut rows = Vec::new();
    let mut i = start_line as isize - 1;
    while i >= 0 {
        let s = lines.get(i as usize)?.trim_start();
        if let Some(doc) = s.strip_prefix("///") {
            rows.push(doc.trim().to_string());
            i -= 1;
        } else if s.starts_with("#[") {
            // attributes may sit between docs and the item
            i -= 1;
        } else {
            break;
        }
    }
    if rows.is_empty() {
        return None;
    }
    rows.reverse();
    Some(rows.join("\n"))
}

//! Python extractor.
//!
//! Walks the module in two mini-passes: module-level names first (so the
//! mutation tracker knows what counts as module state), then definitions
//! with their bodies. Raise targets, logger-error strings, mutations, and
//! calls are collected per enclosing symbol.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::languages::{header_line, line_range, looks_like_type, text};
use crate::model::reference::{RefCandidate, RefKind};
use crate::model::symbol::{ImportRecord, ParsedSymbol, SymbolFacts, SymbolKind};

/// Method names that mutate their receiver in place.
const MUTATOR_METHODS: [&str; 12] = [
    "append",
    "extend",
    "insert",
    "remove",
    "pop",
    "clear",
    "update",
    "add",
    "discard",
    "setdefault",
    "popitem",
    "sort",
];

const LOGGER_ERROR_METHODS: [&str; 4] = ["error", "warning", "critical", "exception"];

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

    // Pass 1: module-level variable names.
    let mut module_names: Vec<String> = Vec::new();
    let mut w = root.walk();
    for stmt in root.children(&mut w) {
        if stmt.kind() == "expression_statement" {
            let mut sw = stmt.walk();
            for e in stmt.children(&mut sw) {
                if e.kind() == "assignment" {
                    if let Some(left) = e.child_by_field_name("left") {
                        if left.kind() == "identifier" {
                            let name = text(code, &left);
                            if !module_names.contains(&name) {
                                module_names.push(name);
                            }
                        }
                    }
                }
            }
        }
    }

    // Pass 2: definitions, imports, and module-level statements.
    let mut w = root.walk();
    for stmt in root.children(&mut w) {
        walk_top(&stmt, code, file_path, &module_names, &mut out, None);
    }
    out
}

fn walk_top(
    node: &Node,
    code: &str,
    file_path: &str,
    module_names: &[String],
    out: &mut Extraction,
    owner: Option<&str>,
) {
    match node.kind() {
        "import_statement" => collect_import(node, code, out),
        "import_from_statement" => collect_import_from(node, code, out),
        "decorated_definition" => {
            if let Some(def) = node.child_by_field_name("definition") {
                walk_top(&def, code, file_path, module_names, out, owner);
            }
        }
        "function_definition" => {
            collect_function(node, code, file_path, module_names, out, owner);
        }
        "class_definition" => {
            collect_class(node, code, file_path, module_names, out);
        }
        "expression_statement" => {
            let mut w = node.walk();
            for e in node.children(&mut w) {
                if e.kind() == "assignment" && owner.is_none() {
                    collect_module_assignment(&e, code, file_path, out);
                }
                // Module-level calls are reference candidates too.
                collect_body_facts(&e, code, module_names, None, &mut SymbolFacts::default(), out);
            }
        }
        _ => {}
    }
}

fn collect_import(node: &Node, code: &str, out: &mut Extraction) {
    let (line, _) = line_range(node);
    let mut w = node.walk();
    for ch in node.children(&mut w) {
        match ch.kind() {
            "dotted_name" => out.imports.push(ImportRecord {
                module: text(code, &ch),
                name: None,
                alias: None,
                line,
            }),
            "aliased_import" => {
                let module = ch
                    .child_by_field_name("name")
                    .map(|n| text(code, &n))
                    .unwrap_or_default();
                let alias = ch.child_by_field_name("alias").map(|n| text(code, &n));
                out.imports.push(ImportRecord {
                    module,
                    name: None,
                    alias,
                    line,
                });
            }
            _ => {}
        }
    }
}

fn collect_import_from(node: &Node, code: &str, out: &mut Extraction) {
    let (line, _) = line_range(node);
    let module = node
        .child_by_field_name("module_name")
        .map(|n| text(code, &n))
        .unwrap_or_default();

    let mut w = node.walk();
    let mut saw_import_kw = false;
    for ch in node.children(&mut w) {
        if ch.kind() == "import" {
            saw_import_kw = true;
            continue;
        }
        if !saw_import_kw {
            continue;
        }
        match ch.kind() {
            "dotted_name" | "identifier" => out.imports.push(ImportRecord {
                module: module.clone(),
                name: Some(text(code, &ch)),
                alias: None,
                line,
            }),
            "aliased_import" => {
                let name = ch.child_by_field_name("name").map(|n| text(code, &n));
                let alias = ch.child_by_field_name("alias").map(|n| text(code, &n));
                out.imports.push(ImportRecord {
                    module: module.clone(),
                    name,
                    alias,
                    line,
                });
            }
            "wildcard_import" => out.imports.push(ImportRecord {
                module: module.clone(),
                name: Some("*".into()),
                alias: None,
                line,
            }),
            _ => {}
        }
    }
}

fn collect_module_assignment(node: &Node, code: &str, file_path: &str, out: &mut Extraction) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    if left.kind() != "identifier" {
        return;
    }
    let name = text(code, &left);
    let (line_start, line_end) = line_range(node);

    // `x = ClassName(...)` pins a local type for receiver resolution.
    if let Some(right) = node.child_by_field_name("right") {
        if right.kind() == "call" {
            if let Some(f) = right.child_by_field_name("function") {
                if f.kind() == "identifier" {
                    let cls = text(code, &f);
                    if looks_like_type(&cls) {
                        out.local_types.insert(name.clone(), cls);
                    }
                }
            }
        }
    }

    if out
        .symbols
        .iter()
        .any(|s| s.name == name && s.kind == SymbolKind::Variable)
    {
        return;
    }
    out.symbols.push(ParsedSymbol {
        name,
        kind: SymbolKind::Variable,
        file_path: file_path.to_string(),
        line_start,
        line_end,
        signature: None,
        docstring: None,
        owner: None,
        facts: SymbolFacts::default(),
    });
}

fn collect_class(
    node: &Node,
    code: &str,
    file_path: &str,
    module_names: &[String],
    out: &mut Extraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = text(code, &name_node);
    let (line_start, line_end) = line_range(node);

    let docstring = node
        .child_by_field_name("body")
        .and_then(|b| first_docstring(&b, code));

    out.symbols.push(ParsedSymbol {
        name: name.clone(),
        kind: SymbolKind::Class,
        file_path: file_path.to_string(),
        line_start,
        line_end,
        signature: Some(header_line(code, node)),
        docstring,
        owner: None,
        facts: SymbolFacts::default(),
    });

    // Base classes become inheritance candidates.
    if let Some(supers) = node.child_by_field_name("superclasses") {
        let mut w = supers.walk();
        for base in supers.children(&mut w) {
            match base.kind() {
                "identifier" => out.candidates.push(RefCandidate {
                    name: text(code, &base),
                    qualifier: None,
                    kind: RefKind::Inherits,
                    line: line_start,
                    enclosing: Some(name.clone()),
                }),
                "attribute" => {
                    let (qualifier, attr) = split_attribute(&base, code);
                    out.candidates.push(RefCandidate {
                        name: attr,
                        qualifier,
                        kind: RefKind::Inherits,
                        line: line_start,
                        enclosing: Some(name.clone()),
                    });
                }
                _ => {}
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut w = body.walk();
        for stmt in body.children(&mut w) {
            match stmt.kind() {
                "function_definition" => {
                    collect_function(&stmt, code, file_path, module_names, out, Some(name.as_str()));
                }
                "decorated_definition" => {
                    if let Some(def) = stmt.child_by_field_name("definition") {
                        if def.kind() == "function_definition" {
                            collect_function(
                                &def,
                                code,
                                file_path,
                                module_names,
                                out,
                                Some(name.as_str()),
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

fn collect_function(
    node: &Node,
    code: &str,
    file_path: &str,
    module_names: &[String],
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
            module_names,
            Some(enclosing.as_str()),
            &mut facts,
            out,
        );
    }

    let docstring = node
        .child_by_field_name("body")
        .and_then(|b| first_docstring(&b, code));

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
        docstring,
        owner: owner.map(str::to_string),
        facts,
    });
}

/// Recursive body walk: raises, mutations, error strings, calls, and
/// reference candidates, in one traversal.
fn collect_body_facts(
    node: &Node,
    code: &str,
    module_names: &[String],
    enclosing: Option<&str>,
    facts: &mut SymbolFacts,
    out: &mut Extraction,
) {
    match node.kind() {
        "raise_statement" => collect_raise(node, code, facts),
        "assignment" | "augmented_assignment" => {
            collect_assignment_mutation(node, code, module_names, facts, out, enclosing);
        }
        "call" => collect_call(node, code, module_names, enclosing, facts, out),
        // Nested definitions get their own symbol entry; do not fold their
        // facts into the enclosing symbol.
        "function_definition" | "class_definition" => return,
        _ => {}
    }

    let mut w = node.walk();
    for ch in node.children(&mut w) {
        collect_body_facts(&ch, code, module_names, enclosing, facts, out);
    }
}

fn collect_raise(node: &Node, code: &str, facts: &mut SymbolFacts) {
    // `raise` alone contributes nothing.
    let mut w = node.walk();
    for ch in node.children(&mut w) {
        match ch.kind() {
            "call" => {
                if let Some(f) = ch.child_by_field_name("function") {
                    let name = match f.kind() {
                        "identifier" => text(code, &f),
                        "attribute" => text(code, &f),
                        _ => continue,
                    };
                    SymbolFacts::push_unique(&mut facts.raises, name);
                }
                if let Some(args) = ch.child_by_field_name("arguments") {
                    if let Some(s) = first_string_arg(&args, code) {
                        facts.push_error_string(&s);
                    }
                }
            }
            "identifier" | "attribute" => {
                SymbolFacts::push_unique(&mut facts.raises, text(code, &ch));
            }
            _ => {}
        }
    }
}

fn collect_assignment_mutation(
    node: &Node,
    code: &str,
    module_names: &[String],
    facts: &mut SymbolFacts,
    out: &mut Extraction,
    _enclosing: Option<&str>,
) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    match left.kind() {
        "identifier" => {
            let name = text(code, &left);
            if module_names.iter().any(|m| *m == name) {
                SymbolFacts::push_unique(&mut facts.mutates, name.clone());
            }
            // Track `x = ClassName(...)` bindings inside bodies too.
            if let Some(right) = node.child_by_field_name("right") {
                if right.kind() == "call" {
                    if let Some(f) = right.child_by_field_name("function") {
                        if f.kind() == "identifier" {
                            let cls = text(code, &f);
                            if looks_like_type(&cls) {
                                out.local_types.insert(name, cls);
                            }
                        }
                    }
                }
            }
        }
        "attribute" => {
            let (qualifier, attr) = split_attribute(&left, code);
            if qualifier.as_deref() == Some("self") {
                SymbolFacts::push_unique(&mut facts.mutates, format!("self.{attr}"));
            }
        }
        // `x[k] = v` writes through x
        "subscript" => {
            if let Some(value) = left.child_by_field_name("value") {
                if value.kind() == "identifier" {
                    let name = text(code, &value);
                    if module_names.iter().any(|m| *m == name) {
                        SymbolFacts::push_unique(&mut facts.mutates, name);
                    }
                } else if value.kind() == "attribute" {
                    let (qualifier, attr) = split_attribute(&value, code);
                    if qualifier.as_deref() == Some("self") {
                        SymbolFacts::push_unique(&mut facts.mutates, format!("self.{attr}"));
                    }
                }
            }
        }
        _ => {}
    }
}

fn collect_call(
    node: &Node,
    code: &str,
    module_names: &[String],
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
        "attribute" => {
            let (qualifier, attr) = split_attribute(&f, code);

            // Mutating method call on module state or a self attribute.
            if MUTATOR_METHODS.contains(&attr.as_str()) {
                if let Some(q) = &qualifier {
                    if module_names.iter().any(|m| m == q) {
                        SymbolFacts::push_unique(&mut facts.mutates, q.clone());
                    } else if let Some(rest) = q.strip_prefix("self.") {
                        SymbolFacts::push_unique(&mut facts.mutates, format!("self.{rest}"));
                    }
                }
            }

            // Logger-style error reporting keeps its message.
            if LOGGER_ERROR_METHODS.contains(&attr.as_str()) && is_logger_name(qualifier.as_deref())
            {
                if let Some(args) = node.child_by_field_name("arguments") {
                    if let Some(s) = first_string_arg(&args, code) {
                        facts.push_error_string(&s);
                    }
                }
            }

            SymbolFacts::push_unique(&mut facts.calls, attr.clone());
            out.candidates.push(RefCandidate {
                name: attr,
                qualifier,
                kind: RefKind::Calls,
                line,
                enclosing: enclosing.map(str::to_string),
            });
        }
        _ => {}
    }
}

fn is_logger_name(qualifier: Option<&str>) -> bool {
    let Some(q) = qualifier else {
        return false;
    };
    let last = q.rsplit('.').next().unwrap_or(q);
    last == "logger" || last == "log" || last == "logging"
}

/// Split `a.b.c` into (`a.b`, `c`); qualifier is kept only when the object
/// side is a plain identifier chain.
fn split_attribute(node: &Node, code: &str) -> (Option<String>, String) {
    let attr = node
        .child_by_field_name("attribute")
        .map(|n| text(code, &n))
        .unwrap_or_default();
    let qualifier = node.child_by_field_name("object").and_then(|obj| {
        let t = text(code, &obj);
        let plain = t
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        plain.then_some(t)
    });
    (qualifier, attr)
}

fn first_docstring(body: &Node, code: &str) -> Option<String> {
    let mut w = body.walk();
    let first = body.children(&mut w).next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let mut w2 = first.walk();
    let s = first
        .children(&mut w2)
        .find(|c| c.kind() == "string")?;
    Some(string_value(&s, code))
}

fn first_string_arg(args: &Node, code: &str) -> Option<String> {
    let mut w = args.walk();
    for a in args.children(&mut w) {
        match a.kind() {
            "string" => return Some(string_value(&a, code)),
            // f-strings still carry their literal fragments.
            "concatenated_string" => {
                let mut w2 = a.walk();
                if let Some(s) = a.children(&mut w2).find(|c| c.kind() == "string") {
                    return Some(string_value(&s, code));
                }
            }
            _ => {}
        }
    }
    None
}

/// Literal content of a string node, quotes stripped.
fn string_value(node: &Node, code: &str) -> String {
    let mut parts = Vec::new();
    let mut w = node.walk();
    for ch in node.children(&mut w) {
        if ch.kind() == "string_content" {
            parts.push(text(code, &ch));
        }
    }
    if parts.is_empty() {
        text(code, node)
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string()
    } else {
        parts.join("")
    }
}

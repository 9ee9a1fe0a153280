//! Shared TypeScript/JavaScript extractor.
//!
//! The declaration shapes this pipeline cares about (functions, classes,
//! methods, imports, calls, `new`, `throw`) are identical across the two
//! grammars, so one walker serves both. `this.attr` writes map onto the
//! mutation model the same way `self.attr` does for Python.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::languages::{header_line, line_range, looks_like_type, text};
use crate::model::reference::{RefCandidate, RefKind};
use crate::model::symbol::{ImportRecord, ParsedSymbol, SymbolFacts, SymbolKind};

const LOGGER_ERROR_METHODS: [&str; 3] = ["error", "warn", "fatal"];
const MUTATOR_METHODS: [&str; 8] = [
    "push", "pop", "shift", "unshift", "splice", "sort", "set", "delete",
];

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

    let module_names = collect_module_names(root, code);

    let mut w = root.walk();
    for stmt in root.children(&mut w) {
        walk_top(&stmt, code, file_path, &module_names, &mut out);
    }
    out
}

fn collect_module_names(root: &Node, code: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut w = root.walk();
    for stmt in root.children(&mut w) {
        if matches!(stmt.kind(), "lexical_declaration" | "variable_declaration") {
            let mut sw = stmt.walk();
            for d in stmt.children(&mut sw) {
                if d.kind() == "variable_declarator" {
                    if let Some(n) = d.child_by_field_name("name") {
                        if n.kind() == "identifier" {
                            names.push(text(code, &n));
                        }
                    }
                }
            }
        }
    }
    names
}

fn walk_top(
    node: &Node,
    code: &str,
    file_path: &str,
    module_names: &[String],
    out: &mut Extraction,
) {
    match node.kind() {
        "import_statement" => collect_import(node, code, out),
        "export_statement" => {
            // Unwrap `export` and recurse into the declaration.
            let mut w = node.walk();
            for ch in node.children(&mut w) {
                walk_top(&ch, code, file_path, module_names, out);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            collect_function(node, code, file_path, module_names, out, None);
        }
        "class_declaration" => collect_class(node, code, file_path, module_names, out),
        "lexical_declaration" | "variable_declaration" => {
            collect_variables(node, code, file_path, module_names, out);
        }
        "expression_statement" => {
            let mut facts = SymbolFacts::default();
            collect_body_facts(node, code, module_names, None, &mut facts, out);
        }
        _ => {}
    }
}

fn collect_import(node: &Node, code: &str, out: &mut Extraction) {
    let (line, _) = line_range(node);
    let Some(source) = node.child_by_field_name("source") else {
        return;
    };
    let module = string_value(&source, code);

    let mut pushed = false;
    let mut w = node.walk();
    for ch in node.children(&mut w) {
        if ch.kind() != "import_clause" {
            continue;
        }
        let mut cw = ch.walk();
        for item in ch.children(&mut cw) {
            match item.kind() {
                "identifier" => {
                    // default import
                    out.imports.push(ImportRecord {
                        module: module.clone(),
                        name: Some("default".into()),
                        alias: Some(text(code, &item)),
                        line,
                    });
                    pushed = true;
                }
                "namespace_import" => {
                    let mut nw = item.walk();
                    if let Some(id) = item.children(&mut nw).find(|c| c.kind() == "identifier") {
                        out.imports.push(ImportRecord {
                            module: module.clone(),
                            name: None,
                            alias: Some(text(code, &id)),
                            line,
                        });
                        pushed = true;
                    }
                }
                "named_imports" => {
                    let mut nw = item.walk();
                    for spec in item.children(&mut nw) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let name = spec.child_by_field_name("name").map(|n| text(code, &n));
                        let alias = spec.child_by_field_name("alias").map(|n| text(code, &n));
                        out.imports.push(ImportRecord {
                            module: module.clone(),
                            name,
                            alias,
                            line,
                        });
                        pushed = true;
                    }
                }
                _ => {}
            }
        }
    }
    if !pushed {
        // side-effect import
        out.imports.push(ImportRecord {
            module,
            name: None,
            alias: None,
            line,
        });
    }
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

    out.symbols.push(ParsedSymbol {
        name: name.clone(),
        kind: SymbolKind::Class,
        file_path: file_path.to_string(),
        line_start,
        line_end,
        signature: Some(header_line(code, node)),
        docstring: jsdoc_above(code, node),
        owner: None,
        facts: SymbolFacts::default(),
    });

    // `extends Base`
    let mut w = node.walk();
    for ch in node.children(&mut w) {
        if ch.kind() == "class_heritage" {
            let mut hw = ch.walk();
            for h in ch.children(&mut hw) {
                if matches!(h.kind(), "identifier" | "member_expression") {
                    out.candidates.push(RefCandidate {
                        name: rightmost_name(&h, code),
                        qualifier: None,
                        kind: RefKind::Inherits,
                        line: line_start,
                        enclosing: Some(name.clone()),
                    });
                }
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut bw = body.walk();
        for member in body.children(&mut bw) {
            if member.kind() == "method_definition" {
                collect_method(&member, code, file_path, module_names, out, &name);
            }
        }
    }
}

fn collect_method(
    node: &Node,
    code: &str,
    file_path: &str,
    module_names: &[String],
    out: &mut Extraction,
    owner: &str,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = text(code, &name_node);
    let (line_start, line_end) = line_range(node);

    let mut facts = SymbolFacts::default();
    let enclosing = format!("{owner}.{name}");
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

    out.symbols.push(ParsedSymbol {
        name,
        kind: SymbolKind::Method,
        file_path: file_path.to_string(),
        line_start,
        line_end,
        signature: Some(header_line(code, node)),
        docstring: jsdoc_above(code, node),
        owner: Some(owner.to_string()),
        facts,
    });
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
    if let Some(body) = node.child_by_field_name("body") {
        collect_body_facts(&body, code, module_names, Some(&name), &mut facts, out);
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
        docstring: jsdoc_above(code, node),
        owner: owner.map(str::to_string),
        facts,
    });
}

fn collect_variables(
    node: &Node,
    code: &str,
    file_path: &str,
    module_names: &[String],
    out: &mut Extraction,
) {
    let mut w = node.walk();
    for d in node.children(&mut w) {
        if d.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = d.child_by_field_name("name") else {
            continue;
        };
        if name_node.kind() != "identifier" {
            continue;
        }
        let name = text(code, &name_node);
        let (line_start, line_end) = line_range(&d);

        match d.child_by_field_name("value") {
            // `const f = () => {...}` and function expressions are functions.
            Some(value) if matches!(value.kind(), "arrow_function" | "function_expression") => {
                let mut facts = SymbolFacts::default();
                if let Some(body) = value.child_by_field_name("body") {
                    collect_body_facts(&body, code, module_names, Some(&name), &mut facts, out);
                }
                out.symbols.push(ParsedSymbol {
                    name,
                    kind: SymbolKind::Function,
                    file_path: file_path.to_string(),
                    line_start,
                    line_end,
                    signature: Some(header_line(code, &d)),
                    docstring: jsdoc_above(code, node),
                    owner: None,
                    facts,
                });
            }
            Some(value) if value.kind() == "new_expression" => {
                if let Some(ctor) = value.child_by_field_name("constructor") {
                    let ty = rightmost_name(&ctor, code);
                    if looks_like_type(&ty) {
                        out.local_types.insert(name.clone(), ty);
                    }
                }
                push_variable(out, name, file_path, line_start, line_end);
            }
            _ => push_variable(out, name, file_path, line_start, line_end),
        }
    }
}

fn push_variable(
    out: &mut Extraction,
    name: String,
    file_path: &str,
    line_start: u32,
    line_end: u32,
) {
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

fn collect_body_facts(
    node: &Node,
    code: &str,
    module_names: &[String],
    enclosing: Option<&str>,
    facts: &mut SymbolFacts,
    out: &mut Extraction,
) {
    match node.kind() {
        "throw_statement" => collect_throw(node, code, facts),
        "call_expression" => collect_call(node, code, module_names, enclosing, facts, out),
        "new_expression" => {
            if let Some(ctor) = node.child_by_field_name("constructor") {
                let ty = rightmost_name(&ctor, code);
                out.candidates.push(RefCandidate {
                    name: ty,
                    qualifier: None,
                    kind: RefKind::Instantiates,
                    line: line_range(node).0,
                    enclosing: enclosing.map(str::to_string),
                });
            }
        }
        "assignment_expression" => {
            if let Some(left) = node.child_by_field_name("left") {
                match left.kind() {
                    "identifier" => {
                        let name = text(code, &left);
                        if module_names.iter().any(|m| *m == name) {
                            SymbolFacts::push_unique(&mut facts.mutates, name);
                        }
                    }
                    "member_expression" => {
                        let obj = left.child_by_field_name("object").map(|n| text(code, &n));
                        let prop = left
                            .child_by_field_name("property")
                            .map(|n| text(code, &n));
                        if let (Some(o), Some(p)) = (obj, prop) {
                            if o == "this" {
                                SymbolFacts::push_unique(&mut facts.mutates, format!("this.{p}"));
                            } else if module_names.iter().any(|m| *m == o) {
                                SymbolFacts::push_unique(&mut facts.mutates, o);
                            }
                        }
                    }
                    // `x[k] = v` writes through x
                    "subscript_expression" => {
                        if let Some(obj) = left.child_by_field_name("object") {
                            if obj.kind() == "identifier" {
                                let name = text(code, &obj);
                                if module_names.iter().any(|m| *m == name) {
                                    SymbolFacts::push_unique(&mut facts.mutates, name);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "function_declaration" | "class_declaration" => return,
        _ => {}
    }

    let mut w = node.walk();
    for ch in node.children(&mut w) {
        collect_body_facts(&ch, code, module_names, enclosing, facts, out);
    }
}

fn collect_throw(node: &Node, code: &str, facts: &mut SymbolFacts) {
    let mut w = node.walk();
    for ch in node.children(&mut w) {
        if ch.kind() == "new_expression" {
            if let Some(ctor) = ch.child_by_field_name("constructor") {
                SymbolFacts::push_unique(&mut facts.raises, rightmost_name(&ctor, code));
            }
            if let Some(args) = ch.child_by_field_name("arguments") {
                if let Some(s) = first_string_arg(&args, code) {
                    facts.push_error_string(&s);
                }
            }
        } else if ch.kind() == "identifier" {
            SymbolFacts::push_unique(&mut facts.raises, text(code, &ch));
        }
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
        "member_expression" => {
            let obj = f.child_by_field_name("object").map(|n| text(code, &n));
            let prop = f
                .child_by_field_name("property")
                .map(|n| text(code, &n))
                .unwrap_or_default();

            if MUTATOR_METHODS.contains(&prop.as_str()) {
                if let Some(o) = &obj {
                    if module_names.iter().any(|m| m == o) {
                        SymbolFacts::push_unique(&mut facts.mutates, o.clone());
                    } else if let Some(rest) = o.strip_prefix("this.") {
                        SymbolFacts::push_unique(&mut facts.mutates, format!("this.{rest}"));
                    }
                }
            }

            if LOGGER_ERROR_METHODS.contains(&prop.as_str()) && is_logger_name(obj.as_deref()) {
                if let Some(args) = node.child_by_field_name("arguments") {
                    if let Some(s) = first_string_arg(&args, code) {
                        facts.push_error_string(&s);
                    }
                }
            }

            SymbolFacts::push_unique(&mut facts.calls, prop.clone());
            let qualifier = obj.filter(|o| {
                o.chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '$')
            });
            out.candidates.push(RefCandidate {
                name: prop,
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
    matches!(last, "logger" | "log" | "console")
}

fn rightmost_name(node: &Node, code: &str) -> String {
    match node.kind() {
        "member_expression" => node
            .child_by_field_name("property")
            .map(|n| text(code, &n))
            .unwrap_or_else(|| text(code, node)),
        _ => text(code, node),
    }
}

fn first_string_arg(args: &Node, code: &str) -> Option<String> {
    let mut w = args.walk();
    for a in args.children(&mut w) {
        if matches!(a.kind(), "string" | "template_string") {
            return Some(string_value(&a, code));
        }
    }
    None
}

fn string_value(node: &Node, code: &str) -> String {
    let mut parts = Vec::new();
    let mut w = node.walk();
    for ch in node.children(&mut w) {
        if ch.kind() == "string_fragment" {
            parts.push(text(code, &ch));
        }
    }
    if parts.is_empty() {
        text(code, node)
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .to_string()
    } else {
        parts.join("")
    }
}

/// Nearest `/** ... */` block ending directly above the node.
fn jsdoc_above(code: &str, node: &Node) -> Option<String> {
    let start_line = node.start_position().row;
    if start_line == 0 {
        return None;
    }
    let lines: Vec<&str> = code.lines().collect();
    let prev = lines.get(start_line - 1)?.trim();
    if !prev.ends_with("*/") {
        return None;
    }
    // walk upward to the `/**` opener
    let mut i = start_line - 1;
    loop {
        let s = lines.get(i)?.trim();
        if s.starts_with("/**") {
            let block: Vec<String> = lines[i..start_line]
                .iter()
                .map(|l| {
                    l.trim()
                        .trim_start_matches("/**")
                        .trim_start_matches('*')
                        .trim_end_matches("*/")
                        .trim()
                        .to_string()
                })
                .filter(|l| !l.is_empty())
                .collect();
            return (!block.is_empty()).then(|| block.join("\n"));
        }
        if i == 0 {
            return None;
        }
        i -= 1;
    }
}

//! Language-specific extractors and their shared walking helpers.
//!
//! Each extractor turns a parsed Tree-sitter tree into symbols, imports,
//! reference candidates, and local type bindings. TypeScript and JavaScript
//! share one walker because their declaration shapes coincide for
//! everything this pipeline extracts.

pub mod ecma;
pub mod python;
pub mod rust;

use tree_sitter::Node;

/// 1-indexed inclusive line range of a node.
pub(crate) fn line_range(node: &Node) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

/// Byte-range text with lossy UTF-8 and clamped bounds.
pub(crate) fn text(code: &str, node: &Node) -> String {
    let len = code.len();
    let s = node.start_byte().min(len);
    let e = node.end_byte().min(len).max(s);
    String::from_utf8_lossy(&code.as_bytes()[s..e]).into_owned()
}

/// First line of a node's text, with a trailing `:` or `{` trimmed. Used as
/// a cheap signature when the grammar has no dedicated header field.
pub(crate) fn header_line(code: &str, node: &Node) -> String {
    let full = text(code, node);
    let first = full.lines().next().unwrap_or("").trim_end();
    first
        .trim_end_matches('{')
        .trim_end_matches(':')
        .trim_end()
        .to_string()
}

/// Whether a name looks like a type (leading uppercase).
pub(crate) fn looks_like_type(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

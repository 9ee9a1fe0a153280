//! Two-pass global reference resolution.
//!
//! Pass 1 builds the symbol table (plain name -> candidate symbols) and the
//! per-file import maps. Pass 2 walks every candidate reference and tries,
//! in order: same-file binding (high confidence), import-map match (high to
//! upper-medium), receiver-of-known-type (medium), then the global table
//! (low, one edge per candidate up to a cap). Unresolved candidates are
//! dropped silently and only show up in the coverage stats.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::model::language::LanguageKind;
use crate::model::reference::{
    RefCandidate, RefKind, ResolutionStats, ResolvedReference, ResolvedReferences,
};
use crate::model::symbol::{file_node_id, ParsedFile, ParsedSymbol, SymbolKind};

/// Candidates with more than this many global matches are dropped.
const AMBIGUITY_CAP: usize = 8;

const CONF_LOCAL: f32 = 0.92;
const CONF_IMPORT_DIRECT: f32 = 0.9;
const CONF_IMPORT_QUALIFIED: f32 = 0.85;
const CONF_INHERITS_PROVEN: f32 = 0.95;
const CONF_RECEIVER_TYPE: f32 = 0.7;
const CONF_GLOBAL_UNIQUE: f32 = 0.5;
const CONF_GLOBAL_AMBIGUOUS: f32 = 0.4;
const CONF_IMPORT_EDGE: f32 = 0.95;

#[derive(Clone)]
struct SymRef {
    id: String,
    file: String,
    kind: SymbolKind,
    owner: Option<String>,
}

/// Resolve all candidate references across the parsed file set.
pub fn resolve(files: &[ParsedFile]) -> ResolvedReferences {
    // Pass 1: global symbol table and path set.
    let mut table: HashMap<&str, Vec<SymRef>> = HashMap::new();
    let mut by_file: HashMap<&str, &ParsedFile> = HashMap::new();
    for f in files {
        by_file.insert(f.path.as_str(), f);
        for s in &f.symbols {
            table.entry(s.name.as_str()).or_default().push(SymRef {
                id: s.id(),
                file: f.path.clone(),
                kind: s.kind,
                owner: s.owner.clone(),
            });
        }
    }

    let mut stats = ResolutionStats::default();
    let mut edges: HashMap<(String, String, RefKind), ResolvedReference> = HashMap::new();

    let mut push_edge = |r: ResolvedReference| {
        let key = (r.source.clone(), r.target.clone(), r.kind);
        edges
            .entry(key)
            .and_modify(|e| {
                if r.confidence > e.confidence {
                    *e = r.clone();
                }
            })
            .or_insert(r);
    };

    // Pass 2: candidates.
    for f in files {
        for cand in &f.candidates {
            stats.candidates += 1;
            match resolve_candidate(f, cand, &table, &by_file) {
                Resolution::Hit(mut refs) => {
                    stats.resolved += 1;
                    for r in refs.drain(..) {
                        push_edge(r);
                    }
                }
                Resolution::Ambiguous => stats.dropped_ambiguous += 1,
                Resolution::Unknown => stats.dropped_unknown += 1,
            }
        }

        // Import edges from the synthetic file node.
        for imp in &f.imports {
            let Some(target_file) = resolve_module(&f.path, &imp.module, f.language, &by_file)
            else {
                continue;
            };
            let target = match &imp.name {
                Some(n) if n != "*" => by_file
                    .get(target_file.as_str())
                    .and_then(|tf| tf.symbols.iter().find(|s| s.name == *n))
                    .map(ParsedSymbol::id)
                    .unwrap_or_else(|| file_node_id(&target_file)),
                _ => file_node_id(&target_file),
            };
            push_edge(ResolvedReference {
                source: file_node_id(&f.path),
                target,
                kind: RefKind::Imports,
                confidence: CONF_IMPORT_EDGE,
                line: imp.line,
            });
        }
    }

    let mut references: Vec<ResolvedReference> = edges.into_values().collect();
    references.sort_by(|a, b| {
        (&a.source, &a.target, a.kind.as_str()).cmp(&(&b.source, &b.target, b.kind.as_str()))
    });

    info!(
        candidates = stats.candidates,
        resolved = stats.resolved,
        dropped_ambiguous = stats.dropped_ambiguous,
        dropped_unknown = stats.dropped_unknown,
        edges = references.len(),
        "resolution complete"
    );

    ResolvedReferences { references, stats }
}

enum Resolution {
    Hit(Vec<ResolvedReference>),
    Ambiguous,
    Unknown,
}

fn resolve_candidate(
    f: &ParsedFile,
    cand: &RefCandidate,
    table: &HashMap<&str, Vec<SymRef>>,
    by_file: &HashMap<&str, &ParsedFile>,
) -> Resolution {
    let source = source_id(f, cand);

    // Receiver-qualified calls (`s.save()`) never resolve through the bare
    // scope chain; `self`/`this` still count as the enclosing scope.
    let unqualified = matches!(cand.qualifier.as_deref(), None | Some("self") | Some("this"));

    // 1. Same-file binding via the nearest-enclosing scope chain.
    let locals: Vec<&ParsedSymbol> = f.symbols.iter().filter(|s| s.name == cand.name).collect();
    if unqualified && !locals.is_empty() {
        let chosen = if locals.len() == 1 {
            Some(locals[0])
        } else if cand.qualifier.as_deref() == Some("self")
            || cand.qualifier.as_deref() == Some("this")
        {
            // method call on self: prefer the method of the enclosing class
            let owner = cand
                .enclosing
                .as_deref()
                .and_then(|e| e.split('.').next())
                .map(str::to_string);
            locals.iter().find(|s| s.owner == owner).copied()
        } else {
            None
        };
        if let Some(sym) = chosen {
            if allows_edge(&source, &sym.id(), cand) {
                let confidence = if cand.kind == RefKind::Inherits {
                    CONF_INHERITS_PROVEN
                } else {
                    CONF_LOCAL
                };
                return Resolution::Hit(vec![make_ref(&source, sym, cand, confidence)]);
            }
            return Resolution::Unknown;
        }
        // multiple same-file matches and no receiver hint fall through
    }

    // 2. Import map: direct from-import of the name itself.
    for imp in &f.imports {
        if !unqualified || imp.local_binding() != cand.name {
            continue;
        }
        if let Some(tf) = resolve_module(&f.path, &imp.module, f.language, by_file) {
            let wanted = imp.name.as_deref().unwrap_or(cand.name.as_str());
            if let Some(sym) = by_file
                .get(tf.as_str())
                .and_then(|pf| pf.symbols.iter().find(|s| s.name == wanted))
            {
                let confidence = if cand.kind == RefKind::Inherits {
                    CONF_INHERITS_PROVEN
                } else {
                    CONF_IMPORT_DIRECT
                };
                return Resolution::Hit(vec![make_ref(&source, sym, cand, confidence)]);
            }
        }
    }

    // 2b. Import map: qualified call through a module alias (`np.array`).
    if let Some(q) = &cand.qualifier {
        for imp in &f.imports {
            if imp.local_binding() != q.as_str() || imp.name.is_some() {
                continue;
            }
            if let Some(tf) = resolve_module(&f.path, &imp.module, f.language, by_file) {
                if let Some(sym) = by_file
                    .get(tf.as_str())
                    .and_then(|pf| pf.symbols.iter().find(|s| s.name == cand.name))
                {
                    return Resolution::Hit(vec![make_ref(&source, sym, cand, CONF_IMPORT_QUALIFIED)]);
                }
            }
        }
    }

    // 3. Receiver of known type from a same-file instantiation.
    if let Some(q) = &cand.qualifier {
        if let Some(class_name) = f.local_types.get(q) {
            let method_owner = Some(class_name.clone());
            // same file first, then a globally unique class
            let mut found = f
                .symbols
                .iter()
                .find(|s| s.name == cand.name && s.owner == method_owner)
                .map(|s| make_ref(&source, s, cand, CONF_RECEIVER_TYPE));
            if found.is_none() {
                if let Some(refs) = table.get(cand.name.as_str()) {
                    let methods: Vec<&SymRef> = refs
                        .iter()
                        .filter(|r| r.owner.as_deref() == Some(class_name.as_str()))
                        .collect();
                    if methods.len() == 1 {
                        found = Some(make_ref_id(
                            &source,
                            &methods[0].id,
                            refine_kind(cand.kind, methods[0].kind),
                            CONF_RECEIVER_TYPE,
                            cand.line,
                        ));
                    }
                }
            }
            if let Some(r) = found {
                return Resolution::Hit(vec![r]);
            }
        }
    }

    // 4. Global fallback: one edge per candidate symbol, capped.
    let Some(matches) = table.get(cand.name.as_str()) else {
        debug!(name = %cand.name, file = %f.path, "unresolved reference");
        return Resolution::Unknown;
    };
    let global: Vec<&SymRef> = matches
        .iter()
        .filter(|m| m.file != f.path && m.kind.is_indexable())
        .collect();
    match global.len() {
        0 => Resolution::Unknown,
        1 => Resolution::Hit(vec![make_ref_id(
            &source,
            &global[0].id,
            refine_kind(cand.kind, global[0].kind),
            CONF_GLOBAL_UNIQUE,
            cand.line,
        )]),
        n if n <= AMBIGUITY_CAP => Resolution::Hit(
            global
                .iter()
                .map(|m| {
                    make_ref_id(
                        &source,
                        &m.id,
                        refine_kind(cand.kind, m.kind),
                        CONF_GLOBAL_AMBIGUOUS,
                        cand.line,
                    )
                })
                .collect(),
        ),
        _ => Resolution::Ambiguous,
    }
}

fn source_id(f: &ParsedFile, cand: &RefCandidate) -> String {
    match &cand.enclosing {
        Some(e) => format!("{}::{e}", f.path),
        None => file_node_id(&f.path),
    }
}

/// Self-loops are kept only for explicit recursion (the enclosing symbol
/// invoking its own name).
fn allows_edge(source: &str, target: &str, cand: &RefCandidate) -> bool {
    if source != target {
        return true;
    }
    cand.enclosing
        .as_deref()
        .map(|e| e.rsplit('.').next() == Some(cand.name.as_str()))
        .unwrap_or(false)
}

fn refine_kind(cand_kind: RefKind, target_kind: SymbolKind) -> RefKind {
    if cand_kind == RefKind::Calls && target_kind == SymbolKind::Class {
        RefKind::Instantiates
    } else {
        cand_kind
    }
}

fn make_ref(
    source: &str,
    sym: &ParsedSymbol,
    cand: &RefCandidate,
    confidence: f32,
) -> ResolvedReference {
    make_ref_id(
        source,
        &sym.id(),
        refine_kind(cand.kind, sym.kind),
        confidence,
        cand.line,
    )
}

fn make_ref_id(
    source: &str,
    target: &str,
    kind: RefKind,
    confidence: f32,
    line: u32,
) -> ResolvedReference {
    ResolvedReference {
        source: source.to_string(),
        target: target.to_string(),
        kind,
        confidence,
        line,
    }
}

/// Best-effort mapping of a module specifier to a file in the set.
fn resolve_module(
    importer: &str,
    spec: &str,
    language: LanguageKind,
    by_file: &HashMap<&str, &ParsedFile>,
) -> Option<String> {
    let exists = |p: &str| by_file.contains_key(p).then(|| p.to_string());
    match language {
        LanguageKind::Python => {
            if let Some(stripped) = spec.strip_prefix('.') {
                // relative import: one dot = same package, each extra dot
                // climbs one directory
                let extra_dots = stripped.chars().take_while(|c| *c == '.').count();
                let name = &stripped[extra_dots..];
                let mut dir: Vec<&str> = importer.split('/').collect();
                dir.pop(); // file name
                for _ in 0..extra_dots {
                    dir.pop();
                }
                let base = dir.join("/");
                let rel = name.replace('.', "/");
                let joined = if base.is_empty() {
                    rel
                } else {
                    format!("{base}/{rel}")
                };
                return exists(&format!("{joined}.py"))
                    .or_else(|| exists(&format!("{joined}/__init__.py")));
            }
            let rel = spec.replace('.', "/");
            if let Some(p) =
                exists(&format!("{rel}.py")).or_else(|| exists(&format!("{rel}/__init__.py")))
            {
                return Some(p);
            }
            // tolerate a source-root prefix (src/, app/, ...)
            let suffix_py = format!("/{rel}.py");
            let suffix_init = format!("/{rel}/__init__.py");
            let mut hits: Vec<&str> = by_file
                .keys()
                .filter(|p| p.ends_with(&suffix_py) || p.ends_with(&suffix_init))
                .copied()
                .collect();
            hits.sort_unstable();
            (hits.len() == 1).then(|| hits[0].to_string())
        }
        LanguageKind::TypeScript | LanguageKind::JavaScript => {
            if !spec.starts_with('.') {
                return None; // package import, out of repo
            }
            let mut parts: Vec<&str> = importer.split('/').collect();
            parts.pop();
            for seg in spec.split('/') {
                match seg {
                    "." | "" => {}
                    ".." => {
                        parts.pop();
                    }
                    s => parts.push(s),
                }
            }
            let base = parts.join("/");
            for suffix in [
                "", ".ts", ".tsx", ".js", ".jsx", "/index.ts", "/index.js",
            ] {
                if let Some(p) = exists(&format!("{base}{suffix}")) {
                    return Some(p);
                }
            }
            None
        }
        LanguageKind::Rust => {
            let spec = spec.strip_prefix("crate::").unwrap_or(spec);
            let rel = spec.replace("::", "/");
            exists(&format!("src/{rel}.rs"))
                .or_else(|| exists(&format!("src/{rel}/mod.rs")))
                .or_else(|| exists(&format!("{rel}.rs")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_file;

    fn parsed(path: &str, src: &str) -> ParsedFile {
        parse_file(path, src, LanguageKind::Python).unwrap()
    }

    #[test]
    fn from_import_call_resolves_high() {
        let deps = parsed("api/deps.py", "def get_db(name):\n    return name\n");
        let notes = parsed(
            "api/routers/notes.py",
            "from api.deps import get_db\n\ndef get_notes_service():\n    return get_db(\"notes\")\n",
        );
        let out = resolve(&[deps, notes]);
        let edge = out
            .references
            .iter()
            .find(|r| r.target == "api/deps.py::get_db" && r.kind == RefKind::Calls)
            .unwrap();
        assert_eq!(edge.source, "api/routers/notes.py::get_notes_service");
        assert!(edge.confidence >= 0.9);
    }

    #[test]
    fn same_file_call_resolves_high() {
        let f = parsed(
            "svc.py",
            "def helper():\n    return 1\n\ndef main():\n    return helper()\n",
        );
        let out = resolve(&[f]);
        let edge = out
            .references
            .iter()
            .find(|r| r.target == "svc.py::helper")
            .unwrap();
        assert_eq!(edge.source, "svc.py::main");
        assert!(edge.confidence >= 0.9);
    }

    #[test]
    fn recursion_keeps_self_loop() {
        let f = parsed("rec.py", "def walk(n):\n    return walk(n - 1)\n");
        let out = resolve(&[f]);
        assert!(out
            .references
            .iter()
            .any(|r| r.source == "rec.py::walk" && r.target == "rec.py::walk"));
    }

    #[test]
    fn instantiation_refines_kind() {
        let f = parsed(
            "app.py",
            "class Service:\n    pass\n\ndef make():\n    return Service()\n",
        );
        let out = resolve(&[f]);
        let edge = out
            .references
            .iter()
            .find(|r| r.target == "app.py::Service" && r.source == "app.py::make")
            .unwrap();
        assert_eq!(edge.kind, RefKind::Instantiates);
    }

    #[test]
    fn known_receiver_method_is_medium() {
        let f = parsed(
            "svc.py",
            "class Store:\n    def save(self):\n        pass\n\ndef run():\n    s = Store()\n    s.save()\n",
        );
        let out = resolve(&[f]);
        let edge = out
            .references
            .iter()
            .find(|r| r.target == "svc.py::Store.save")
            .unwrap();
        assert!((edge.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn ambiguous_bare_name_fans_out_low() {
        let a = parsed("a.py", "def handle():\n    pass\n");
        let b = parsed("b.py", "def handle():\n    pass\n");
        let c = parsed("c.py", "def run():\n    handle()\n");
        let out = resolve(&[a, b, c]);
        let edges: Vec<_> = out
            .references
            .iter()
            .filter(|r| r.source == "c.py::run" && r.kind == RefKind::Calls)
            .collect();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.confidence <= 0.5));
    }

    #[test]
    fn unknown_names_are_dropped_silently() {
        let f = parsed("x.py", "def run():\n    mystery_call()\n");
        let out = resolve(&[f]);
        assert!(out
            .references
            .iter()
            .all(|r| r.kind == RefKind::Imports || !r.target.contains("mystery_call")));
        assert_eq!(out.stats.dropped_unknown, 1);
    }

    #[test]
    fn import_edges_come_from_file_node() {
        let deps = parsed("api/deps.py", "def get_db(name):\n    return name\n");
        let notes = parsed("api/notes.py", "from api.deps import get_db\n");
        let out = resolve(&[deps, notes]);
        let edge = out
            .references
            .iter()
            .find(|r| r.kind == RefKind::Imports)
            .unwrap();
        assert_eq!(edge.source, file_node_id("api/notes.py"));
        assert_eq!(edge.target, "api/deps.py::get_db");
    }

    #[test]
    fn resolution_is_deterministic() {
        let files = vec![
            parsed("api/deps.py", "def get_db(name):\n    return name\n"),
            parsed(
                "api/notes.py",
                "from api.deps import get_db\n\ndef svc():\n    return get_db(\"n\")\n",
            ),
        ];
        let a = resolve(&files);
        let b = resolve(&files);
        assert_eq!(a.references, b.references);
        assert_eq!(a.stats, b.stats);
    }
}

//! Filesystem scanning with diagnostics.
//!
//! Applies, in order: a coarse directory filter (vendor/VCS folders), the
//! ignore globs, the size cap, and a binary sniff (NUL byte in the first
//! 1 KB). Surviving files get a language tag from their extension.

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::errors::AnalyzerError;
use crate::model::language::{detect_language, LanguageKind};

/// Default file-size cap: 500 KB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 500 * 1024;

const BINARY_SNIFF_BYTES: usize = 1024;

/// What to skip during discovery.
#[derive(Debug, Clone)]
pub struct IgnoreSpec {
    pub max_file_bytes: u64,
    /// Glob patterns relative to the repo root (`.oyaignore` lines).
    pub globs: Vec<String>,
}

impl Default for IgnoreSpec {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            globs: Vec::new(),
        }
    }
}

impl IgnoreSpec {
    /// Load glob lines from an `.oyaignore` file if present. Blank lines
    /// and `#` comments are skipped.
    pub fn with_ignore_file(mut self, path: &Path) -> Self {
        if let Ok(raw) = fs::read_to_string(path) {
            for line in raw.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                self.globs.push(line.to_string());
            }
        }
        self
    }
}

/// One discovered file.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Absolute path on disk.
    pub abs_path: PathBuf,
    /// Repo-relative path with forward slashes.
    pub rel_path: String,
    pub language: Option<LanguageKind>,
    pub size: u64,
}

/// Discovery result plus skip counters for diagnostics.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub root: PathBuf,
    pub files: Vec<ScannedFile>,
    pub skipped_ignored: usize,
    pub skipped_too_big: usize,
    pub skipped_binary: usize,
}

/// Walk `root` and collect candidate source files.
pub fn scan_repo(root: &Path, spec: &IgnoreSpec) -> Result<ScanOutcome, AnalyzerError> {
    if !root.exists() {
        return Err(AnalyzerError::Scan(format!(
            "root does not exist: {}",
            root.display()
        )));
    }
    let root = dunce::canonicalize(root)?;
    info!("scan: start -> {}", root.display());

    let ignore_globs = build_globset(&spec.globs);

    let mut files = Vec::<ScannedFile>::new();
    let mut skipped_ignored = 0usize;
    let mut skipped_too_big = 0usize;
    let mut skipped_binary = 0usize;

    let walker = WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(keep_entry);

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = relative_slash_path(&root, path);

        if let Some(set) = &ignore_globs {
            if set.is_match(&rel) {
                skipped_ignored += 1;
                debug!("scan: ignore (glob) {rel}");
                continue;
            }
        }

        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                warn!("scan: metadata failed for {}: {}", path.display(), err);
                continue;
            }
        };
        let size = meta.len();
        if size > spec.max_file_bytes {
            skipped_too_big += 1;
            debug!(
                "scan: skip (size {} > max {}) {rel}",
                size, spec.max_file_bytes
            );
            continue;
        }

        match looks_binary(path) {
            Ok(true) => {
                skipped_binary += 1;
                debug!("scan: skip (binary) {rel}");
                continue;
            }
            Ok(false) => {}
            Err(err) => {
                warn!("scan: sniff failed for {}: {}", path.display(), err);
                continue;
            }
        }

        files.push(ScannedFile {
            abs_path: path.to_path_buf(),
            rel_path: rel,
            language: detect_language(path),
            size,
        });
    }

    info!(
        "scan: done, total={} (ignored={}, too_big={}, binary={})",
        files.len(),
        skipped_ignored,
        skipped_too_big,
        skipped_binary
    );

    Ok(ScanOutcome {
        root,
        files,
        skipped_ignored,
        skipped_too_big,
        skipped_binary,
    })
}

/// Coarse directory filter to avoid descending into heavy/vendor folders.
fn keep_entry(entry: &DirEntry) -> bool {
    if entry.file_type().is_dir() {
        if let Some(name) = entry.file_name().to_str() {
            return !matches!(
                name,
                ".git"
                    | ".hg"
                    | "node_modules"
                    | "target"
                    | "build"
                    | "dist"
                    | "__pycache__"
                    | ".venv"
                    | "venv"
                    | ".idea"
                    | ".vscode"
            );
        }
    }
    true
}

/// NUL byte within the first 1 KB marks the file as binary.
fn looks_binary(path: &Path) -> std::io::Result<bool> {
    let mut f = fs::File::open(path)?;
    let mut buf = [0u8; BINARY_SNIFF_BYTES];
    let n = f.read(&mut buf)?;
    Ok(buf[..n].contains(&0))
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for p in patterns {
        match Glob::new(p) {
            Ok(g) => {
                builder.add(g);
                any = true;
            }
            Err(err) => warn!("scan: invalid ignore glob `{p}`: {err}"),
        }
    }
    if !any {
        return None;
    }
    builder.build().ok()
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        let mut f = fs::File::create(p).unwrap();
        f.write_all(bytes).unwrap();
    }

    #[test]
    fn scans_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.py", b"print('hi')\n");
        write(dir.path(), "src/util.rs", b"pub fn f() {}\n");
        write(dir.path(), "docs/readme.md", b"# hi\n");

        let out = scan_repo(dir.path(), &IgnoreSpec::default()).unwrap();
        assert_eq!(out.files.len(), 3);
        let py = out
            .files
            .iter()
            .find(|f| f.rel_path == "src/app.py")
            .unwrap();
        assert_eq!(py.language, Some(LanguageKind::Python));
        let md = out
            .files
            .iter()
            .find(|f| f.rel_path == "docs/readme.md")
            .unwrap();
        assert_eq!(md.language, None);
    }

    #[test]
    fn skips_binary_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "blob.bin", b"ab\x00cd");
        write(dir.path(), "big.py", &vec![b'x'; 600]);
        write(dir.path(), "ok.py", b"x = 1\n");

        let spec = IgnoreSpec {
            max_file_bytes: 500,
            globs: Vec::new(),
        };
        let out = scan_repo(dir.path(), &spec).unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.files[0].rel_path, "ok.py");
        assert_eq!(out.skipped_binary, 1);
        assert_eq!(out.skipped_too_big, 1);
    }

    #[test]
    fn ignore_globs_apply() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "gen/out.py", b"x = 1\n");
        write(dir.path(), "src/in.py", b"x = 1\n");

        let spec = IgnoreSpec {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            globs: vec!["gen/**".into()],
        };
        let out = scan_repo(dir.path(), &spec).unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.files[0].rel_path, "src/in.py");
        assert_eq!(out.skipped_ignored, 1);
    }

    #[test]
    fn empty_repo_scans_clean() {
        let dir = tempfile::tempdir().unwrap();
        let out = scan_repo(dir.path(), &IgnoreSpec::default()).unwrap();
        assert!(out.files.is_empty());
    }
}

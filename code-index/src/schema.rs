//! Schema for the code index database.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Initial DDL. List-valued columns hold JSON arrays of strings.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    symbol_name TEXT NOT NULL,
    kind TEXT NOT NULL,
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    signature TEXT,
    docstring TEXT,
    calls TEXT NOT NULL DEFAULT '[]',
    called_by TEXT NOT NULL DEFAULT '[]',
    raises TEXT NOT NULL DEFAULT '[]',
    mutates TEXT NOT NULL DEFAULT '[]',
    error_strings TEXT NOT NULL DEFAULT '[]',
    source_hash TEXT NOT NULL,
    UNIQUE(file_path, symbol_name)
);

CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_path);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(symbol_name);
";

pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1);
";

pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

//! Database schema definition for the depcycle cache.

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- One row per analyzed source file
CREATE TABLE IF NOT EXISTS file_cache (
    path TEXT PRIMARY KEY,
    fingerprint INTEGER NOT NULL,
    mtime_ns INTEGER NOT NULL,
    size_bytes INTEGER NOT NULL,
    namespace TEXT NOT NULL,
    declared_names TEXT NOT NULL,
    recorded_names TEXT NOT NULL,
    last_analyzed TEXT NOT NULL,
    analysis TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_file_cache_namespace ON file_cache(namespace);

-- Cycles of the last committed run, per level
CREATE TABLE IF NOT EXISTS known_cycles (
    level TEXT NOT NULL,
    id TEXT NOT NULL,
    members TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    PRIMARY KEY (level, id)
);
";

/// Tables backing the challenge and grant stores. Both live in one SQLite file
/// so any process on the host observes the same state.
pub const ELEVATION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS challenges (
    id          TEXT PRIMARY KEY,
    code        TEXT NOT NULL,
    session     TEXT NOT NULL,
    action      TEXT NOT NULL,
    expires     INTEGER NOT NULL,
    used        INTEGER NOT NULL DEFAULT 0,
    created_at  INTEGER NOT NULL,
    verified_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_challenges_session ON challenges (session, code);
CREATE INDEX IF NOT EXISTS idx_challenges_expires ON challenges (expires);

CREATE TABLE IF NOT EXISTS grants (
    session     TEXT PRIMARY KEY,
    usuario_id  TEXT NOT NULL,
    expires     INTEGER NOT NULL,
    granted_at  INTEGER NOT NULL,
    renewed_at  INTEGER
);

CREATE INDEX IF NOT EXISTS idx_grants_expires ON grants (expires);
"#;

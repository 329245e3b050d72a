//! Database schema and migrations.

/// Database migrations, applied in order.
///
/// The schema_version table records which ones have run.
pub const MIGRATIONS: &[&str] = &[
    // v1: users and their directory documents
    r#"
CREATE TABLE users (
    id          TEXT PRIMARY KEY,          -- uuid
    username    TEXT NOT NULL UNIQUE,
    email       TEXT NOT NULL DEFAULT '',
    directory   TEXT NOT NULL,             -- JSON directory tree
    version     INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_users_email ON users(email);
"#,
];

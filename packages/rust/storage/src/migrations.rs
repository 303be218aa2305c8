//! SQL migration definitions for the Folio database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: author, article, category, article_category",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Authors are owned elsewhere; this table is a read-only mirror.
CREATE TABLE IF NOT EXISTS author (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    email      TEXT NOT NULL DEFAULT '',
    bio        TEXT NOT NULL DEFAULT '',
    avatar     TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS article (
    id                   TEXT PRIMARY KEY,
    title                TEXT NOT NULL,
    slug                 TEXT NOT NULL UNIQUE,
    content              TEXT NOT NULL,
    thumbnail            TEXT NOT NULL DEFAULT '',
    image                TEXT NOT NULL DEFAULT '',
    short_description    TEXT NOT NULL DEFAULT '',
    meta_description     TEXT NOT NULL DEFAULT '',
    keywords             TEXT NOT NULL DEFAULT '[]',
    tags                 TEXT NOT NULL DEFAULT '[]',
    author_id            TEXT NOT NULL,
    reading_time_minutes INTEGER NOT NULL DEFAULT 0,
    views                INTEGER NOT NULL DEFAULT 0,
    likes                INTEGER NOT NULL DEFAULT 0,
    comments             INTEGER NOT NULL DEFAULT 0,
    published            INTEGER NOT NULL DEFAULT 0,
    published_at         TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_article_author ON article(author_id);

CREATE TABLE IF NOT EXISTS category (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    image       TEXT NOT NULL DEFAULT '',
    parent_id   TEXT REFERENCES category(id) ON DELETE SET NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_category_parent ON category(parent_id);
CREATE INDEX IF NOT EXISTS idx_category_name ON category(name);

CREATE TABLE IF NOT EXISTS article_category (
    article_id  TEXT NOT NULL REFERENCES article(id) ON DELETE CASCADE,
    category_id TEXT NOT NULL REFERENCES category(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (article_id, category_id)
);

CREATE INDEX IF NOT EXISTS idx_article_category_category ON article_category(category_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index article publication state",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_article_published ON article(published, published_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

/// Latest schema version known to this build.
pub(crate) fn latest_version() -> u32 {
    all_migrations()
        .last()
        .map(|m| m.version)
        .unwrap_or_default()
}

//! SQL schema for the blueprint SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS blueprints (
    blueprint_id    TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    industry_type   TEXT NOT NULL,
    description     TEXT,
    status          TEXT NOT NULL DEFAULT 'draft',  -- 'draft' | 'active' | 'inactive'
    current_version INTEGER NOT NULL,               -- mirrors MAX(blueprint_versions.version)
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Versions are append-only; only publication columns are ever updated.
CREATE TABLE IF NOT EXISTS blueprint_versions (
    blueprint_id       TEXT NOT NULL REFERENCES blueprints(blueprint_id),
    version            INTEGER NOT NULL,
    change_type        TEXT NOT NULL,   -- CREATE | UPDATE | PUBLISH | DEPRECATE
    change_description TEXT NOT NULL,
    config_json        TEXT NOT NULL,   -- configuration snapshot (JSON object)
    is_published       INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL,
    published_at       TEXT,
    PRIMARY KEY (blueprint_id, version),
    CHECK (version >= 1)
);

CREATE TABLE IF NOT EXISTS factories (
    factory_id    TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    industry_type TEXT,
    created_at    TEXT NOT NULL
);

-- One row per bound factory; unbinding deletes the row.
CREATE TABLE IF NOT EXISTS factory_bindings (
    blueprint_id        TEXT NOT NULL REFERENCES blueprints(blueprint_id),
    factory_id          TEXT NOT NULL REFERENCES factories(factory_id),
    applied_version     INTEGER NOT NULL,
    notification_status TEXT NOT NULL DEFAULT 'NONE',
    last_applied_at     TEXT NOT NULL,
    PRIMARY KEY (blueprint_id, factory_id),
    UNIQUE (factory_id),
    FOREIGN KEY (blueprint_id, applied_version)
      REFERENCES blueprint_versions(blueprint_id, version)
);

-- Every accepted binding transition; strictly append-only and kept after
-- the binding or blueprint is gone.
CREATE TABLE IF NOT EXISTS binding_events (
    event_id        TEXT PRIMARY KEY,
    blueprint_id    TEXT NOT NULL,
    factory_id      TEXT NOT NULL,
    action          TEXT NOT NULL,   -- 'apply' | 'rollback' | 'unbind'
    from_version    INTEGER NOT NULL,
    to_version      INTEGER NOT NULL,
    reason          TEXT,
    components_json TEXT NOT NULL DEFAULT '[]',
    recorded_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS bindings_blueprint_idx ON factory_bindings(blueprint_id);
CREATE INDEX IF NOT EXISTS events_factory_idx     ON binding_events(factory_id);

PRAGMA user_version = 1;
";

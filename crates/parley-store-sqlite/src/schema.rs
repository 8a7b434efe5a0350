//! SQL schema for the Parley SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Messages are never deleted. Only read_by and reactions are ever UPDATEd.
-- `seq` defines log order; created_at is informational.
CREATE TABLE IF NOT EXISTS messages (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id  TEXT NOT NULL UNIQUE,
    sender      TEXT NOT NULL,
    recipient   TEXT,                      -- set for private messages
    group_name  TEXT,                      -- set for group messages
    body_kind   TEXT NOT NULL,             -- 'text' | 'sticker'
    body        TEXT NOT NULL,
    color       TEXT,
    avatar      TEXT,
    created_at  TEXT NOT NULL,             -- RFC 3339 UTC, microseconds
    read_by     TEXT NOT NULL DEFAULT '[]',
    reactions   TEXT NOT NULL DEFAULT '[]',
    reply_to    TEXT,
    CHECK ((recipient IS NULL) <> (group_name IS NULL))
);

CREATE TABLE IF NOT EXISTS chat_groups (
    name        TEXT PRIMARY KEY,
    admin       TEXT NOT NULL,
    avatar      TEXT,
    created_at  TEXT NOT NULL
);

-- Membership only grows.
CREATE TABLE IF NOT EXISTS group_members (
    group_name  TEXT NOT NULL REFERENCES chat_groups(name),
    principal   TEXT NOT NULL,
    joined_at   TEXT NOT NULL,
    PRIMARY KEY (group_name, principal)
);

CREATE INDEX IF NOT EXISTS messages_private_idx ON messages(sender, recipient);
CREATE INDEX IF NOT EXISTS messages_group_idx   ON messages(group_name);
CREATE INDEX IF NOT EXISTS messages_reply_idx   ON messages(reply_to);
CREATE INDEX IF NOT EXISTS members_principal_idx ON group_members(principal);

PRAGMA user_version = 1;
";

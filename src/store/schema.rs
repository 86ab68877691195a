pub const SCHEMA: &str = r#"
-- Accounts; password_hash is an argon2id PHC string
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- One row per outstanding refresh token (one per signed-in device)
CREATE TABLE IF NOT EXISTS refresh_tokens (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL UNIQUE,   -- hex sha256 of the signed token
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id);

-- At most one live reset code per email
CREATE TABLE IF NOT EXISTS reset_codes (
    email TEXT PRIMARY KEY,
    code TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

-- Study plans are written by the syllabus workflow; courses holds the JSON document
CREATE TABLE IF NOT EXISTS study_plans (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    courses TEXT NOT NULL DEFAULT '[]',
    total_courses INTEGER,
    saved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_study_plans_user_saved ON study_plans(user_id, saved_at DESC);
"#;

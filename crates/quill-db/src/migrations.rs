use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'reader',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE novels (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                title                TEXT NOT NULL,
                description          TEXT NOT NULL DEFAULT '',
                cover_image          TEXT NOT NULL DEFAULT '',
                author_id            INTEGER NOT NULL REFERENCES users(id),
                status               TEXT NOT NULL DEFAULT 'ongoing',
                last_chapter_number  INTEGER NOT NULL DEFAULT 0,
                created_at           TEXT NOT NULL,
                updated_at           TEXT NOT NULL
            );

            CREATE INDEX idx_novels_updated ON novels(updated_at);
            CREATE INDEX idx_novels_author ON novels(author_id, updated_at);

            CREATE TABLE chapters (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                novel_id        INTEGER NOT NULL REFERENCES novels(id),
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                author_note     TEXT NOT NULL DEFAULT '',
                chapter_number  INTEGER NOT NULL CHECK (chapter_number > 0),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                UNIQUE(novel_id, chapter_number)
            );

            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                content     TEXT NOT NULL,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                novel_id    INTEGER NOT NULL REFERENCES novels(id),
                chapter_id  INTEGER REFERENCES chapters(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_novel ON comments(novel_id, created_at);

            CREATE TABLE drafts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL DEFAULT 'Untitled Draft',
                content         TEXT NOT NULL DEFAULT '',
                novel_id        INTEGER NOT NULL REFERENCES novels(id),
                user_id         INTEGER NOT NULL REFERENCES users(id),
                is_published    INTEGER NOT NULL DEFAULT 0,
                chapter_number  INTEGER,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_drafts_owner ON drafts(novel_id, user_id, updated_at);

            CREATE TABLE user_settings (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          INTEGER NOT NULL UNIQUE REFERENCES users(id),
                nickname         TEXT,
                openai_api_key   TEXT,
                openai_base_url  TEXT,
                openai_model     TEXT,
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}

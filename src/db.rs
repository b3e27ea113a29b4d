use sqlx::SqlitePool;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA temp_store=MEMORY;").execute(pool).await {
        tracing::warn!("Failed to set temp_store: {}", e);
    }

    // books table (catalog, invariant: 0 <= available_copies <= total_copies)
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            isbn TEXT NOT NULL UNIQUE,
            category TEXT NOT NULL,
            total_copies INTEGER NOT NULL DEFAULT 1,
            available_copies INTEGER NOT NULL DEFAULT 1,
            description TEXT NULL,
            published_year INTEGER NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            CHECK (available_copies >= 0),
            CHECK (available_copies <= total_copies)
        )"#,
    )
    .execute(pool)
    .await?;

    // users table
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            matric_no TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('student','admin')),
            face_id TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    // borrows table (one row per checkout of one copy)
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS borrows (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            borrow_date TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            due_date TEXT NOT NULL,
            return_date TEXT NULL,
            status TEXT NOT NULL DEFAULT 'borrowed' CHECK (status IN ('borrowed','overdue','returned')),
            fine REAL NOT NULL DEFAULT 0,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(book_id) REFERENCES books(id)
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_borrows_user_status", "CREATE INDEX IF NOT EXISTS idx_borrows_user_status ON borrows(user_id, status)"),
        ("idx_borrows_status_due", "CREATE INDEX IF NOT EXISTS idx_borrows_status_due ON borrows(status, due_date)"),
        ("idx_borrows_book", "CREATE INDEX IF NOT EXISTS idx_borrows_book ON borrows(book_id)"),
        ("idx_borrows_borrow_date", "CREATE INDEX IF NOT EXISTS idx_borrows_borrow_date ON borrows(borrow_date DESC)"),
        ("idx_books_category", "CREATE INDEX IF NOT EXISTS idx_books_category ON books(category)"),
        ("idx_books_created", "CREATE INDEX IF NOT EXISTS idx_books_created ON books(created_at DESC)"),
        ("idx_users_role", "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            // Check if it's a "already exists" error
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}

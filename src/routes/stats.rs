use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use sqlx::Row;

use crate::{
    error::AppResult,
    state::AppState,
    types::{BookStats, BorrowingStats, CategoryStat, StatsResponse, UserStats},
};

/// Aggregate dashboard statistics: a consistent read-side snapshot over the
/// book, user and borrow collections. No state is mutated here.
pub async fn get_statistics(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let db = &state.db;

    let book_row = sqlx::query(
        r#"SELECT COUNT(*) AS total_books,
                  COALESCE(SUM(total_copies), 0) AS total_copies,
                  COALESCE(SUM(available_copies), 0) AS available_copies
           FROM books"#,
    )
    .fetch_one(db)
    .await?;
    let total_copies: i64 = book_row.get("total_copies");
    let available_copies: i64 = book_row.get("available_copies");
    let books = BookStats {
        total_books: book_row.get("total_books"),
        total_copies,
        available_copies,
        borrowed_copies: total_copies - available_copies,
    };

    let user_row = sqlx::query(
        r#"SELECT COUNT(*) AS total_users,
                  COALESCE(SUM(CASE WHEN role = 'student' THEN 1 ELSE 0 END), 0) AS student_users,
                  COALESCE(SUM(CASE WHEN role = 'admin' THEN 1 ELSE 0 END), 0) AS admin_users
           FROM users"#,
    )
    .fetch_one(db)
    .await?;
    let users = UserStats {
        total_users: user_row.get("total_users"),
        student_users: user_row.get("student_users"),
        admin_users: user_row.get("admin_users"),
    };

    // Overdue counts include records a listing has already flipped to
    // 'overdue' as well as borrowed records whose due date has passed but
    // that nobody has read since.
    let now = Utc::now().to_rfc3339();
    let borrow_row = sqlx::query(
        r#"SELECT
             COALESCE(SUM(CASE WHEN status IN ('borrowed','overdue') THEN 1 ELSE 0 END), 0) AS active_borrowings,
             COALESCE(SUM(CASE WHEN status = 'overdue'
                                 OR (status = 'borrowed' AND due_date < ?1) THEN 1 ELSE 0 END), 0) AS overdue_items,
             COALESCE(SUM(CASE WHEN status = 'returned' THEN 1 ELSE 0 END), 0) AS returned_items,
             COALESCE(SUM(CASE WHEN fine > 0 THEN fine ELSE 0.0 END), 0.0) AS total_fines
           FROM borrows"#,
    )
    .bind(&now)
    .fetch_one(db)
    .await?;
    let total_fines: f64 = borrow_row.get("total_fines");
    let borrowings = BorrowingStats {
        active_borrowings: borrow_row.get("active_borrowings"),
        overdue_items: borrow_row.get("overdue_items"),
        returned_items: borrow_row.get("returned_items"),
        total_fines: (total_fines * 100.0).round() / 100.0,
    };

    let category_rows = sqlx::query(
        r#"SELECT category,
                  COALESCE(SUM(total_copies - available_copies), 0) AS borrow_count
           FROM books GROUP BY category
           ORDER BY borrow_count DESC, category ASC"#,
    )
    .fetch_all(db)
    .await?;
    let categories: Vec<CategoryStat> = category_rows
        .into_iter()
        .map(|r| CategoryStat { category: r.get("category"), borrow_count: r.get("borrow_count") })
        .collect();

    Ok(Json(StatsResponse { books, users, borrowings, categories }))
}

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    error::AppResult,
    ledger,
    middleware::ip::extract_ip_from_headers,
    state::AppState,
    types::{
        BookSummary, BorrowWithBook, BorrowWithDetails, CreateLoanRequest, ReturnLoanRequest,
        UserSummary,
    },
};

pub async fn create_loan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateLoanRequest>,
) -> AppResult<Response> {
    // Per-endpoint rate limit: "/borrow"
    let ip = extract_ip_from_headers(&headers, None);
    if let Err((status, body)) = state.rate_limiter.check_endpoint_limit("/borrow", ip).await {
        return Ok((status, body).into_response());
    }

    let record = ledger::create_loan(
        &state.db,
        &req.user_id,
        &req.book_id,
        state.config.loans.loan_period_days,
    )
    .await?;

    state.metrics.inc_loans_created();
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

pub async fn return_loan(
    State(state): State<AppState>,
    Json(req): Json<ReturnLoanRequest>,
) -> AppResult<impl IntoResponse> {
    let record =
        ledger::return_loan(&state.db, &req.borrow_id, state.config.loans.fine_per_day).await?;

    state.metrics.inc_loans_returned();
    if record.fine > 0.0 {
        state.metrics.add_fine_assessed(record.fine);
    }
    Ok(Json(record))
}

/// Active loans (borrowed or overdue) of one user, freshly re-evaluated.
pub async fn current_borrows(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let rows = sqlx::query(
        r#"SELECT b.*, bk.title, bk.author, bk.isbn
           FROM borrows b JOIN books bk ON bk.id = b.book_id
           WHERE b.user_id = ?1 AND b.status IN ('borrowed','overdue')
           ORDER BY b.borrow_date DESC"#,
    )
    .bind(user_id.to_string())
    .fetch_all(&state.db)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    let mut books = Vec::with_capacity(rows.len());
    for row in &rows {
        records.push(ledger::record_from_row(row)?);
        books.push(BookSummary {
            title: row.get("title"),
            author: row.get("author"),
            isbn: row.get("isbn"),
        });
    }

    let newly_overdue =
        ledger::refresh_overdue(&state.db, &mut records, state.config.loans.fine_per_day).await?;
    state.metrics.add_loans_marked_overdue(newly_overdue);

    let items: Vec<BorrowWithBook> = records
        .into_iter()
        .zip(books)
        .map(|(record, book)| BorrowWithBook { record, book })
        .collect();
    Ok(Json(items))
}

/// Full borrowing history of one user, newest first.
pub async fn borrow_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let rows = sqlx::query(
        r#"SELECT b.*, bk.title, bk.author, bk.isbn
           FROM borrows b JOIN books bk ON bk.id = b.book_id
           WHERE b.user_id = ?1
           ORDER BY b.borrow_date DESC"#,
    )
    .bind(user_id.to_string())
    .fetch_all(&state.db)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    let mut books = Vec::with_capacity(rows.len());
    for row in &rows {
        records.push(ledger::record_from_row(row)?);
        books.push(BookSummary {
            title: row.get("title"),
            author: row.get("author"),
            isbn: row.get("isbn"),
        });
    }

    let newly_overdue =
        ledger::refresh_overdue(&state.db, &mut records, state.config.loans.fine_per_day).await?;
    state.metrics.add_loans_marked_overdue(newly_overdue);

    let items: Vec<BorrowWithBook> = records
        .into_iter()
        .zip(books)
        .map(|(record, book)| BorrowWithBook { record, book })
        .collect();
    Ok(Json(items))
}

/// Admin listing: every borrow record with user and book details embedded.
pub async fn all_borrows(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rows = sqlx::query(
        r#"SELECT b.*, u.name AS user_name, u.matric_no, bk.title, bk.author, bk.isbn
           FROM borrows b
           JOIN users u ON u.id = b.user_id
           JOIN books bk ON bk.id = b.book_id
           ORDER BY b.borrow_date DESC"#,
    )
    .fetch_all(&state.db)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    let mut details = Vec::with_capacity(rows.len());
    for row in &rows {
        records.push(ledger::record_from_row(row)?);
        details.push((
            UserSummary { name: row.get("user_name"), matric_no: row.get("matric_no") },
            BookSummary {
                title: row.get("title"),
                author: row.get("author"),
                isbn: row.get("isbn"),
            },
        ));
    }

    let newly_overdue =
        ledger::refresh_overdue(&state.db, &mut records, state.config.loans.fine_per_day).await?;
    state.metrics.add_loans_marked_overdue(newly_overdue);

    let items: Vec<BorrowWithDetails> = records
        .into_iter()
        .zip(details)
        .map(|(record, (user, book))| BorrowWithDetails { record, user, book })
        .collect();
    Ok(Json(items))
}

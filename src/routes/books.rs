use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    error::{validation, AppError, AppResult},
    state::AppState,
    types::{BookDto, CreateBookRequest, UpdateBookRequest},
};

pub fn book_from_row(row: &SqliteRow) -> AppResult<BookDto> {
    let id_raw: String = row.get("id");
    let id = Uuid::parse_str(&id_raw)
        .map_err(|e| AppError::Database(format!("invalid uuid in books.id: {}", e)))?;
    Ok(BookDto {
        id,
        title: row.get("title"),
        author: row.get("author"),
        isbn: row.get("isbn"),
        category: row.get("category"),
        total_copies: row.get("total_copies"),
        available_copies: row.get("available_copies"),
        description: row.get("description"),
        published_year: row.get("published_year"),
        created_at: row.get("created_at"),
    })
}

pub async fn list_books(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rows = sqlx::query("SELECT * FROM books ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;
    let items = rows.iter().map(book_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

pub async fn create_book(
    State(state): State<AppState>,
    Json(req): Json<CreateBookRequest>,
) -> AppResult<impl IntoResponse> {
    validation::validate_required_text(&req.title, "title")?;
    validation::validate_required_text(&req.author, "author")?;
    validation::validate_required_text(&req.isbn, "isbn")?;
    validation::validate_required_text(&req.category, "category")?;

    let total = req.total_copies.unwrap_or(1);
    let available = req.available_copies.unwrap_or(total);
    validation::validate_copy_count(total, "total_copies")?;
    validation::validate_copy_count(available, "available_copies")?;
    if total < 1 {
        return Err(AppError::ValidationError {
            field: "total_copies".to_string(),
            message: "A book needs at least one copy".to_string(),
        });
    }
    if available > total {
        return Err(AppError::ValidationError {
            field: "available_copies".to_string(),
            message: "available_copies must not exceed total_copies".to_string(),
        });
    }

    let duplicate = sqlx::query("SELECT 1 FROM books WHERE isbn = ?1")
        .bind(&req.isbn)
        .fetch_optional(&state.db)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict("A book with this ISBN already exists".to_string()));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO books (id, title, author, isbn, category, total_copies, available_copies, description, published_year)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
    )
    .bind(id.to_string())
    .bind(&req.title)
    .bind(&req.author)
    .bind(&req.isbn)
    .bind(&req.category)
    .bind(total)
    .bind(available)
    .bind(&req.description)
    .bind(req.published_year)
    .execute(&state.db)
    .await?;

    state.metrics.inc_books_added();

    let row = sqlx::query("SELECT * FROM books WHERE id = ?1")
        .bind(id.to_string())
        .fetch_one(&state.db)
        .await?;
    Ok((StatusCode::CREATED, Json(book_from_row(&row)?)))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let row = sqlx::query("SELECT * FROM books WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    match row {
        Some(row) => Ok(Json(book_from_row(&row)?)),
        None => Err(AppError::NotFound("Book not found".to_string())),
    }
}

pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> AppResult<impl IntoResponse> {
    let row = sqlx::query("SELECT * FROM books WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    let Some(row) = row else {
        return Err(AppError::NotFound("Book not found".to_string()));
    };
    let current = book_from_row(&row)?;

    // Merge the patch over the stored record, then validate the result.
    let title = req.title.unwrap_or(current.title);
    let author = req.author.unwrap_or(current.author);
    let isbn = req.isbn.unwrap_or(current.isbn);
    let category = req.category.unwrap_or(current.category);
    let total = req.total_copies.unwrap_or(current.total_copies);
    let available = req.available_copies.unwrap_or(current.available_copies);
    let description = req.description.or(current.description);
    let published_year = req.published_year.or(current.published_year);

    validation::validate_required_text(&title, "title")?;
    validation::validate_required_text(&author, "author")?;
    validation::validate_required_text(&isbn, "isbn")?;
    validation::validate_required_text(&category, "category")?;
    validation::validate_copy_count(total, "total_copies")?;
    validation::validate_copy_count(available, "available_copies")?;
    if available > total {
        return Err(AppError::ValidationError {
            field: "available_copies".to_string(),
            message: "available_copies must not exceed total_copies".to_string(),
        });
    }

    let duplicate = sqlx::query("SELECT 1 FROM books WHERE isbn = ?1 AND id != ?2")
        .bind(&isbn)
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict("A book with this ISBN already exists".to_string()));
    }

    sqlx::query(
        r#"UPDATE books SET title=?1, author=?2, isbn=?3, category=?4,
           total_copies=?5, available_copies=?6, description=?7, published_year=?8
           WHERE id=?9"#,
    )
    .bind(&title)
    .bind(&author)
    .bind(&isbn)
    .bind(&category)
    .bind(total)
    .bind(available)
    .bind(&description)
    .bind(published_year)
    .bind(id.to_string())
    .execute(&state.db)
    .await?;

    let row = sqlx::query("SELECT * FROM books WHERE id = ?1")
        .bind(id.to_string())
        .fetch_one(&state.db)
        .await?;
    Ok(Json(book_from_row(&row)?))
}

pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    // The borrows table references books; refuse deletion instead of
    // surfacing a foreign key violation.
    let referenced = sqlx::query("SELECT 1 FROM borrows WHERE book_id = ?1 LIMIT 1")
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if referenced.is_some() {
        return Err(AppError::Conflict("Book has borrowing records and cannot be deleted".to_string()));
    }

    let res = sqlx::query("DELETE FROM books WHERE id = ?1")
        .bind(id.to_string())
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Book not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "message": "Book deleted successfully" })))
}

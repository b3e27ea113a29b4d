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
    types::{CreateUserRequest, Role, UpdateUserRequest, UserDto},
};

/// Maps a `users` row to the public DTO. The password hash is deliberately
/// never part of `UserDto`.
pub fn user_from_row(row: &SqliteRow) -> AppResult<UserDto> {
    let id_raw: String = row.get("id");
    let id = Uuid::parse_str(&id_raw)
        .map_err(|e| AppError::Database(format!("invalid uuid in users.id: {}", e)))?;
    let role_raw: String = row.get("role");
    let role = match role_raw.as_str() {
        "student" => Role::Student,
        "admin" => Role::Admin,
        other => return Err(AppError::Database(format!("unknown role '{}'", other))),
    };
    Ok(UserDto {
        id,
        name: row.get("name"),
        matric_no: row.get("matric_no"),
        role,
        face_id: row.get("face_id"),
        created_at: row.get("created_at"),
    })
}

pub async fn insert_user(
    db: &sqlx::SqlitePool,
    name: &str,
    matric_no: &str,
    password: &str,
    role: Role,
) -> AppResult<UserDto> {
    validation::validate_required_text(name, "name")?;
    validation::validate_required_text(matric_no, "matric_no")?;
    validation::validate_required_text(password, "password")?;

    let duplicate = sqlx::query("SELECT 1 FROM users WHERE matric_no = ?1")
        .bind(matric_no)
        .fetch_optional(db)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(
            "A user with this matriculation number already exists".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    sqlx::query(
        r#"INSERT INTO users (id, name, matric_no, password_hash, role)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )
    .bind(id.to_string())
    .bind(name)
    .bind(matric_no)
    .bind(password_hash)
    .bind(role.as_str())
    .execute(db)
    .await?;

    let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
        .bind(id.to_string())
        .fetch_one(db)
        .await?;
    user_from_row(&row)
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rows = sqlx::query("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;
    let items = rows.iter().map(user_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<impl IntoResponse> {
    let role = req.role.unwrap_or(Role::Student);
    let user = insert_user(&state.db, &req.name, &req.matric_no, &req.password, role).await?;
    state.metrics.inc_users_registered();
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    match row {
        Some(row) => Ok(Json(user_from_row(&row)?)),
        None => Err(AppError::NotFound("User not found".to_string())),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<impl IntoResponse> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    let Some(row) = row else {
        return Err(AppError::NotFound("User not found".to_string()));
    };
    let current = user_from_row(&row)?;

    let name = req.name.unwrap_or(current.name);
    let matric_no = req.matric_no.unwrap_or(current.matric_no);
    let role = req.role.unwrap_or(current.role);
    validation::validate_required_text(&name, "name")?;
    validation::validate_required_text(&matric_no, "matric_no")?;

    // Don't allow moving to a matriculation number that is already taken.
    let duplicate = sqlx::query("SELECT 1 FROM users WHERE matric_no = ?1 AND id != ?2")
        .bind(&matric_no)
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(
            "A user with this matriculation number already exists".to_string(),
        ));
    }

    sqlx::query("UPDATE users SET name=?1, matric_no=?2, role=?3 WHERE id=?4")
        .bind(&name)
        .bind(&matric_no)
        .bind(role.as_str())
        .bind(id.to_string())
        .execute(&state.db)
        .await?;

    if let Some(password) = req.password {
        validation::validate_required_text(&password, "password")?;
        let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)?;
        sqlx::query("UPDATE users SET password_hash=?1 WHERE id=?2")
            .bind(password_hash)
            .bind(id.to_string())
            .execute(&state.db)
            .await?;
    }

    let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
        .bind(id.to_string())
        .fetch_one(&state.db)
        .await?;
    Ok(Json(user_from_row(&row)?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let referenced = sqlx::query("SELECT 1 FROM borrows WHERE user_id = ?1 LIMIT 1")
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if referenced.is_some() {
        return Err(AppError::Conflict("User has borrowing records and cannot be deleted".to_string()));
    }

    let res = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(id.to_string())
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "message": "User deleted successfully" })))
}

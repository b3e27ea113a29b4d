use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::Row;

use crate::{
    error::{validation, AppError, AppResult},
    middleware::ip::extract_ip_from_headers,
    routes::users::{insert_user, user_from_row},
    state::AppState,
    types::{
        CreateUserRequest, FaceDataCheckRequest, FaceDataCheckResponse, FaceDataUpdateRequest,
        FaceLoginRequest, LoginRequest, Role,
    },
};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<impl IntoResponse> {
    let role = req.role.unwrap_or(Role::Student);
    let user = insert_user(&state.db, &req.name, &req.matric_no, &req.password, role).await?;
    state.metrics.inc_users_registered();
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    // Per-endpoint rate limit: "/auth/login"
    let ip = extract_ip_from_headers(&headers, None);
    if let Err((status, body)) = state.rate_limiter.check_endpoint_limit("/auth/login", ip).await {
        return Ok((status, body).into_response());
    }

    validation::validate_required_text(&req.matric_no, "matric_no")?;
    validation::validate_required_text(&req.password, "password")?;

    let row = sqlx::query("SELECT * FROM users WHERE matric_no = ?1")
        .bind(&req.matric_no)
        .fetch_optional(&state.db)
        .await?;
    let Some(row) = row else {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    };

    let password_hash: String = row.get("password_hash");
    if !bcrypt::verify(&req.password, &password_hash)? {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    Ok(Json(user_from_row(&row)?).into_response())
}

/// Mock face login, kept faithful to the source behavior: no biometric
/// matching happens. It picks an admin user (else any user), stores the
/// submitted blob as an opaque token and returns that user.
pub async fn face_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FaceLoginRequest>,
) -> AppResult<Response> {
    let ip = extract_ip_from_headers(&headers, None);
    if let Err((status, body)) =
        state.rate_limiter.check_endpoint_limit("/auth/face-login", ip).await
    {
        return Ok((status, body).into_response());
    }

    validation::validate_required_text(&req.face_data, "face_data")?;

    let row = sqlx::query(
        r#"SELECT * FROM users ORDER BY CASE role WHEN 'admin' THEN 0 ELSE 1 END, created_at ASC LIMIT 1"#,
    )
    .fetch_optional(&state.db)
    .await?;
    let Some(row) = row else {
        return Err(AppError::NotFound("No users found in the system".to_string()));
    };
    let user = user_from_row(&row)?;

    sqlx::query("UPDATE users SET face_id = ?1 WHERE id = ?2")
        .bind(&req.face_data)
        .bind(user.id.to_string())
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = %user.id, "face login (mock) accepted");

    let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
        .bind(user.id.to_string())
        .fetch_one(&state.db)
        .await?;
    Ok(Json(user_from_row(&row)?).into_response())
}

/// Reports whether a user has face data registered.
pub async fn check_face_data(
    State(state): State<AppState>,
    Json(req): Json<FaceDataCheckRequest>,
) -> AppResult<impl IntoResponse> {
    validation::validate_required_text(&req.matric_no, "matric_no")?;

    let row = sqlx::query("SELECT * FROM users WHERE matric_no = ?1")
        .bind(&req.matric_no)
        .fetch_optional(&state.db)
        .await?;
    let Some(row) = row else {
        return Err(AppError::NotFound("User not found".to_string()));
    };
    let user = user_from_row(&row)?;

    Ok(Json(FaceDataCheckResponse {
        has_face_data: user.face_id.is_some(),
        user_id: user.id,
        name: user.name,
    }))
}

/// Registers (or replaces) the opaque face token for a user.
pub async fn update_face_data(
    State(state): State<AppState>,
    Json(req): Json<FaceDataUpdateRequest>,
) -> AppResult<impl IntoResponse> {
    validation::validate_required_text(&req.face_id, "face_id")?;

    let res = sqlx::query("UPDATE users SET face_id = ?1 WHERE id = ?2")
        .bind(&req.face_id)
        .bind(req.user_id.to_string())
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let row = sqlx::query("SELECT name FROM users WHERE id = ?1")
        .bind(req.user_id.to_string())
        .fetch_one(&state.db)
        .await?;
    let name: String = row.get("name");

    Ok(Json(serde_json::json!({
        "message": "Facial recognition data updated successfully",
        "user_id": req.user_id,
        "name": name,
    })))
}

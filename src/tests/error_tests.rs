#[cfg(test)]
mod tests {
    use crate::error::{validation, AppError, OptionExt};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use serde_json::Value;

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(format!("{}", error), "Not found: Resource not found");

        let error = AppError::BookUnavailable("No copies left".to_string());
        assert_eq!(format!("{}", error), "Book unavailable: No copies left");

        let error = AppError::RateLimited { retry_after_seconds: 60 };
        assert_eq!(format!("{}", error), "Rate limited. Retry after 60 seconds");
    }

    #[test]
    fn test_app_error_into_response() {
        let error = AppError::BadRequest("Test error".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error = AppError::NotFound("Not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let error = AppError::Conflict("Conflict".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let error = AppError::BookUnavailable("All copies out".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error = AppError::AlreadyReturned("Settled".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error = AppError::ServiceUnavailable("Service down".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let error = AppError::Unauthorized("No access".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let error = AppError::RateLimited { retry_after_seconds: 30 };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let error = AppError::ValidationError {
            field: "title".to_string(),
            message: "required".to_string(),
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let error = AppError::BookUnavailable("All copies are borrowed".to_string());
        let response = error.into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"]["code"], "BOOK_UNAVAILABLE");
        assert_eq!(json["error"]["message"], "All copies are borrowed");
        assert_eq!(json["status"], 400);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_validation_error_carries_field_details() {
        let error = AppError::ValidationError {
            field: "user_id".to_string(),
            message: "Identifier is required".to_string(),
        };
        let response = error.into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["details"]["field"], "user_id");
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let app_error: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(app_error, AppError::NotFound(_)));
    }

    #[test]
    fn test_from_sqlx_pool_timeout() {
        let app_error: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(app_error, AppError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(7);
        assert_eq!(some.ok_or_not_found("Book").unwrap(), 7);

        let none: Option<i32> = None;
        let err = none.ok_or_not_found("Book").unwrap_err();
        match err {
            AppError::NotFound(msg) => assert!(msg.contains("Book")),
            _ => panic!("Expected NotFound variant"),
        }
    }

    #[test]
    fn test_validation_helpers() {
        assert!(validation::validate_required_id("abc", "id").is_ok());
        assert!(validation::validate_required_id("  ", "id").is_err());

        assert!(validation::validate_required_text("Faust", "title").is_ok());
        assert!(validation::validate_required_text("", "title").is_err());

        assert!(validation::validate_copy_count(0, "total_copies").is_ok());
        assert!(validation::validate_copy_count(5, "total_copies").is_ok());
        let err = validation::validate_copy_count(-1, "total_copies").unwrap_err();
        assert!(matches!(err, AppError::ValidationError { .. }));
    }
}

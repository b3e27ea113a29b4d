#[cfg(test)]
mod tests {
    use axum::middleware::from_fn_with_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt; // for .collect()
    use serde_json::{json, Value};
    use sqlx::migrate::MigrateDatabase;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    use crate::routes;
    use crate::state::AppState;

    async fn setup_test_app() -> (axum::Router, AppState, NamedTempFile) {
        // Create temporary database
        let temp_db = NamedTempFile::new().unwrap();
        let db_url = format!("sqlite:{}", temp_db.path().display());

        sqlx::Sqlite::create_database(&db_url).await.unwrap();

        let pool = SqlitePoolOptions::new().max_connections(1).connect(&db_url).await.unwrap();

        // Initialize schema
        crate::db::init_db(&pool).await.unwrap();

        let config = crate::config::AppConfig {
            server: crate::config::ServerConfig { host: "127.0.0.1".to_string(), port: 8080 },
            database: crate::config::DatabaseConfig { url: db_url },
            loans: crate::config::LoanConfig { loan_period_days: 14, fine_per_day: 0.5 },
            security: None,
        };

        let state = AppState::new(pool, config);

        let app = axum::Router::new()
            .route("/healthz", axum::routing::get(routes::health::healthz))
            .route("/readyz", axum::routing::get(routes::health::readyz))
            .route("/metrics", axum::routing::get(routes::health::metrics))
            .route("/version", axum::routing::get(routes::health::version))
            .route(
                "/books",
                axum::routing::get(routes::books::list_books).post(routes::books::create_book),
            )
            .route(
                "/books/{id}",
                axum::routing::get(routes::books::get_book)
                    .put(routes::books::update_book)
                    .delete(routes::books::delete_book),
            )
            .route(
                "/users",
                axum::routing::get(routes::users::list_users).post(routes::users::create_user),
            )
            .route("/auth/register", axum::routing::post(routes::auth::register))
            .route("/auth/login", axum::routing::post(routes::auth::login))
            .route("/auth/face-login", axum::routing::post(routes::auth::face_login))
            .route("/borrow", axum::routing::post(routes::borrow::create_loan))
            .route("/borrow/return", axum::routing::post(routes::borrow::return_loan))
            .route(
                "/borrow/current/{user_id}",
                axum::routing::get(routes::borrow::current_borrows),
            )
            .route(
                "/borrow/history/{user_id}",
                axum::routing::get(routes::borrow::borrow_history),
            )
            .route("/borrow/all", axum::routing::get(routes::borrow::all_borrows))
            .route("/stats", axum::routing::get(routes::stats::get_statistics))
            .with_state(state.clone())
            .layer(from_fn_with_state(
                state.config.clone(),
                crate::middleware::security_headers::security_headers_middleware,
            ));

        (app, state, temp_db)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn create_book(app: &axum::Router, title: &str, isbn: &str, total: i64, available: i64) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/books",
                &json!({
                    "title": title,
                    "author": "Test Author",
                    "isbn": isbn,
                    "category": "Fiction",
                    "total_copies": total,
                    "available_copies": available,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        json["id"].as_str().unwrap().to_string()
    }

    async fn register_user(app: &axum::Router, name: &str, matric_no: &str) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/auth/register",
                &json!({ "name": name, "matric_no": matric_no, "password": "secret123" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_endpoint() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app.oneshot(get("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert!(headers.contains_key("x-content-type-options"));
        assert!(headers.contains_key("x-frame-options"));
        assert!(headers.contains_key("referrer-policy"));
        assert!(headers.contains_key("permissions-policy"));
        assert!(headers.contains_key("cross-origin-opener-policy"));
        assert!(headers.contains_key("cross-origin-resource-policy"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert!(json.get("uptime_seconds").is_some());
        assert!(json.get("loans_created").is_some());
        assert!(json.get("loans_returned").is_some());
        assert!(json.get("fines_assessed_cents").is_some());
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app.oneshot(get("/version")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert!(json.get("name").is_some());
        assert!(json.get("version").is_some());
    }

    #[tokio::test]
    async fn test_create_and_list_books() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/books",
                &json!({
                    "title": "Faust",
                    "author": "Goethe",
                    "isbn": "978-1-0000-0001-1",
                    "category": "Drama",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        // Copy counts default to a single available copy
        assert_eq!(created["total_copies"], 1);
        assert_eq!(created["available_copies"], 1);

        let response = app.oneshot(get("/books")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list = json_body(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["title"], "Faust");
    }

    #[tokio::test]
    async fn test_create_book_rejects_duplicate_isbn() {
        let (app, _, _guard) = setup_test_app().await;
        create_book(&app, "Book A", "same-isbn", 1, 1).await;

        let response = app
            .oneshot(post_json(
                "/books",
                &json!({
                    "title": "Book B",
                    "author": "Someone Else",
                    "isbn": "same-isbn",
                    "category": "Fiction",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_book_rejects_missing_title() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app
            .oneshot(post_json(
                "/books",
                &json!({ "title": "  ", "author": "A", "isbn": "i-1", "category": "Fiction" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_get_book_not_found() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app
            .oneshot(get("/books/00000000-0000-0000-0000-000000000000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let (app, _, _guard) = setup_test_app().await;
        register_user(&app, "Anna", "MAT-001").await;

        // Duplicate matric number is rejected
        let response = app
            .clone()
            .oneshot(post_json(
                "/auth/register",
                &json!({ "name": "Other", "matric_no": "MAT-001", "password": "pw123456" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // Correct credentials
        let response = app
            .clone()
            .oneshot(post_json(
                "/auth/login",
                &json!({ "matric_no": "MAT-001", "password": "secret123" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let user = json_body(response).await;
        assert_eq!(user["name"], "Anna");
        // The password hash never leaves the server
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());

        // Wrong password
        let response = app
            .oneshot(post_json(
                "/auth/login",
                &json!({ "matric_no": "MAT-001", "password": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_face_login_without_users() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app
            .oneshot(post_json("/auth/face-login", &json!({ "face_data": "blob" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_borrow_and_return_flow() {
        let (app, _, _guard) = setup_test_app().await;
        let user_id = register_user(&app, "Anna", "MAT-010").await;
        let book_id = create_book(&app, "Der Prozess", "isbn-010", 2, 2).await;

        // Borrow
        let response = app
            .clone()
            .oneshot(post_json("/borrow", &json!({ "user_id": user_id, "book_id": book_id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let record = json_body(response).await;
        assert_eq!(record["status"], "borrowed");
        assert_eq!(record["fine"], 0.0);
        let borrow_id = record["id"].as_str().unwrap().to_string();

        // Availability dropped by one
        let response = app.clone().oneshot(get(&format!("/books/{}", book_id))).await.unwrap();
        let book = json_body(response).await;
        assert_eq!(book["available_copies"], 1);

        // Current borrows embed the book summary
        let response = app
            .clone()
            .oneshot(get(&format!("/borrow/current/{}", user_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let current = json_body(response).await;
        assert_eq!(current.as_array().unwrap().len(), 1);
        assert_eq!(current[0]["book"]["title"], "Der Prozess");

        // Return
        let response = app
            .clone()
            .oneshot(post_json("/borrow/return", &json!({ "borrow_id": borrow_id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let returned = json_body(response).await;
        assert_eq!(returned["status"], "returned");
        assert!(returned["return_date"].is_string());

        // Second return of the same record is rejected
        let response = app
            .clone()
            .oneshot(post_json("/borrow/return", &json!({ "borrow_id": borrow_id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "ALREADY_RETURNED");

        // History keeps the settled record, current list is empty again
        let response = app
            .clone()
            .oneshot(get(&format!("/borrow/current/{}", user_id)))
            .await
            .unwrap();
        assert!(json_body(response).await.as_array().unwrap().is_empty());
        let response = app
            .oneshot(get(&format!("/borrow/history/{}", user_id)))
            .await
            .unwrap();
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_borrow_unavailable_book() {
        let (app, _, _guard) = setup_test_app().await;
        let user_id = register_user(&app, "Ben", "MAT-020").await;
        let book_id = create_book(&app, "Out of Stock", "isbn-020", 1, 0).await;

        let response = app
            .oneshot(post_json("/borrow", &json!({ "user_id": user_id, "book_id": book_id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "BOOK_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_borrow_rejects_empty_user_id() {
        let (app, _, _guard) = setup_test_app().await;
        let book_id = create_book(&app, "Some Book", "isbn-030", 1, 1).await;

        let response = app
            .oneshot(post_json("/borrow", &json!({ "user_id": "", "book_id": book_id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_all_borrows_includes_user_and_book() {
        let (app, _, _guard) = setup_test_app().await;
        let user_id = register_user(&app, "Clara", "MAT-040").await;
        let book_id = create_book(&app, "Effi Briest", "isbn-040", 1, 1).await;

        let response = app
            .clone()
            .oneshot(post_json("/borrow", &json!({ "user_id": user_id, "book_id": book_id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.oneshot(get("/borrow/all")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let all = json_body(response).await;
        assert_eq!(all.as_array().unwrap().len(), 1);
        assert_eq!(all[0]["user"]["name"], "Clara");
        assert_eq!(all[0]["book"]["title"], "Effi Briest");
        assert_eq!(all[0]["status"], "borrowed");
    }

    #[tokio::test]
    async fn test_delete_book_with_borrow_history_is_blocked() {
        let (app, _, _guard) = setup_test_app().await;
        let user_id = register_user(&app, "Dora", "MAT-050").await;
        let book_id = create_book(&app, "Kept Book", "isbn-050", 1, 1).await;

        let response = app
            .clone()
            .oneshot(post_json("/borrow", &json!({ "user_id": user_id, "book_id": book_id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/books/{}", book_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // A book without history can be deleted
        let other = create_book(&app, "Fresh Book", "isbn-051", 1, 1).await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/books/{}", other))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_statistics_totals() {
        let (app, _, _guard) = setup_test_app().await;
        let user_id = register_user(&app, "Emil", "MAT-060").await;
        // Two titles: 3 copies (1 available after setup) and 2 copies (all available)
        let book_a = create_book(&app, "Title A", "isbn-060", 3, 3).await;
        create_book(&app, "Title B", "isbn-061", 2, 2).await;

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post_json("/borrow", &json!({ "user_id": user_id, "book_id": book_a })))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app.oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats = json_body(response).await;

        assert_eq!(stats["books"]["total_books"], 2);
        assert_eq!(stats["books"]["total_copies"], 5);
        assert_eq!(stats["books"]["available_copies"], 3);
        assert_eq!(stats["books"]["borrowed_copies"], 2);
        assert_eq!(stats["users"]["total_users"], 1);
        assert_eq!(stats["borrowings"]["active_borrowings"], 2);
        assert_eq!(stats["borrowings"]["overdue_items"], 0);
        assert_eq!(stats["borrowings"]["returned_items"], 0);
        // No overdue loan exists, so the fine total must come back as 0.0
        assert_eq!(stats["borrowings"]["total_fines"], 0.0);
        assert_eq!(stats["categories"][0]["category"], "Fiction");
        assert_eq!(stats["categories"][0]["borrow_count"], 2);
    }

    #[tokio::test]
    async fn test_statistics_on_empty_database() {
        let (app, _, _guard) = setup_test_app().await;

        let response = app.oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats = json_body(response).await;

        assert_eq!(stats["books"]["total_books"], 0);
        assert_eq!(stats["users"]["total_users"], 0);
        assert_eq!(stats["borrowings"]["active_borrowings"], 0);
        assert_eq!(stats["borrowings"]["total_fines"], 0.0);
        assert!(stats["categories"].as_array().unwrap().is_empty());
    }
}

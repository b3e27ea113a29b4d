use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a borrow record. `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Borrowed,
    Overdue,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "borrowed" => Some(LoanStatus::Borrowed),
            "overdue" => Some(LoanStatus::Overdue),
            "returned" => Some(LoanStatus::Returned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

// Timestamps are RFC3339 UTC strings end to end, matching the TEXT columns.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDto {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub total_copies: i64,
    pub available_copies: i64,
    pub description: Option<String>,
    pub published_year: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub total_copies: Option<i64>,
    pub available_copies: Option<i64>,
    pub description: Option<String>,
    pub published_year: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub total_copies: Option<i64>,
    pub available_copies: Option<i64>,
    pub description: Option<String>,
    pub published_year: Option<i64>,
}

/// User record as exposed over the API. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub matric_no: String,
    pub role: Role,
    pub face_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub matric_no: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub matric_no: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub matric_no: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceLoginRequest {
    pub face_data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceDataCheckRequest {
    pub matric_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaceDataCheckResponse {
    pub has_face_data: bool,
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceDataUpdateRequest {
    pub user_id: Uuid,
    pub face_id: String,
}

/// One checkout of one book copy by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowRecordDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: String,
    pub due_date: String,
    pub return_date: Option<String>,
    pub status: LoanStatus,
    pub fine: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,
    pub author: String,
    pub isbn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub name: String,
    pub matric_no: String,
}

/// Borrow record with the referenced book embedded (student-facing listings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowWithBook {
    #[serde(flatten)]
    pub record: BorrowRecordDto,
    pub book: BookSummary,
}

/// Borrow record with both collaborators embedded (admin listing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowWithDetails {
    #[serde(flatten)]
    pub record: BorrowRecordDto,
    pub user: UserSummary,
    pub book: BookSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLoanRequest {
    pub user_id: String,
    pub book_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnLoanRequest {
    pub borrow_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookStats {
    pub total_books: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub borrowed_copies: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_users: i64,
    pub student_users: i64,
    pub admin_users: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BorrowingStats {
    pub active_borrowings: i64,
    pub overdue_items: i64,
    pub returned_items: i64,
    pub total_fines: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStat {
    pub category: String,
    pub borrow_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub books: BookStats,
    pub users: UserStats,
    pub borrowings: BorrowingStats,
    pub categories: Vec<CategoryStat>,
}

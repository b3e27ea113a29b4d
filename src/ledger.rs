//! Circulation ledger: the lifecycle of a borrow record.
//!
//! A loan starts as `borrowed`, lazily flips to `overdue` once its due date has
//! passed (re-evaluated on every read, no background sweeper) and settles as
//! `returned`. The ledger also owns the availability bookkeeping on the
//! referenced book record: one copy out on loan creation, one copy back on
//! return.
//!
//! Invariant kept here: for any book,
//! `available_copies + open loans (borrowed|overdue) == total_copies`.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{validation, AppError, AppResult};
use crate::types::{BorrowRecordDto, LoanStatus};

/// Parses an RFC3339 UTC timestamp as stored in the TEXT columns.
pub fn parse_ts(s: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("invalid timestamp '{}': {}", s, e)))
}

fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Whole overdue days between due date and now. Partial days count as a full
/// day; zero when the due date has not passed.
pub fn days_overdue(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    if now <= due {
        return 0;
    }
    // Millisecond resolution so even a sub-second overhang starts a day.
    let millis = (now - due).num_milliseconds();
    (millis + 86_400_000 - 1) / 86_400_000
}

/// Fine for an unreturned loan as of `now`, rounded to cents.
pub fn fine_amount(due: DateTime<Utc>, now: DateTime<Utc>, fine_per_day: f64) -> f64 {
    let amount = days_overdue(due, now) as f64 * fine_per_day;
    (amount * 100.0).round() / 100.0
}

fn parse_uuid(s: &str, field: &str) -> AppResult<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| AppError::Database(format!("invalid uuid in column {}: {}", field, e)))
}

/// Maps a `borrows` row (all columns selected) to its DTO.
pub fn record_from_row(row: &SqliteRow) -> AppResult<BorrowRecordDto> {
    let status_raw: String = row.get("status");
    let status = LoanStatus::parse(&status_raw)
        .ok_or_else(|| AppError::Database(format!("unknown loan status '{}'", status_raw)))?;
    Ok(BorrowRecordDto {
        id: parse_uuid(&row.get::<String, _>("id"), "id")?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"), "user_id")?,
        book_id: parse_uuid(&row.get::<String, _>("book_id"), "book_id")?,
        borrow_date: row.get("borrow_date"),
        due_date: row.get("due_date"),
        return_date: row.get("return_date"),
        status,
        fine: row.get("fine"),
    })
}

/// Creates a loan: one copy out, one new `borrowed` record.
///
/// The availability check and the decrement are a single conditional UPDATE, so
/// two concurrent requests for the last copy cannot both succeed. Zero affected
/// rows means the book does not exist or has no free copies; no record is
/// created in that case.
pub async fn create_loan(
    db: &SqlitePool,
    user_id: &str,
    book_id: &str,
    loan_period_days: i64,
) -> AppResult<BorrowRecordDto> {
    validation::validate_required_id(user_id, "user_id")?;
    validation::validate_required_id(book_id, "book_id")?;

    // The borrows table has a foreign key on user_id; fail with a clear error
    // instead of a constraint violation.
    let user_exists = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .is_some();
    if !user_exists {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let res = sqlx::query(
        r#"UPDATE books SET available_copies = available_copies - 1
           WHERE id = ?1 AND available_copies > 0"#,
    )
    .bind(book_id)
    .execute(db)
    .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::BookUnavailable("Book is not available".to_string()));
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    let due = now + Duration::days(loan_period_days);

    sqlx::query(
        r#"INSERT INTO borrows (id, user_id, book_id, borrow_date, due_date, status, fine)
           VALUES (?1, ?2, ?3, ?4, ?5, 'borrowed', 0)"#,
    )
    .bind(id.to_string())
    .bind(user_id)
    .bind(book_id)
    .bind(fmt_ts(now))
    .bind(fmt_ts(due))
    .execute(db)
    .await?;

    tracing::info!(borrow_id = %id, user_id, book_id, due = %due, "loan created");

    Ok(BorrowRecordDto {
        id,
        user_id: parse_uuid(user_id, "user_id")?,
        book_id: parse_uuid(book_id, "book_id")?,
        borrow_date: fmt_ts(now),
        due_date: fmt_ts(due),
        return_date: None,
        status: LoanStatus::Borrowed,
        fine: 0.0,
    })
}

/// Re-evaluates unreturned records against "now" and persists the result.
///
/// Read side effect by design: list endpoints call this before responding so a
/// caller always sees current statuses and fines without a scheduler. Records
/// past due are flipped to `overdue`; records already overdue get their fine
/// recomputed (monotonically increasing with elapsed days).
///
/// Returns how many records newly transitioned from `borrowed` to `overdue`.
pub async fn refresh_overdue(
    db: &SqlitePool,
    records: &mut [BorrowRecordDto],
    fine_per_day: f64,
) -> AppResult<usize> {
    let now = Utc::now();
    let mut newly_overdue = 0usize;

    for record in records.iter_mut() {
        if record.status == LoanStatus::Returned {
            continue;
        }
        let due = parse_ts(&record.due_date)?;
        if due >= now {
            continue;
        }
        let fine = fine_amount(due, now, fine_per_day);
        // Guard on status so a concurrent return is not clobbered.
        let res = sqlx::query(
            r#"UPDATE borrows SET status = 'overdue', fine = ?1
               WHERE id = ?2 AND status != 'returned'"#,
        )
        .bind(fine)
        .bind(record.id.to_string())
        .execute(db)
        .await?;
        if res.rows_affected() == 0 {
            // The loan was returned between the fetch and this update; keep
            // the record as fetched rather than reporting it overdue.
            continue;
        }
        if record.status == LoanStatus::Borrowed {
            newly_overdue += 1;
        }
        record.status = LoanStatus::Overdue;
        record.fine = fine;
    }

    Ok(newly_overdue)
}

/// Settles a loan: sets the return date, freezes the final fine and puts the
/// copy back on the shelf.
///
/// Idempotency guard: a record that is already `returned` fails with
/// `AlreadyReturned` and the availability counter is not incremented again.
pub async fn return_loan(
    db: &SqlitePool,
    borrow_id: &str,
    fine_per_day: f64,
) -> AppResult<BorrowRecordDto> {
    validation::validate_required_id(borrow_id, "borrow_id")?;

    let row = sqlx::query("SELECT * FROM borrows WHERE id = ?1")
        .bind(borrow_id)
        .fetch_optional(db)
        .await?;
    let Some(row) = row else {
        return Err(AppError::NotFound("Borrowing record not found".to_string()));
    };
    let mut record = record_from_row(&row)?;

    if record.status == LoanStatus::Returned {
        return Err(AppError::AlreadyReturned("Book already returned".to_string()));
    }

    let now = Utc::now();
    let due = parse_ts(&record.due_date)?;
    let fine = fine_amount(due, now, fine_per_day);

    sqlx::query(
        r#"UPDATE borrows SET status = 'returned', return_date = ?1, fine = ?2 WHERE id = ?3"#,
    )
    .bind(fmt_ts(now))
    .bind(fine)
    .bind(borrow_id)
    .execute(db)
    .await?;

    // Clamp at total_copies: a stray extra increment must never make a book
    // look more available than its capacity.
    sqlx::query(
        r#"UPDATE books SET available_copies = MIN(available_copies + 1, total_copies)
           WHERE id = ?1"#,
    )
    .bind(record.book_id.to_string())
    .execute(db)
    .await?;

    tracing::info!(borrow_id, fine, "loan returned");

    record.status = LoanStatus::Returned;
    record.return_date = Some(fmt_ts(now));
    record.fine = fine;
    Ok(record)
}

/// Fetches a single borrow record by id.
pub async fn fetch_record(db: &SqlitePool, borrow_id: &str) -> AppResult<Option<BorrowRecordDto>> {
    let row = sqlx::query("SELECT * FROM borrows WHERE id = ?1")
        .bind(borrow_id)
        .fetch_optional(db)
        .await?;
    row.as_ref().map(record_from_row).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn no_fine_before_due_date() {
        let due = ts(2025, 3, 15, 12);
        let now = ts(2025, 3, 10, 12);
        assert_eq!(days_overdue(due, now), 0);
        assert_eq!(fine_amount(due, now, 0.5), 0.0);
    }

    #[test]
    fn no_fine_exactly_at_due_date() {
        let due = ts(2025, 3, 15, 12);
        assert_eq!(fine_amount(due, due, 0.5), 0.0);
    }

    #[test]
    fn partial_day_counts_as_full_day() {
        let due = ts(2025, 3, 15, 12);
        let now = due + Duration::hours(3);
        assert_eq!(days_overdue(due, now), 1);
        assert_eq!(fine_amount(due, now, 0.5), 0.5);
    }

    #[test]
    fn subsecond_overhang_starts_a_day() {
        let due = ts(2025, 3, 15, 12);
        let now = due + Duration::milliseconds(500);
        assert_eq!(days_overdue(due, now), 1);
        assert_eq!(fine_amount(due, now, 0.5), 0.5);
    }

    #[test]
    fn started_day_is_charged_in_full() {
        // 5 days and 3 hours past due: the started 6th day is charged.
        let due = ts(2025, 3, 15, 12);
        let now = due + Duration::days(5) + Duration::hours(3);
        assert_eq!(days_overdue(due, now), 6);
        assert_eq!(fine_amount(due, now, 0.5), 3.0);
    }

    #[test]
    fn whole_days_overdue() {
        let due = ts(2025, 3, 15, 12);
        let now = due + Duration::days(3);
        assert_eq!(days_overdue(due, now), 3);
        assert_eq!(fine_amount(due, now, 0.5), 1.5);
    }

    #[test]
    fn fine_is_monotone_in_time() {
        let due = ts(2025, 3, 15, 12);
        let mut last = 0.0;
        for hours in [1, 12, 24, 25, 48, 72, 100, 500] {
            let fine = fine_amount(due, due + Duration::hours(hours), 0.5);
            assert!(fine >= last, "fine decreased at +{}h", hours);
            last = fine;
        }
    }

    #[test]
    fn fine_scales_with_rate() {
        let due = ts(2025, 3, 15, 12);
        let now = due + Duration::days(4);
        assert_eq!(fine_amount(due, now, 0.0), 0.0);
        assert_eq!(fine_amount(due, now, 1.25), 5.0);
    }
}

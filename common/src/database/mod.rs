mod ulid;

pub use self::ulid::Ulid;

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres `serialization_failure` and `deadlock_detected`.
const SERIALIZATION_FAILURES: [&str; 2] = ["40001", "40P01"];

/// Whether the error is a unique constraint violation raised by the database.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
	match err {
		sqlx::Error::Database(err) => err.code().as_deref() == Some(UNIQUE_VIOLATION),
		_ => false,
	}
}

/// Whether the transaction was aborted by a conflict with a concurrent one
/// and can be retried.
pub fn is_serialization_failure(err: &sqlx::Error) -> bool {
	match err {
		sqlx::Error::Database(err) => err.code().is_some_and(|code| SERIALIZATION_FAILURES.contains(&code.as_ref())),
		_ => false,
	}
}

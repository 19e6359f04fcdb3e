use chrono::{DateTime, Duration, Utc};

/// An email verification as kept by the email verification service.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VerificationRecord {
	pub email: String,
	pub is_verified: bool,
	pub created_at: DateTime<Utc>,
}

impl VerificationRecord {
	pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
		now - self.created_at > ttl
	}
}

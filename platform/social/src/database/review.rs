use chrono::{DateTime, Utc};
use common::database::Ulid;

use super::UserRecord;

/// The slice of a review this crate needs, reviews are owned elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Review {
	pub id: i64,
	pub author_id: Ulid,
	pub created_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

/// Author block shown next to a review.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct ReviewAuthor {
	pub id: Ulid,
	pub email: String,
	pub nickname: Option<String>,
	pub profile_image: Option<String>,
}

impl UserRecord for ReviewAuthor {
	fn user_id(&self) -> Ulid {
		self.id
	}
}

impl From<super::User> for ReviewAuthor {
	fn from(user: super::User) -> Self {
		Self {
			id: user.id,
			email: user.email,
			nickname: user.nickname,
			profile_image: user.profile_image,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct Bookmark {
	pub account_id: Ulid,
	pub review_id: i64,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct Share {
	pub account_id: Ulid,
	pub review_id: i64,
	pub created_at: DateTime<Utc>,
}

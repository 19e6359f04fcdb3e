use chrono::{DateTime, Utc};
use common::database::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct ProfileImage {
	pub id: Ulid,
	pub user_id: Ulid,
	/// Object storage path, `None` for the placeholder created with OAuth accounts.
	pub image_path: Option<String>,
	pub created_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

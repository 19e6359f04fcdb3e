use chrono::{DateTime, Utc};
use common::database::Ulid;

/// A directed block, `blocker_id` hides `blocked_id` from their own listings.
/// The reverse direction is a separate edge.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct Block {
	pub blocker_id: Ulid,
	pub blocked_id: Ulid,
	pub created_at: DateTime<Utc>,
}

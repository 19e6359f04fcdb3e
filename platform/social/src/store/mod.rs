//! The relational store contract.
//!
//! Every read and write goes through a [`Transaction`] obtained from
//! [`Store::begin`]. Dropping a transaction without calling
//! [`Transaction::commit`] rolls it back, so an error raised with `?` in the
//! middle of a unit leaves no partial effect behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::database::Ulid;

use crate::database::{
	Block, Bookmark, Follow, FollowPredicate, NewLocalUser, NewNotification, NewOAuthUser, Notification, ProfileImage,
	ProfileUpdate, Share, User, UserFilter,
};

mod memory;
mod pg;

pub use memory::{MemoryStore, MemoryTransaction};
pub use pg::{PgStore, PgTransaction};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Sqlx(sqlx::Error),
	#[error("migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
	/// A unique constraint rejected a write, carries the constraint name.
	#[error("unique constraint {0} violated")]
	UniqueViolation(String),
	/// A row written earlier in the same transaction could not be read back.
	#[error("{0} vanished inside its transaction")]
	Vanished(&'static str),
	/// A snapshot transaction lost a race with a concurrent one and can be
	/// retried from the start.
	#[error("could not serialize access: {0}")]
	SerializationFailure(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
	fn from(err: sqlx::Error) -> Self {
		if common::database::is_unique_violation(&err) {
			let constraint = err
				.as_database_error()
				.and_then(|err| err.constraint())
				.unwrap_or_default()
				.to_string();

			return StoreError::UniqueViolation(constraint);
		}

		if common::database::is_serialization_failure(&err) {
			return StoreError::SerializationFailure(err);
		}

		StoreError::Sqlx(err)
	}
}

/// Keys that serialize transactions touching the same logical resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
	/// Registration of an email address.
	Email(String),
	/// Claiming a nickname.
	Nickname(String),
}

impl std::fmt::Display for LockKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			LockKey::Email(email) => write!(f, "email:{email}"),
			LockKey::Nickname(nickname) => write!(f, "nickname:{nickname}"),
		}
	}
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
	type Tx: Transaction;

	async fn begin(&self) -> StoreResult<Self::Tx>;

	/// Begins a transaction in which every statement sees the same snapshot,
	/// including writes, which never touch rows committed after it started.
	///
	/// Commits may fail with [`StoreError::SerializationFailure`].
	async fn begin_snapshot(&self) -> StoreResult<Self::Tx> {
		self.begin().await
	}
}

#[async_trait]
pub trait Transaction: Send + Sized {
	async fn commit(self) -> StoreResult<()>;

	/// Blocks until no other open transaction holds `key`. Released on commit
	/// or rollback.
	async fn lock(&mut self, key: &LockKey) -> StoreResult<()>;

	// users

	async fn find_user(&mut self, filter: &UserFilter) -> StoreResult<Option<User>>;

	async fn insert_local_user(&mut self, user: &NewLocalUser) -> StoreResult<User>;

	async fn insert_oauth_user(&mut self, user: &NewOAuthUser) -> StoreResult<User>;

	async fn set_nickname(&mut self, user_id: Ulid, nickname: &str) -> StoreResult<User>;

	async fn update_profile(&mut self, user_id: Ulid, update: &ProfileUpdate) -> StoreResult<User>;

	/// Returns whether an active user was deleted.
	async fn soft_delete_user(&mut self, user_id: Ulid, at: DateTime<Utc>) -> StoreResult<bool>;

	/// Returns the number of images that were active.
	async fn soft_delete_profile_images(&mut self, user_id: Ulid, at: DateTime<Utc>) -> StoreResult<u64>;

	async fn insert_profile_image(&mut self, user_id: Ulid, image_path: Option<&str>) -> StoreResult<ProfileImage>;

	// follows

	async fn insert_follow(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<Follow>;

	async fn delete_follow(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<bool>;

	async fn follow_exists(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<bool>;

	/// Active users on the `member` side of edges whose `anchor` is `user_id`.
	async fn count_follow_users(&mut self, user_id: Ulid, predicate: FollowPredicate) -> StoreResult<u64>;

	/// Same set as [`Transaction::count_follow_users`], newest edge first.
	async fn list_follow_users(
		&mut self,
		user_id: Ulid,
		predicate: FollowPredicate,
		offset: u64,
		limit: u64,
	) -> StoreResult<Vec<User>>;

	/// The subset of `candidates` that `viewer_id` follows.
	async fn followed_among(&mut self, viewer_id: Ulid, candidates: &[Ulid]) -> StoreResult<Vec<Ulid>>;

	// blocks

	async fn insert_block(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<Block>;

	async fn delete_block(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<bool>;

	async fn block_exists(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<bool>;

	/// The subset of `candidates` that `viewer_id` has blocked.
	async fn blocked_among(&mut self, viewer_id: Ulid, candidates: &[Ulid]) -> StoreResult<Vec<Ulid>>;

	// notifications

	async fn insert_notification(&mut self, notification: &NewNotification) -> StoreResult<Notification>;

	async fn count_notifications(&mut self, recipient_id: Ulid) -> StoreResult<u64>;

	async fn count_unread_notifications(&mut self, recipient_id: Ulid) -> StoreResult<u64>;

	/// Newest first.
	async fn list_notifications(&mut self, recipient_id: Ulid, offset: u64, limit: u64) -> StoreResult<Vec<Notification>>;

	/// Sets `read_at` on unread rows only, returns how many changed.
	async fn mark_notifications_read(&mut self, recipient_id: Ulid, at: DateTime<Utc>) -> StoreResult<u64>;

	// reviews

	async fn review_exists(&mut self, review_id: i64) -> StoreResult<bool>;

	async fn insert_bookmark(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<Bookmark>;

	async fn delete_bookmark(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool>;

	async fn bookmark_exists(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool>;

	async fn insert_share(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<Share>;

	async fn share_exists(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool>;
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::database::Ulid;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Postgres, QueryBuilder};

use super::{LockKey, Store, StoreError, StoreResult, Transaction};
use crate::database::{
	Block, Bookmark, Follow, FollowPredicate, NewLocalUser, NewNotification, NewOAuthUser, Notification, ProfileImage,
	ProfileUpdate, Share, User, UserFilter, LOCAL_PROVIDER,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// `users.*` plus the derived columns of [`User`]. Expects `users` in scope.
const USER_COLUMNS: &str = r#"
	users.*,
	(
		SELECT COUNT(*) FROM follows
		INNER JOIN users AS f ON f.id = follows.follower_id AND f.deleted_at IS NULL
		WHERE follows.followee_id = users.id
	) AS follower_count,
	(
		SELECT COUNT(*) FROM follows
		INNER JOIN users AS f ON f.id = follows.followee_id AND f.deleted_at IS NULL
		WHERE follows.follower_id = users.id
	) AS followee_count,
	(
		SELECT image_path FROM profile_images
		WHERE profile_images.user_id = users.id AND profile_images.deleted_at IS NULL
		ORDER BY profile_images.created_at DESC
		LIMIT 1
	) AS profile_image
"#;

fn to_i64(value: u64) -> i64 {
	i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
	u64::try_from(value).unwrap_or_default()
}

/// PostgreSQL backed store.
#[derive(Clone)]
pub struct PgStore {
	db: Arc<sqlx::PgPool>,
}

impl PgStore {
	pub fn new(db: Arc<sqlx::PgPool>) -> Self {
		Self { db }
	}

	pub async fn connect(config: &common::config::DatabaseConfig) -> StoreResult<Self> {
		let options = config.uri.parse::<PgConnectOptions>()?.disable_statement_logging();

		let db = sqlx::postgres::PgPoolOptions::new()
			.max_connections(config.max_connections)
			.connect_with(options)
			.await?;

		tracing::info!("connected to database");

		Ok(Self::new(Arc::new(db)))
	}

	pub fn db(&self) -> &Arc<sqlx::PgPool> {
		&self.db
	}

	pub async fn migrate(&self) -> StoreResult<()> {
		MIGRATOR.run(self.db.as_ref()).await?;
		Ok(())
	}

	pub async fn active_user_count(&self) -> StoreResult<u64> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
			.fetch_one(self.db.as_ref())
			.await?;

		Ok(to_u64(count))
	}
}

#[async_trait]
impl Store for PgStore {
	type Tx = PgTransaction;

	async fn begin(&self) -> StoreResult<Self::Tx> {
		Ok(PgTransaction {
			tx: self.db.begin().await?,
		})
	}

	async fn begin_snapshot(&self) -> StoreResult<Self::Tx> {
		let mut tx = self.db.begin().await?;

		// must run before any other statement of the transaction
		sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
			.execute(&mut *tx)
			.await?;

		Ok(PgTransaction { tx })
	}
}

pub struct PgTransaction {
	tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
	async fn fetch_user(&mut self, user_id: Ulid) -> StoreResult<User> {
		self.find_user(&UserFilter::by_id(user_id))
			.await?
			.ok_or(StoreError::Vanished("user"))
	}
}

#[async_trait]
impl Transaction for PgTransaction {
	async fn commit(self) -> StoreResult<()> {
		self.tx.commit().await?;
		Ok(())
	}

	async fn lock(&mut self, key: &LockKey) -> StoreResult<()> {
		sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
			.bind(key.to_string())
			.execute(&mut *self.tx)
			.await?;

		Ok(())
	}

	async fn find_user(&mut self, filter: &UserFilter) -> StoreResult<Option<User>> {
		let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE users.deleted_at IS NULL"));

		if let Some(id) = filter.id {
			qb.push(" AND users.id = ").push_bind(id);
		}

		if let Some(email) = &filter.email {
			qb.push(" AND users.email = ").push_bind(email.clone());
		}

		if let Some(nickname) = &filter.nickname {
			qb.push(" AND users.nickname = ").push_bind(nickname.clone());
		}

		if let Some(provider) = &filter.provider {
			qb.push(" AND users.provider = ").push_bind(provider.clone());
		}

		if let Some(provider_key) = &filter.provider_key {
			qb.push(" AND users.provider_key = ").push_bind(provider_key.clone());
		}

		qb.push(" LIMIT 1");

		let user: Option<User> = qb.build_query_as().fetch_optional(&mut *self.tx).await?;

		Ok(user)
	}

	async fn insert_local_user(&mut self, user: &NewLocalUser) -> StoreResult<User> {
		let (id,): (Ulid,) =
			sqlx::query_as("INSERT INTO users (id, email, password_hash, provider) VALUES ($1, $2, $3, $4) RETURNING id")
				.bind(Ulid::new())
				.bind(&user.email)
				.bind(&user.password_hash)
				.bind(LOCAL_PROVIDER)
				.fetch_one(&mut *self.tx)
				.await?;

		self.fetch_user(id).await
	}

	async fn insert_oauth_user(&mut self, user: &NewOAuthUser) -> StoreResult<User> {
		let (id,): (Ulid,) = sqlx::query_as(
			"INSERT INTO users (id, email, nickname, provider, provider_key) VALUES ($1, $2, $3, $4, $5) RETURNING id",
		)
		.bind(Ulid::new())
		.bind(&user.email)
		.bind(&user.nickname)
		.bind(&user.provider)
		.bind(&user.provider_key)
		.fetch_one(&mut *self.tx)
		.await?;

		self.fetch_user(id).await
	}

	async fn set_nickname(&mut self, user_id: Ulid, nickname: &str) -> StoreResult<User> {
		sqlx::query("UPDATE users SET nickname = $1 WHERE id = $2 AND deleted_at IS NULL")
			.bind(nickname)
			.bind(user_id)
			.execute(&mut *self.tx)
			.await?;

		self.fetch_user(user_id).await
	}

	async fn update_profile(&mut self, user_id: Ulid, update: &ProfileUpdate) -> StoreResult<User> {
		sqlx::query(
			r#"
			UPDATE users
			SET
				nickname = $1,
				profile = $2,
				interest1 = $3,
				interest2 = $4
			WHERE
				id = $5
				AND deleted_at IS NULL
			"#,
		)
		.bind(&update.nickname)
		.bind(&update.profile)
		.bind(update.interest(0))
		.bind(update.interest(1))
		.bind(user_id)
		.execute(&mut *self.tx)
		.await?;

		self.fetch_user(user_id).await
	}

	async fn soft_delete_user(&mut self, user_id: Ulid, at: DateTime<Utc>) -> StoreResult<bool> {
		let result = sqlx::query("UPDATE users SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL")
			.bind(at)
			.bind(user_id)
			.execute(&mut *self.tx)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn soft_delete_profile_images(&mut self, user_id: Ulid, at: DateTime<Utc>) -> StoreResult<u64> {
		let result = sqlx::query("UPDATE profile_images SET deleted_at = $1 WHERE user_id = $2 AND deleted_at IS NULL")
			.bind(at)
			.bind(user_id)
			.execute(&mut *self.tx)
			.await?;

		Ok(result.rows_affected())
	}

	async fn insert_profile_image(&mut self, user_id: Ulid, image_path: Option<&str>) -> StoreResult<ProfileImage> {
		Ok(
			sqlx::query_as("INSERT INTO profile_images (id, user_id, image_path) VALUES ($1, $2, $3) RETURNING *")
				.bind(Ulid::new())
				.bind(user_id)
				.bind(image_path)
				.fetch_one(&mut *self.tx)
				.await?,
		)
	}

	async fn insert_follow(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<Follow> {
		Ok(
			sqlx::query_as("INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2) RETURNING *")
				.bind(follower_id)
				.bind(followee_id)
				.fetch_one(&mut *self.tx)
				.await?,
		)
	}

	async fn delete_follow(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<bool> {
		let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
			.bind(follower_id)
			.bind(followee_id)
			.execute(&mut *self.tx)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn follow_exists(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<bool> {
		let (exists,): (bool,) =
			sqlx::query_as("SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)")
				.bind(follower_id)
				.bind(followee_id)
				.fetch_one(&mut *self.tx)
				.await?;

		Ok(exists)
	}

	async fn count_follow_users(&mut self, user_id: Ulid, predicate: FollowPredicate) -> StoreResult<u64> {
		let (count,): (i64,) = sqlx::query_as(&format!(
			r#"
			SELECT
				COUNT(*)
			FROM
				follows
			INNER JOIN
				users
			ON
				users.id = follows.{member}
			WHERE
				follows.{anchor} = $1
				AND users.deleted_at IS NULL
			"#,
			member = predicate.member.column(),
			anchor = predicate.anchor.column(),
		))
		.bind(user_id)
		.fetch_one(&mut *self.tx)
		.await?;

		Ok(to_u64(count))
	}

	async fn list_follow_users(
		&mut self,
		user_id: Ulid,
		predicate: FollowPredicate,
		offset: u64,
		limit: u64,
	) -> StoreResult<Vec<User>> {
		Ok(sqlx::query_as(&format!(
			r#"
			SELECT
				{USER_COLUMNS}
			FROM
				follows
			INNER JOIN
				users
			ON
				users.id = follows.{member}
			WHERE
				follows.{anchor} = $1
				AND users.deleted_at IS NULL
			ORDER BY
				follows.created_at DESC,
				users.id DESC
			LIMIT $2
			OFFSET $3
			"#,
			member = predicate.member.column(),
			anchor = predicate.anchor.column(),
		))
		.bind(user_id)
		.bind(to_i64(limit))
		.bind(to_i64(offset))
		.fetch_all(&mut *self.tx)
		.await?)
	}

	async fn followed_among(&mut self, viewer_id: Ulid, candidates: &[Ulid]) -> StoreResult<Vec<Ulid>> {
		let rows: Vec<(Ulid,)> =
			sqlx::query_as("SELECT followee_id FROM follows WHERE follower_id = $1 AND followee_id = ANY($2)")
				.bind(viewer_id)
				.bind(candidates)
				.fetch_all(&mut *self.tx)
				.await?;

		Ok(rows.into_iter().map(|(id,)| id).collect())
	}

	async fn insert_block(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<Block> {
		Ok(
			sqlx::query_as("INSERT INTO blocks (blocker_id, blocked_id) VALUES ($1, $2) RETURNING *")
				.bind(blocker_id)
				.bind(blocked_id)
				.fetch_one(&mut *self.tx)
				.await?,
		)
	}

	async fn delete_block(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<bool> {
		let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = $1 AND blocked_id = $2")
			.bind(blocker_id)
			.bind(blocked_id)
			.execute(&mut *self.tx)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn block_exists(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<bool> {
		let (exists,): (bool,) =
			sqlx::query_as("SELECT EXISTS(SELECT 1 FROM blocks WHERE blocker_id = $1 AND blocked_id = $2)")
				.bind(blocker_id)
				.bind(blocked_id)
				.fetch_one(&mut *self.tx)
				.await?;

		Ok(exists)
	}

	async fn blocked_among(&mut self, viewer_id: Ulid, candidates: &[Ulid]) -> StoreResult<Vec<Ulid>> {
		let rows: Vec<(Ulid,)> =
			sqlx::query_as("SELECT blocked_id FROM blocks WHERE blocker_id = $1 AND blocked_id = ANY($2)")
				.bind(viewer_id)
				.bind(candidates)
				.fetch_all(&mut *self.tx)
				.await?;

		Ok(rows.into_iter().map(|(id,)| id).collect())
	}

	async fn insert_notification(&mut self, notification: &NewNotification) -> StoreResult<Notification> {
		Ok(sqlx::query_as(
			r#"
			INSERT INTO notifications (id, sender_id, recipient_id, kind, review_id, message)
			VALUES ($1, $2, $3, $4, $5, $6)
			RETURNING *
			"#,
		)
		.bind(notification.id)
		.bind(notification.sender_id)
		.bind(notification.recipient_id)
		.bind(notification.kind)
		.bind(notification.review_id)
		.bind(&notification.message)
		.fetch_one(&mut *self.tx)
		.await?)
	}

	async fn count_notifications(&mut self, recipient_id: Ulid) -> StoreResult<u64> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
			.bind(recipient_id)
			.fetch_one(&mut *self.tx)
			.await?;

		Ok(to_u64(count))
	}

	async fn count_unread_notifications(&mut self, recipient_id: Ulid) -> StoreResult<u64> {
		let (count,): (i64,) =
			sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read_at IS NULL")
				.bind(recipient_id)
				.fetch_one(&mut *self.tx)
				.await?;

		Ok(to_u64(count))
	}

	async fn list_notifications(&mut self, recipient_id: Ulid, offset: u64, limit: u64) -> StoreResult<Vec<Notification>> {
		Ok(sqlx::query_as(
			r#"
			SELECT
				*
			FROM
				notifications
			WHERE
				recipient_id = $1
			ORDER BY
				created_at DESC,
				id DESC
			LIMIT $2
			OFFSET $3
			"#,
		)
		.bind(recipient_id)
		.bind(to_i64(limit))
		.bind(to_i64(offset))
		.fetch_all(&mut *self.tx)
		.await?)
	}

	async fn mark_notifications_read(&mut self, recipient_id: Ulid, at: DateTime<Utc>) -> StoreResult<u64> {
		let result = sqlx::query("UPDATE notifications SET read_at = $1 WHERE recipient_id = $2 AND read_at IS NULL")
			.bind(at)
			.bind(recipient_id)
			.execute(&mut *self.tx)
			.await?;

		Ok(result.rows_affected())
	}

	async fn review_exists(&mut self, review_id: i64) -> StoreResult<bool> {
		let (exists,): (bool,) =
			sqlx::query_as("SELECT EXISTS(SELECT 1 FROM reviews WHERE id = $1 AND deleted_at IS NULL)")
				.bind(review_id)
				.fetch_one(&mut *self.tx)
				.await?;

		Ok(exists)
	}

	async fn insert_bookmark(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<Bookmark> {
		Ok(
			sqlx::query_as("INSERT INTO review_bookmarks (account_id, review_id) VALUES ($1, $2) RETURNING *")
				.bind(account_id)
				.bind(review_id)
				.fetch_one(&mut *self.tx)
				.await?,
		)
	}

	async fn delete_bookmark(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool> {
		let result = sqlx::query("DELETE FROM review_bookmarks WHERE account_id = $1 AND review_id = $2")
			.bind(account_id)
			.bind(review_id)
			.execute(&mut *self.tx)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn bookmark_exists(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool> {
		let (exists,): (bool,) =
			sqlx::query_as("SELECT EXISTS(SELECT 1 FROM review_bookmarks WHERE account_id = $1 AND review_id = $2)")
				.bind(account_id)
				.bind(review_id)
				.fetch_one(&mut *self.tx)
				.await?;

		Ok(exists)
	}

	async fn insert_share(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<Share> {
		Ok(
			sqlx::query_as("INSERT INTO review_shares (account_id, review_id) VALUES ($1, $2) RETURNING *")
				.bind(account_id)
				.bind(review_id)
				.fetch_one(&mut *self.tx)
				.await?,
		)
	}

	async fn share_exists(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool> {
		let (exists,): (bool,) =
			sqlx::query_as("SELECT EXISTS(SELECT 1 FROM review_shares WHERE account_id = $1 AND review_id = $2)")
				.bind(account_id)
				.bind(review_id)
				.fetch_one(&mut *self.tx)
				.await?;

		Ok(exists)
	}
}

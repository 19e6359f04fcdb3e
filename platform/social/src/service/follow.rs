use std::collections::HashSet;
use std::sync::Arc;

use common::database::Ulid;

use super::notification::{record_notification, CreateNotification};
use crate::database::{Follow, FollowDirection, NotificationKind, User, UserFilter, UserRecord};
use crate::error::{Result, SocialError};
use crate::pagination::{PageRequest, Paginated};
use crate::store::{Store, Transaction};

/// A user-like record flagged with whether the viewer follows it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FollowAnnotated<T> {
	#[serde(flatten)]
	pub record: T,
	pub followed_by_viewer: bool,
}

/// One page of `user_id`'s followers or followees, newest edge first.
///
/// Count and listing use the same predicate, so `total_pages` always
/// describes the list that was paged.
pub async fn follow_page_in<T: Transaction>(
	tx: &mut T,
	user_id: Ulid,
	direction: FollowDirection,
	page: PageRequest,
) -> Result<Paginated<User>> {
	if tx.find_user(&UserFilter::by_id(user_id)).await?.is_none() {
		return Err(SocialError::NotFound("user"));
	}

	let predicate = direction.predicate();
	let total = tx.count_follow_users(user_id, predicate).await?;
	let items = tx
		.list_follow_users(user_id, predicate, page.offset(), page.limit())
		.await?;

	Ok(Paginated {
		total_pages: page.total_pages(total),
		items,
	})
}

pub struct FollowDirectory<S> {
	store: Arc<S>,
}

impl<S: Store> FollowDirectory<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self { store }
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn get_follow_page(
		&self,
		user_id: Ulid,
		direction: FollowDirection,
		page: u32,
		size: u32,
	) -> Result<Paginated<User>> {
		let page = PageRequest::new(page, size)?;

		let mut tx = self.store.begin().await?;
		let users = follow_page_in(&mut tx, user_id, direction, page).await?;
		tx.commit().await?;

		Ok(users)
	}

	/// Creates the edge and the follow notification together.
	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn follow(&self, follower_id: Ulid, followee_id: Ulid) -> Result<Follow> {
		if follower_id == followee_id {
			return Err(SocialError::invalid("followee_id", "cannot follow yourself"));
		}

		let mut tx = self.store.begin().await?;

		for user_id in [follower_id, followee_id] {
			if tx.find_user(&UserFilter::by_id(user_id)).await?.is_none() {
				return Err(SocialError::NotFound("user"));
			}
		}

		if tx.follow_exists(follower_id, followee_id).await? {
			return Err(SocialError::Conflict("already following"));
		}

		let follow = tx.insert_follow(follower_id, followee_id).await?;

		record_notification(
			&mut tx,
			&CreateNotification {
				sender_id: follower_id,
				recipient_id: followee_id,
				kind: NotificationKind::Follow,
				review_id: None,
				content: None,
			},
		)
		.await?;

		tx.commit().await?;

		Ok(follow)
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn unfollow(&self, follower_id: Ulid, followee_id: Ulid) -> Result<()> {
		let mut tx = self.store.begin().await?;

		if !tx.delete_follow(follower_id, followee_id).await? {
			return Err(SocialError::Conflict("not following"));
		}

		tx.commit().await?;

		Ok(())
	}

	/// Same shape as the block annotation: one lookup, order kept.
	#[tracing::instrument(skip(self, candidates), fields(candidates = candidates.len()), err(level = "debug"))]
	pub async fn annotate_following<R: UserRecord + Send>(
		&self,
		viewer_id: Ulid,
		candidates: Vec<R>,
	) -> Result<Vec<FollowAnnotated<R>>> {
		if candidates.is_empty() {
			return Ok(Vec::new());
		}

		let ids = candidates.iter().map(UserRecord::user_id).collect::<Vec<_>>();

		let mut tx = self.store.begin().await?;
		let followed = tx.followed_among(viewer_id, &ids).await?.into_iter().collect::<HashSet<_>>();
		tx.commit().await?;

		Ok(candidates
			.into_iter()
			.map(|record| FollowAnnotated {
				followed_by_viewer: followed.contains(&record.user_id()),
				record,
			})
			.collect())
	}
}

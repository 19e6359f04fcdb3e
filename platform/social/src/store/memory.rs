use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::database::Ulid;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LockKey, Store, StoreError, StoreResult, Transaction};
use crate::database::{
	Block, Bookmark, Follow, FollowPredicate, NewLocalUser, NewNotification, NewOAuthUser, Notification, ProfileImage,
	ProfileUpdate, Review, Share, User, UserFilter, LOCAL_PROVIDER,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
	/// Rows as written, derived columns are filled in by [`MemoryState::hydrate`].
	users: Vec<User>,
	next_serial: i64,
	profile_images: Vec<ProfileImage>,
	/// Insertion order, which is also `created_at` order.
	follows: Vec<Follow>,
	blocks: Vec<Block>,
	notifications: Vec<Notification>,
	reviews: Vec<Review>,
	bookmarks: Vec<Bookmark>,
	shares: Vec<Share>,
}

impl MemoryState {
	fn is_active(&self, user_id: Ulid) -> bool {
		self.users.iter().any(|u| u.id == user_id && u.deleted_at.is_none())
	}

	fn hydrate(&self, user: &User) -> User {
		let mut user = user.clone();

		user.follower_count = self
			.follows
			.iter()
			.filter(|f| f.followee_id == user.id && self.is_active(f.follower_id))
			.count() as i64;
		user.followee_count = self
			.follows
			.iter()
			.filter(|f| f.follower_id == user.id && self.is_active(f.followee_id))
			.count() as i64;
		user.profile_image = self
			.profile_images
			.iter()
			.rev()
			.find(|i| i.user_id == user.id && i.deleted_at.is_none())
			.and_then(|i| i.image_path.clone());

		user
	}

	fn active_user(&self, user_id: Ulid) -> StoreResult<&User> {
		self.users
			.iter()
			.find(|u| u.id == user_id && u.deleted_at.is_none())
			.ok_or(StoreError::Vanished("user"))
	}

	fn check_email(&self, email: &str) -> StoreResult<()> {
		if self.users.iter().any(|u| u.deleted_at.is_none() && u.email == email) {
			return Err(StoreError::UniqueViolation("users_email_active_key".to_string()));
		}

		Ok(())
	}

	fn check_nickname(&self, nickname: &str, owner: Option<Ulid>) -> StoreResult<()> {
		let taken = self.users.iter().any(|u| {
			u.deleted_at.is_none() && u.nickname.as_deref() == Some(nickname) && Some(u.id) != owner
		});

		if taken {
			return Err(StoreError::UniqueViolation("users_nickname_active_key".to_string()));
		}

		Ok(())
	}

	fn insert_user(&mut self, user: User) -> User {
		self.users.push(user);
		let user = &self.users[self.users.len() - 1];
		self.hydrate(user)
	}

	fn next_serial(&mut self) -> i64 {
		self.next_serial += 1;
		self.next_serial
	}

	fn follow_users(&self, user_id: Ulid, predicate: FollowPredicate) -> impl Iterator<Item = &User> + '_ {
		self.follows
			.iter()
			.rev()
			.filter(move |f| predicate.matches(user_id, f))
			.filter_map(move |f| {
				let member = predicate.member.of(f);
				self.users.iter().find(|u| u.id == member && u.deleted_at.is_none())
			})
	}
}

/// In-process store with serializable transactions.
///
/// A transaction holds the state lock from `begin` until it is committed or
/// dropped and works on a copy, so dropping it discards every write.
#[derive(Clone, Default)]
pub struct MemoryStore {
	state: Arc<Mutex<MemoryState>>,
	block_lookups: Arc<AtomicUsize>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a review owned by `author_id`, returns its id.
	pub async fn insert_review(&self, author_id: Ulid) -> i64 {
		let mut state = self.state.lock().await;
		let id = state.reviews.len() as i64 + 1;

		state.reviews.push(Review {
			id,
			author_id,
			created_at: Utc::now(),
			deleted_at: None,
		});

		id
	}

	pub async fn delete_review(&self, review_id: i64) {
		let mut state = self.state.lock().await;

		if let Some(review) = state.reviews.iter_mut().find(|r| r.id == review_id) {
			review.deleted_at = Some(Utc::now());
		}
	}

	/// Number of batched block lookups served so far.
	pub fn block_lookups(&self) -> usize {
		self.block_lookups.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Store for MemoryStore {
	type Tx = MemoryTransaction;

	async fn begin(&self) -> StoreResult<Self::Tx> {
		let guard = self.state.clone().lock_owned().await;
		let working = guard.clone();

		Ok(MemoryTransaction {
			guard,
			working,
			block_lookups: self.block_lookups.clone(),
		})
	}
}

pub struct MemoryTransaction {
	guard: OwnedMutexGuard<MemoryState>,
	working: MemoryState,
	block_lookups: Arc<AtomicUsize>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
	async fn commit(mut self) -> StoreResult<()> {
		*self.guard = self.working;
		Ok(())
	}

	async fn lock(&mut self, _key: &LockKey) -> StoreResult<()> {
		// the state lock taken in `begin` already covers every key
		Ok(())
	}

	async fn find_user(&mut self, filter: &UserFilter) -> StoreResult<Option<User>> {
		let state = &self.working;
		Ok(state.users.iter().find(|u| filter.matches(u)).map(|u| state.hydrate(u)))
	}

	async fn insert_local_user(&mut self, user: &NewLocalUser) -> StoreResult<User> {
		let state = &mut self.working;
		state.check_email(&user.email)?;

		let serial_number = state.next_serial();
		Ok(state.insert_user(User {
			id: Ulid::new(),
			serial_number,
			email: user.email.clone(),
			password_hash: Some(user.password_hash.clone()),
			nickname: None,
			profile: None,
			interest1: None,
			interest2: None,
			provider: LOCAL_PROVIDER.to_string(),
			provider_key: None,
			profile_image: None,
			follower_count: 0,
			followee_count: 0,
			created_at: Utc::now(),
			deleted_at: None,
		}))
	}

	async fn insert_oauth_user(&mut self, user: &NewOAuthUser) -> StoreResult<User> {
		let state = &mut self.working;
		state.check_email(&user.email)?;
		state.check_nickname(&user.nickname, None)?;

		let serial_number = state.next_serial();
		Ok(state.insert_user(User {
			id: Ulid::new(),
			serial_number,
			email: user.email.clone(),
			password_hash: None,
			nickname: Some(user.nickname.clone()),
			profile: None,
			interest1: None,
			interest2: None,
			provider: user.provider.clone(),
			provider_key: Some(user.provider_key.clone()),
			profile_image: None,
			follower_count: 0,
			followee_count: 0,
			created_at: Utc::now(),
			deleted_at: None,
		}))
	}

	async fn set_nickname(&mut self, user_id: Ulid, nickname: &str) -> StoreResult<User> {
		let state = &mut self.working;
		state.active_user(user_id)?;
		state.check_nickname(nickname, Some(user_id))?;

		let user = state
			.users
			.iter_mut()
			.find(|u| u.id == user_id && u.deleted_at.is_none())
			.ok_or(StoreError::Vanished("user"))?;
		user.nickname = Some(nickname.to_string());

		let user = state.active_user(user_id)?;
		Ok(state.hydrate(user))
	}

	async fn update_profile(&mut self, user_id: Ulid, update: &ProfileUpdate) -> StoreResult<User> {
		let state = &mut self.working;
		state.active_user(user_id)?;
		state.check_nickname(&update.nickname, Some(user_id))?;

		let user = state
			.users
			.iter_mut()
			.find(|u| u.id == user_id && u.deleted_at.is_none())
			.ok_or(StoreError::Vanished("user"))?;
		user.nickname = Some(update.nickname.clone());
		user.profile = update.profile.clone();
		user.interest1 = update.interest(0).map(str::to_string);
		user.interest2 = update.interest(1).map(str::to_string);

		let user = state.active_user(user_id)?;
		Ok(state.hydrate(user))
	}

	async fn soft_delete_user(&mut self, user_id: Ulid, at: DateTime<Utc>) -> StoreResult<bool> {
		match self
			.working
			.users
			.iter_mut()
			.find(|u| u.id == user_id && u.deleted_at.is_none())
		{
			Some(user) => {
				user.deleted_at = Some(at);
				Ok(true)
			}
			None => Ok(false),
		}
	}

	async fn soft_delete_profile_images(&mut self, user_id: Ulid, at: DateTime<Utc>) -> StoreResult<u64> {
		let mut changed = 0;

		for image in self
			.working
			.profile_images
			.iter_mut()
			.filter(|i| i.user_id == user_id && i.deleted_at.is_none())
		{
			image.deleted_at = Some(at);
			changed += 1;
		}

		Ok(changed)
	}

	async fn insert_profile_image(&mut self, user_id: Ulid, image_path: Option<&str>) -> StoreResult<ProfileImage> {
		let image = ProfileImage {
			id: Ulid::new(),
			user_id,
			image_path: image_path.map(str::to_string),
			created_at: Utc::now(),
			deleted_at: None,
		};

		self.working.profile_images.push(image.clone());
		Ok(image)
	}

	async fn insert_follow(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<Follow> {
		if self
			.working
			.follows
			.iter()
			.any(|f| f.follower_id == follower_id && f.followee_id == followee_id)
		{
			return Err(StoreError::UniqueViolation("follows_pkey".to_string()));
		}

		let follow = Follow {
			follower_id,
			followee_id,
			created_at: Utc::now(),
		};

		self.working.follows.push(follow.clone());
		Ok(follow)
	}

	async fn delete_follow(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<bool> {
		let before = self.working.follows.len();
		self.working
			.follows
			.retain(|f| !(f.follower_id == follower_id && f.followee_id == followee_id));
		Ok(self.working.follows.len() != before)
	}

	async fn follow_exists(&mut self, follower_id: Ulid, followee_id: Ulid) -> StoreResult<bool> {
		Ok(self
			.working
			.follows
			.iter()
			.any(|f| f.follower_id == follower_id && f.followee_id == followee_id))
	}

	async fn count_follow_users(&mut self, user_id: Ulid, predicate: FollowPredicate) -> StoreResult<u64> {
		Ok(self.working.follow_users(user_id, predicate).count() as u64)
	}

	async fn list_follow_users(
		&mut self,
		user_id: Ulid,
		predicate: FollowPredicate,
		offset: u64,
		limit: u64,
	) -> StoreResult<Vec<User>> {
		let state = &self.working;
		Ok(state
			.follow_users(user_id, predicate)
			.skip(usize::try_from(offset).unwrap_or(usize::MAX))
			.take(usize::try_from(limit).unwrap_or(usize::MAX))
			.map(|u| state.hydrate(u))
			.collect())
	}

	async fn followed_among(&mut self, viewer_id: Ulid, candidates: &[Ulid]) -> StoreResult<Vec<Ulid>> {
		Ok(self
			.working
			.follows
			.iter()
			.filter(|f| f.follower_id == viewer_id && candidates.contains(&f.followee_id))
			.map(|f| f.followee_id)
			.collect())
	}

	async fn insert_block(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<Block> {
		if self
			.working
			.blocks
			.iter()
			.any(|b| b.blocker_id == blocker_id && b.blocked_id == blocked_id)
		{
			return Err(StoreError::UniqueViolation("blocks_pkey".to_string()));
		}

		let block = Block {
			blocker_id,
			blocked_id,
			created_at: Utc::now(),
		};

		self.working.blocks.push(block.clone());
		Ok(block)
	}

	async fn delete_block(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<bool> {
		let before = self.working.blocks.len();
		self.working
			.blocks
			.retain(|b| !(b.blocker_id == blocker_id && b.blocked_id == blocked_id));
		Ok(self.working.blocks.len() != before)
	}

	async fn block_exists(&mut self, blocker_id: Ulid, blocked_id: Ulid) -> StoreResult<bool> {
		Ok(self
			.working
			.blocks
			.iter()
			.any(|b| b.blocker_id == blocker_id && b.blocked_id == blocked_id))
	}

	async fn blocked_among(&mut self, viewer_id: Ulid, candidates: &[Ulid]) -> StoreResult<Vec<Ulid>> {
		self.block_lookups.fetch_add(1, Ordering::SeqCst);

		Ok(self
			.working
			.blocks
			.iter()
			.filter(|b| b.blocker_id == viewer_id && candidates.contains(&b.blocked_id))
			.map(|b| b.blocked_id)
			.collect())
	}

	async fn insert_notification(&mut self, notification: &NewNotification) -> StoreResult<Notification> {
		let notification = Notification {
			id: notification.id,
			sender_id: notification.sender_id,
			recipient_id: notification.recipient_id,
			kind: notification.kind,
			review_id: notification.review_id,
			message: notification.message.clone(),
			read_at: None,
			created_at: Utc::now(),
		};

		self.working.notifications.push(notification.clone());
		Ok(notification)
	}

	async fn count_notifications(&mut self, recipient_id: Ulid) -> StoreResult<u64> {
		Ok(self
			.working
			.notifications
			.iter()
			.filter(|n| n.recipient_id == recipient_id)
			.count() as u64)
	}

	async fn count_unread_notifications(&mut self, recipient_id: Ulid) -> StoreResult<u64> {
		Ok(self
			.working
			.notifications
			.iter()
			.filter(|n| n.recipient_id == recipient_id && !n.is_read())
			.count() as u64)
	}

	async fn list_notifications(&mut self, recipient_id: Ulid, offset: u64, limit: u64) -> StoreResult<Vec<Notification>> {
		Ok(self
			.working
			.notifications
			.iter()
			.rev()
			.filter(|n| n.recipient_id == recipient_id)
			.skip(usize::try_from(offset).unwrap_or(usize::MAX))
			.take(usize::try_from(limit).unwrap_or(usize::MAX))
			.cloned()
			.collect())
	}

	async fn mark_notifications_read(&mut self, recipient_id: Ulid, at: DateTime<Utc>) -> StoreResult<u64> {
		let mut changed = 0;

		for notification in self
			.working
			.notifications
			.iter_mut()
			.filter(|n| n.recipient_id == recipient_id && n.read_at.is_none())
		{
			notification.read_at = Some(at);
			changed += 1;
		}

		Ok(changed)
	}

	async fn review_exists(&mut self, review_id: i64) -> StoreResult<bool> {
		Ok(self
			.working
			.reviews
			.iter()
			.any(|r| r.id == review_id && r.deleted_at.is_none()))
	}

	async fn insert_bookmark(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<Bookmark> {
		if self
			.working
			.bookmarks
			.iter()
			.any(|b| b.account_id == account_id && b.review_id == review_id)
		{
			return Err(StoreError::UniqueViolation("review_bookmarks_pkey".to_string()));
		}

		let bookmark = Bookmark {
			account_id,
			review_id,
			created_at: Utc::now(),
		};

		self.working.bookmarks.push(bookmark.clone());
		Ok(bookmark)
	}

	async fn delete_bookmark(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool> {
		let before = self.working.bookmarks.len();
		self.working
			.bookmarks
			.retain(|b| !(b.account_id == account_id && b.review_id == review_id));
		Ok(self.working.bookmarks.len() != before)
	}

	async fn bookmark_exists(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool> {
		Ok(self
			.working
			.bookmarks
			.iter()
			.any(|b| b.account_id == account_id && b.review_id == review_id))
	}

	async fn insert_share(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<Share> {
		if self
			.working
			.shares
			.iter()
			.any(|s| s.account_id == account_id && s.review_id == review_id)
		{
			return Err(StoreError::UniqueViolation("review_shares_pkey".to_string()));
		}

		let share = Share {
			account_id,
			review_id,
			created_at: Utc::now(),
		};

		self.working.shares.push(share.clone());
		Ok(share)
	}

	async fn share_exists(&mut self, account_id: Ulid, review_id: i64) -> StoreResult<bool> {
		Ok(self
			.working
			.shares
			.iter()
			.any(|s| s.account_id == account_id && s.review_id == review_id))
	}
}

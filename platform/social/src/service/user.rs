use std::sync::Arc;

use chrono::Utc;
use common::database::Ulid;

use super::block::{annotate_blocked_in, BlockAnnotated};
use super::follow::follow_page_in;
use crate::database::{FollowDirection, NewLocalUser, NewOAuthUser, ProfileUpdate, User, UserFilter};
use crate::error::{Result, SocialError, UnauthorizedReason};
use crate::pagination::{PageRequest, Paginated};
use crate::store::{LockKey, Store, Transaction};
use crate::verification::EmailVerifications;

/// Most interest tags a profile carries.
const MAX_INTERESTS: usize = 2;

/// Identity and profile resolution on top of the store.
pub struct UserDirectory<S, V> {
	store: Arc<S>,
	verifications: Arc<V>,
	verification_ttl: chrono::Duration,
}

impl<S: Store, V: EmailVerifications> UserDirectory<S, V> {
	pub fn new(store: Arc<S>, verifications: Arc<V>, verification_ttl: chrono::Duration) -> Self {
		Self {
			store,
			verifications,
			verification_ttl,
		}
	}

	/// Looks up an active user. The set fields of `filter` must all match.
	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn find_user(&self, filter: UserFilter) -> Result<Option<User>> {
		if filter.is_empty() {
			return Err(SocialError::invalid("filter", "at least one field is required"));
		}

		let mut tx = self.store.begin().await?;
		let user = tx.find_user(&filter).await?;
		tx.commit().await?;

		Ok(user)
	}

	/// Resolves an account created through an external identity provider.
	pub async fn find_user_with_provider(&self, provider: &str, provider_key: &str) -> Result<Option<User>> {
		self.find_user(UserFilter::by_provider(provider, provider_key)).await
	}

	pub async fn get_user(&self, user_id: Ulid) -> Result<User> {
		self.find_user(UserFilter::by_id(user_id))
			.await?
			.ok_or(SocialError::NotFound("user"))
	}

	/// Registers an account with email and password.
	///
	/// The email must have been verified within the verification window. The
	/// verification record is consumed once the account is committed.
	#[tracing::instrument(skip(self, password, password_confirmation), err(level = "debug"))]
	pub async fn create_local_user(&self, email: &str, password: &str, password_confirmation: &str) -> Result<User> {
		User::validate_email(email).map_err(|e| SocialError::invalid("email", e))?;
		User::validate_password(password).map_err(|e| SocialError::invalid("password", e))?;

		if password != password_confirmation {
			return Err(SocialError::invalid("password_confirmation", "passwords do not match"));
		}

		let password_hash = User::hash_password(password).map_err(|err| {
			tracing::error!(err = %err, "failed to hash password");
			SocialError::Internal("failed to hash password")
		})?;

		let mut tx = self.store.begin().await?;
		tx.lock(&LockKey::Email(email.to_string())).await?;

		if tx.find_user(&UserFilter::by_email(email)).await?.is_some() {
			return Err(SocialError::Conflict("email already registered"));
		}

		let record = self
			.verifications
			.get_verification_record(email)
			.await?
			.filter(|record| record.is_verified)
			.ok_or(UnauthorizedReason::EmailNotVerified)?;

		if record.is_expired(Utc::now(), self.verification_ttl) {
			return Err(UnauthorizedReason::VerificationExpired.into());
		}

		let user = tx
			.insert_local_user(&NewLocalUser {
				email: email.to_string(),
				password_hash,
			})
			.await?;

		let user = tx.set_nickname(user.id, &User::default_nickname(user.serial_number)).await?;

		tx.commit().await?;

		self.verifications.delete_verification_record(email).await?;

		tracing::info!(user_id = %user.id, "registered local user");

		Ok(user)
	}

	/// Registers an account signed in through an OAuth provider. The account
	/// starts with an empty profile image.
	#[tracing::instrument(skip(self, new_user), fields(email = %new_user.email, provider = %new_user.provider), err(level = "debug"))]
	pub async fn create_oauth_user(&self, new_user: NewOAuthUser) -> Result<User> {
		User::validate_nickname(&new_user.nickname).map_err(|e| SocialError::invalid("nickname", e))?;

		let mut tx = self.store.begin().await?;
		tx.lock(&LockKey::Email(new_user.email.clone())).await?;
		tx.lock(&LockKey::Nickname(new_user.nickname.clone())).await?;

		if tx.find_user(&UserFilter::by_email(&new_user.email)).await?.is_some() {
			return Err(SocialError::Conflict("email already registered"));
		}

		if tx.find_user(&UserFilter::by_nickname(&new_user.nickname)).await?.is_some() {
			return Err(SocialError::Conflict("nickname already taken"));
		}

		let user = tx.insert_oauth_user(&new_user).await?;
		tx.insert_profile_image(user.id, None).await?;

		tx.commit().await?;

		tracing::info!(user_id = %user.id, "registered oauth user");

		Ok(user)
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn is_nickname_taken(&self, nickname: &str) -> Result<bool> {
		Ok(self.find_user(UserFilter::by_nickname(nickname)).await?.is_some())
	}

	/// Replaces nickname, profile text and interests. Keeping one's own
	/// nickname is not a conflict.
	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn update_profile(&self, user_id: Ulid, update: ProfileUpdate) -> Result<User> {
		User::validate_nickname(&update.nickname).map_err(|e| SocialError::invalid("nickname", e))?;

		if update.interests.len() > MAX_INTERESTS {
			return Err(SocialError::invalid("interests", "at most two interests are allowed"));
		}

		let mut tx = self.store.begin().await?;
		tx.lock(&LockKey::Nickname(update.nickname.clone())).await?;

		if tx.find_user(&UserFilter::by_id(user_id)).await?.is_none() {
			return Err(SocialError::NotFound("user"));
		}

		if let Some(holder) = tx.find_user(&UserFilter::by_nickname(&update.nickname)).await? {
			if holder.id != user_id {
				return Err(SocialError::Conflict("nickname already taken"));
			}
		}

		let user = tx.update_profile(user_id, &update).await?;
		tx.commit().await?;

		Ok(user)
	}

	/// Swaps the active profile image in one unit.
	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn update_profile_image(&self, user_id: Ulid, image_path: &str) -> Result<User> {
		let mut tx = self.store.begin().await?;

		if tx.find_user(&UserFilter::by_id(user_id)).await?.is_none() {
			return Err(SocialError::NotFound("user"));
		}

		tx.soft_delete_profile_images(user_id, Utc::now()).await?;
		tx.insert_profile_image(user_id, Some(image_path)).await?;

		let user = tx
			.find_user(&UserFilter::by_id(user_id))
			.await?
			.ok_or(SocialError::NotFound("user"))?;

		tx.commit().await?;

		Ok(user)
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn delete_profile_image(&self, user_id: Ulid) -> Result<User> {
		let mut tx = self.store.begin().await?;

		if tx.find_user(&UserFilter::by_id(user_id)).await?.is_none() {
			return Err(SocialError::NotFound("user"));
		}

		tx.soft_delete_profile_images(user_id, Utc::now()).await?;

		let user = tx
			.find_user(&UserFilter::by_id(user_id))
			.await?
			.ok_or(SocialError::NotFound("user"))?;

		tx.commit().await?;

		Ok(user)
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn delete_user(&self, user_id: Ulid) -> Result<()> {
		let mut tx = self.store.begin().await?;

		if !tx.soft_delete_user(user_id, Utc::now()).await? {
			return Err(SocialError::NotFound("user"));
		}

		tx.commit().await?;

		tracing::info!(%user_id, "deleted user");

		Ok(())
	}

	/// A follow page of `user_id` as seen by `viewer_id`.
	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn get_follow_page_for(
		&self,
		viewer_id: Ulid,
		user_id: Ulid,
		direction: FollowDirection,
		page: u32,
		size: u32,
	) -> Result<Paginated<BlockAnnotated<User>>> {
		let page = PageRequest::new(page, size)?;

		let mut tx = self.store.begin().await?;
		let users = follow_page_in(&mut tx, user_id, direction, page).await?;
		let items = annotate_blocked_in(&mut tx, viewer_id, users.items).await?;
		tx.commit().await?;

		Ok(Paginated {
			total_pages: users.total_pages,
			items,
		})
	}
}

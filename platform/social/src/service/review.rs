use std::sync::Arc;

use common::database::Ulid;

use crate::database::{Bookmark, Share};
use crate::error::{Result, SocialError};
use crate::store::{Store, Transaction};

/// Bookmark and share edges between accounts and reviews.
pub struct ReviewEdges<S> {
	store: Arc<S>,
}

async fn ensure_review<T: Transaction>(tx: &mut T, review_id: i64) -> Result<()> {
	if !tx.review_exists(review_id).await? {
		return Err(SocialError::NotFound("review"));
	}

	Ok(())
}

impl<S: Store> ReviewEdges<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self { store }
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn bookmark(&self, account_id: Ulid, review_id: i64) -> Result<Bookmark> {
		let mut tx = self.store.begin().await?;
		ensure_review(&mut tx, review_id).await?;

		if tx.bookmark_exists(account_id, review_id).await? {
			return Err(SocialError::Conflict("already bookmarked"));
		}

		let bookmark = tx.insert_bookmark(account_id, review_id).await?;
		tx.commit().await?;

		Ok(bookmark)
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn unbookmark(&self, account_id: Ulid, review_id: i64) -> Result<()> {
		let mut tx = self.store.begin().await?;
		ensure_review(&mut tx, review_id).await?;

		if !tx.delete_bookmark(account_id, review_id).await? {
			return Err(SocialError::Conflict("not bookmarked"));
		}

		tx.commit().await?;

		Ok(())
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn share(&self, account_id: Ulid, review_id: i64) -> Result<Share> {
		let mut tx = self.store.begin().await?;
		ensure_review(&mut tx, review_id).await?;

		if tx.share_exists(account_id, review_id).await? {
			return Err(SocialError::Conflict("already shared"));
		}

		let share = tx.insert_share(account_id, review_id).await?;
		tx.commit().await?;

		Ok(share)
	}
}

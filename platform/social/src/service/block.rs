use std::collections::HashSet;
use std::sync::Arc;

use common::database::Ulid;

use crate::database::{Block, UserFilter, UserRecord};
use crate::error::{Result, SocialError};
use crate::store::{Store, Transaction};

/// A user-like record as seen by a viewer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BlockAnnotated<T> {
	#[serde(flatten)]
	pub record: T,
	/// Whether the viewer has blocked this user.
	pub blocked_by_viewer: bool,
}

/// Annotates `candidates` with the viewer's blocks using a single lookup.
///
/// Order and length are kept. Nothing is queried for an empty input.
pub async fn annotate_blocked_in<T: Transaction, R: UserRecord>(
	tx: &mut T,
	viewer_id: Ulid,
	candidates: Vec<R>,
) -> Result<Vec<BlockAnnotated<R>>> {
	if candidates.is_empty() {
		return Ok(Vec::new());
	}

	let ids = candidates.iter().map(UserRecord::user_id).collect::<Vec<_>>();
	let blocked = tx.blocked_among(viewer_id, &ids).await?.into_iter().collect::<HashSet<_>>();

	Ok(candidates
		.into_iter()
		.map(|record| BlockAnnotated {
			blocked_by_viewer: blocked.contains(&record.user_id()),
			record,
		})
		.collect())
}

pub struct BlockFilter<S> {
	store: Arc<S>,
}

impl<S: Store> BlockFilter<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self { store }
	}

	#[tracing::instrument(skip(self, candidates), fields(candidates = candidates.len()), err(level = "debug"))]
	pub async fn annotate_blocked<R: UserRecord + Send>(
		&self,
		viewer_id: Ulid,
		candidates: Vec<R>,
	) -> Result<Vec<BlockAnnotated<R>>> {
		if candidates.is_empty() {
			return Ok(Vec::new());
		}

		let mut tx = self.store.begin().await?;
		let annotated = annotate_blocked_in(&mut tx, viewer_id, candidates).await?;
		tx.commit().await?;

		Ok(annotated)
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn block(&self, blocker_id: Ulid, blocked_id: Ulid) -> Result<Block> {
		if blocker_id == blocked_id {
			return Err(SocialError::invalid("blocked_id", "cannot block yourself"));
		}

		let mut tx = self.store.begin().await?;

		if tx.find_user(&UserFilter::by_id(blocked_id)).await?.is_none() {
			return Err(SocialError::NotFound("user"));
		}

		if tx.block_exists(blocker_id, blocked_id).await? {
			return Err(SocialError::Conflict("already blocked"));
		}

		let block = tx.insert_block(blocker_id, blocked_id).await?;
		tx.commit().await?;

		Ok(block)
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn unblock(&self, blocker_id: Ulid, blocked_id: Ulid) -> Result<()> {
		let mut tx = self.store.begin().await?;

		if !tx.delete_block(blocker_id, blocked_id).await? {
			return Err(SocialError::Conflict("not blocked"));
		}

		tx.commit().await?;

		Ok(())
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn is_blocked(&self, viewer_id: Ulid, target_id: Ulid) -> Result<bool> {
		let mut tx = self.store.begin().await?;
		let blocked = tx.block_exists(viewer_id, target_id).await?;
		tx.commit().await?;

		Ok(blocked)
	}
}

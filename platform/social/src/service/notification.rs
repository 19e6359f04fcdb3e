use std::sync::Arc;

use chrono::Utc;
use common::database::Ulid;

use crate::database::{NewNotification, Notification, NotificationKind, UserFilter};
use crate::error::{Result, SocialError};
use crate::pagination::{PageRequest, Paginated};
use crate::store::{Store, Transaction};

/// An event to be recorded for `recipient_id`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct CreateNotification {
	pub sender_id: Ulid,
	pub recipient_id: Ulid,
	pub kind: NotificationKind,
	#[serde(default)]
	pub review_id: Option<i64>,
	/// The comment text, only used by [`NotificationKind::Comment`].
	#[serde(default)]
	pub content: Option<String>,
}

/// Writes a notification inside an open transaction.
///
/// The sender's nickname is read live and baked into the message, so the
/// stored text never changes afterwards.
#[tracing::instrument(skip(tx), err(level = "debug"))]
pub async fn record_notification<T: Transaction>(tx: &mut T, request: &CreateNotification) -> Result<Notification> {
	let sender = tx
		.find_user(&UserFilter::by_id(request.sender_id))
		.await?
		.ok_or(SocialError::NotFound("sender"))?;

	if tx.find_user(&UserFilter::by_id(request.recipient_id)).await?.is_none() {
		return Err(SocialError::NotFound("recipient"));
	}

	let message = request
		.kind
		.render(sender.nickname.as_deref().unwrap_or_default(), request.content.as_deref())?;

	let notification = tx
		.insert_notification(&NewNotification {
			id: Ulid::new(),
			sender_id: request.sender_id,
			recipient_id: request.recipient_id,
			kind: request.kind,
			review_id: request.review_id,
			message,
		})
		.await?;

	Ok(notification)
}

/// How often a notification page is read again after losing a race with a
/// concurrent reader of the same recipient.
const PAGE_ATTEMPTS: u32 = 5;

/// Append-only notification log with read tracking.
pub struct NotificationLedger<S> {
	store: Arc<S>,
}

impl<S: Store> NotificationLedger<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self { store }
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn create_notification(&self, request: CreateNotification) -> Result<Notification> {
		let mut tx = self.store.begin().await?;
		let notification = record_notification(&mut tx, &request).await?;
		tx.commit().await?;

		Ok(notification)
	}

	/// Returns one page of the recipient's notifications, newest first, and
	/// marks every unread notification of the recipient as read.
	///
	/// The page shows the rows as they were before they were marked. Rows
	/// created while the page is read stay unread.
	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn get_my_notifications_page(
		&self,
		recipient_id: Ulid,
		page: u32,
		size: u32,
	) -> Result<Paginated<Notification>> {
		let page = PageRequest::new(page, size)?;

		let mut attempt = 1;
		loop {
			match self.read_page(recipient_id, page).await {
				Err(err) if err.is_retryable() && attempt < PAGE_ATTEMPTS => {
					tracing::debug!(%recipient_id, attempt, "notification page raced another reader, retrying");
					attempt += 1;
				}
				result => return result,
			}
		}
	}

	/// Count, list and mark in one snapshot.
	async fn read_page(&self, recipient_id: Ulid, page: PageRequest) -> Result<Paginated<Notification>> {
		let mut tx = self.store.begin_snapshot().await?;

		let total = tx.count_notifications(recipient_id).await?;
		let items = tx.list_notifications(recipient_id, page.offset(), page.limit()).await?;
		let marked = tx.mark_notifications_read(recipient_id, Utc::now()).await?;

		tx.commit().await?;

		tracing::debug!(%recipient_id, total, marked, "notifications read");

		Ok(Paginated {
			total_pages: page.total_pages(total),
			items,
		})
	}

	#[tracing::instrument(skip(self), err(level = "debug"))]
	pub async fn unread_count(&self, recipient_id: Ulid) -> Result<u64> {
		let mut tx = self.store.begin().await?;
		let count = tx.count_unread_notifications(recipient_id).await?;
		tx.commit().await?;

		Ok(count)
	}
}

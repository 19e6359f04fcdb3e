use chrono::{DateTime, Utc};
use common::database::Ulid;

use crate::error::SocialError;

/// What triggered a notification. The discriminants are the stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum NotificationKind {
	Follow = 1,
	ReviewLike = 2,
	Comment = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown notification kind: {0}")]
pub struct UnknownNotificationKind(pub i16);

impl TryFrom<i16> for NotificationKind {
	type Error = UnknownNotificationKind;

	fn try_from(value: i16) -> Result<Self, Self::Error> {
		match value {
			1 => Ok(NotificationKind::Follow),
			2 => Ok(NotificationKind::ReviewLike),
			3 => Ok(NotificationKind::Comment),
			other => Err(UnknownNotificationKind(other)),
		}
	}
}

impl From<NotificationKind> for i16 {
	fn from(kind: NotificationKind) -> Self {
		kind as i16
	}
}

impl From<UnknownNotificationKind> for SocialError {
	fn from(_: UnknownNotificationKind) -> Self {
		SocialError::invalid("kind", "unknown notification kind")
	}
}

impl NotificationKind {
	/// Renders the message stored with the notification. The result is a
	/// snapshot, later nickname changes do not touch it.
	pub fn render(self, sender_nickname: &str, content: Option<&str>) -> Result<String, SocialError> {
		match self {
			NotificationKind::Follow => Ok(format!("{sender_nickname}님이 회원님을 팔로우하기 시작했습니다.")),
			NotificationKind::ReviewLike => Ok(format!("{sender_nickname}님이 내 리뷰를 좋아합니다.")),
			NotificationKind::Comment => {
				let content = content.ok_or(SocialError::invalid("content", "comment notifications need the comment"))?;
				Ok(format!("{sender_nickname}님이 댓글을 남겼습니다. {content}"))
			}
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct Notification {
	pub id: Ulid,
	pub sender_id: Ulid,
	pub recipient_id: Ulid,
	pub kind: NotificationKind,
	pub review_id: Option<i64>,
	/// Rendered once at creation.
	pub message: String,
	/// `None` while unread, set once.
	pub read_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl Notification {
	pub fn is_read(&self) -> bool {
		self.read_at.is_some()
	}
}

/// A notification row ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
	pub id: Ulid,
	pub sender_id: Ulid,
	pub recipient_id: Ulid,
	pub kind: NotificationKind,
	pub review_id: Option<i64>,
	pub message: String,
}

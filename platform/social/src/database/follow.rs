use chrono::{DateTime, Utc};
use common::database::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct Follow {
	pub follower_id: Ulid,
	pub followee_id: Ulid,
	pub created_at: DateTime<Utc>,
}

/// Which side of a user's follow edges to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowDirection {
	/// Users following the subject.
	Followers,
	/// Users the subject follows.
	Followees,
}

/// One endpoint of a follow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FollowColumn {
	Follower,
	Followee,
}

impl FollowColumn {
	pub const fn column(self) -> &'static str {
		match self {
			FollowColumn::Follower => "follower_id",
			FollowColumn::Followee => "followee_id",
		}
	}

	pub fn of(self, follow: &Follow) -> Ulid {
		match self {
			FollowColumn::Follower => follow.follower_id,
			FollowColumn::Followee => follow.followee_id,
		}
	}
}

/// `anchor` is matched against the subject, `member` is the listed user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FollowPredicate {
	pub anchor: FollowColumn,
	pub member: FollowColumn,
}

impl FollowPredicate {
	/// Whether the edge belongs to `subject` under this predicate.
	pub fn matches(&self, subject: Ulid, follow: &Follow) -> bool {
		self.anchor.of(follow) == subject
	}
}

impl FollowDirection {
	/// The only place a direction is turned into edge columns. Counting and
	/// listing both go through here.
	pub const fn predicate(self) -> FollowPredicate {
		match self {
			FollowDirection::Followers => FollowPredicate {
				anchor: FollowColumn::Followee,
				member: FollowColumn::Follower,
			},
			FollowDirection::Followees => FollowPredicate {
				anchor: FollowColumn::Follower,
				member: FollowColumn::Followee,
			},
		}
	}
}

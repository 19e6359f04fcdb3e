use crate::store::StoreError;

pub type Result<T, E = SocialError> = std::result::Result<T, E>;

/// Why a registration attempt was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UnauthorizedReason {
	/// No verification record exists for the email, or it was never confirmed.
	#[error("email is not verified")]
	EmailNotVerified,
	/// The email was verified, but longer ago than the verification window.
	#[error("email verification expired")]
	VerificationExpired,
}

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
	/// The referenced user or review is absent or soft-deleted.
	#[error("{0} not found")]
	NotFound(&'static str),
	/// The action collides with existing state.
	#[error("conflict: {0}")]
	Conflict(&'static str),
	/// Email verification is missing or stale.
	#[error("unauthorized: {0}")]
	Unauthorized(UnauthorizedReason),
	/// The input was invalid.
	#[error("invalid argument {field}: {message}")]
	InvalidArgument { field: &'static str, message: &'static str },
	/// The store failed.
	#[error("store error: {0}")]
	Store(#[source] StoreError),
	/// Something outside of the store failed.
	#[error("internal error: {0}")]
	Internal(&'static str),
}

impl SocialError {
	pub fn kind(&self) -> &'static str {
		match self {
			SocialError::NotFound(_) => "NotFound",
			SocialError::Conflict(_) => "Conflict",
			SocialError::Unauthorized(_) => "Unauthorized",
			SocialError::InvalidArgument { .. } => "InvalidArgument",
			SocialError::Store(_) => "Store",
			SocialError::Internal(_) => "Internal",
		}
	}

	pub fn invalid(field: &'static str, message: &'static str) -> Self {
		SocialError::InvalidArgument { field, message }
	}

	/// Whether the failed unit of work can be run again as a whole.
	pub fn is_retryable(&self) -> bool {
		matches!(self, SocialError::Store(StoreError::SerializationFailure(_)))
	}
}

impl From<StoreError> for SocialError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::UniqueViolation(constraint) => SocialError::Conflict(conflict_message(&constraint)),
			err @ StoreError::SerializationFailure(_) => {
				tracing::debug!(err = %err, "transaction lost a race");
				SocialError::Store(err)
			}
			err => {
				tracing::error!(err = %err, "store operation failed");
				SocialError::Store(err)
			}
		}
	}
}

impl From<UnauthorizedReason> for SocialError {
	fn from(reason: UnauthorizedReason) -> Self {
		SocialError::Unauthorized(reason)
	}
}

/// Unique constraints the schema declares, mapped to the conflict they mean.
/// These only fire when two writers race past the application-level check.
fn conflict_message(constraint: &str) -> &'static str {
	match constraint {
		"users_email_active_key" => "email already registered",
		"users_nickname_active_key" => "nickname already taken",
		"follows_pkey" => "already following",
		"blocks_pkey" => "already blocked",
		"review_bookmarks_pkey" => "already bookmarked",
		"review_shares_pkey" => "already shared",
		_ => "duplicate entry",
	}
}

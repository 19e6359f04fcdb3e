use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use common::database::Ulid;
use rand::rngs::OsRng;

/// Provider name of accounts registered with email and password.
pub const LOCAL_PROVIDER: &str = "local";

/// Characters of which a password needs at least one.
const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+=-";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct User {
	/// The unique identifier for the user.
	pub id: Ulid,
	/// Registration order, source of the default nickname.
	pub serial_number: i64,
	/// The email of the user.
	pub email: String,
	/// The hashed password of the user. (argon2) Absent for OAuth accounts.
	#[serde(skip)]
	pub password_hash: Option<String>,
	/// Unique among active users. Only unset inside the registration transaction.
	pub nickname: Option<String>,
	/// Free-form profile text.
	pub profile: Option<String>,
	pub interest1: Option<String>,
	pub interest2: Option<String>,
	/// `local` or the name of the OAuth provider.
	pub provider: String,
	#[serde(skip)]
	pub provider_key: Option<String>,
	/// Path of the active profile image.
	pub profile_image: Option<String>,
	/// Number of active users following this user.
	pub follower_count: i64,
	/// Number of active users this user follows.
	pub followee_count: i64,
	/// The time the user was created.
	pub created_at: DateTime<Utc>,
	/// Soft-delete marker, set users are invisible to every query.
	#[serde(skip)]
	pub deleted_at: Option<DateTime<Utc>>,
}

/// Anything that can be rendered in a user listing.
pub trait UserRecord {
	fn user_id(&self) -> Ulid;
}

impl UserRecord for User {
	fn user_id(&self) -> Ulid {
		self.id
	}
}

/// Sparse lookup, the given fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
	pub id: Option<Ulid>,
	pub email: Option<String>,
	pub nickname: Option<String>,
	pub provider: Option<String>,
	pub provider_key: Option<String>,
}

impl UserFilter {
	pub fn by_id(id: Ulid) -> Self {
		Self {
			id: Some(id),
			..Default::default()
		}
	}

	pub fn by_email(email: impl Into<String>) -> Self {
		Self {
			email: Some(email.into()),
			..Default::default()
		}
	}

	pub fn by_nickname(nickname: impl Into<String>) -> Self {
		Self {
			nickname: Some(nickname.into()),
			..Default::default()
		}
	}

	/// The account an external identity provider knows as `provider_key`.
	pub fn by_provider(provider: impl Into<String>, provider_key: impl Into<String>) -> Self {
		Self {
			provider: Some(provider.into()),
			provider_key: Some(provider_key.into()),
			..Default::default()
		}
	}

	pub fn is_empty(&self) -> bool {
		self.id.is_none()
			&& self.email.is_none()
			&& self.nickname.is_none()
			&& self.provider.is_none()
			&& self.provider_key.is_none()
	}

	pub fn matches(&self, user: &User) -> bool {
		user.deleted_at.is_none()
			&& self.id.map_or(true, |id| user.id == id)
			&& self.email.as_ref().map_or(true, |email| &user.email == email)
			&& self
				.nickname
				.as_ref()
				.map_or(true, |nickname| user.nickname.as_ref() == Some(nickname))
			&& self.provider.as_ref().map_or(true, |provider| &user.provider == provider)
			&& self
				.provider_key
				.as_ref()
				.map_or(true, |key| user.provider_key.as_ref() == Some(key))
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocalUser {
	pub email: String,
	pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct NewOAuthUser {
	pub email: String,
	pub nickname: String,
	pub provider: String,
	pub provider_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ProfileUpdate {
	pub nickname: String,
	#[serde(default)]
	pub profile: Option<String>,
	/// At most two tags.
	#[serde(default)]
	pub interests: Vec<String>,
}

impl ProfileUpdate {
	pub fn interest(&self, index: usize) -> Option<&str> {
		self.interests.get(index).map(String::as_str)
	}
}

impl User {
	/// Nickname assigned at registration, e.g. `7번째 오리` for the 7th user.
	pub fn default_nickname(serial_number: i64) -> String {
		format!("{serial_number}번째 오리")
	}

	/// Generates a new password hash using argon2.
	pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
		let salt = SaltString::generate(&mut OsRng);

		Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
	}

	/// Validates an email.
	pub fn validate_email(email: &str) -> Result<(), &'static str> {
		if email.len() < 6 {
			return Err("Email must be at least 6 characters long");
		}

		if email.len() > 30 {
			return Err("Email must be at most 30 characters long");
		}

		if !email_address::EmailAddress::is_valid(email) {
			return Err("Email is not a valid email address");
		}

		Ok(())
	}

	/// Validates a password.
	pub fn validate_password(password: &str) -> Result<(), &'static str> {
		let len = password.chars().count();

		if len < 6 {
			return Err("Password must be at least 6 characters long");
		}

		if len > 30 {
			return Err("Password must be at most 30 characters long");
		}

		if !password.chars().any(|c| c.is_ascii_alphabetic()) {
			return Err("Password must contain at least one letter");
		}

		if !password.chars().any(|c| c.is_ascii_digit()) {
			return Err("Password must contain at least one digit");
		}

		if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
			return Err("Password must contain at least one special character");
		}

		Ok(())
	}

	/// Validates a nickname.
	pub fn validate_nickname(nickname: &str) -> Result<(), &'static str> {
		let len = nickname.chars().count();

		if len < 2 {
			return Err("Nickname must be at least 2 characters long");
		}

		if len > 16 {
			return Err("Nickname must be at most 16 characters long");
		}

		if nickname.trim() != nickname {
			return Err("Nickname must not start or end with whitespace");
		}

		Ok(())
	}
}

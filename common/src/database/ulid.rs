use std::str::FromStr;

/// A ULID that is stored as a postgres `UUID`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Ulid(pub ulid::Ulid);

impl Ulid {
	pub fn new() -> Self {
		Self(ulid::Ulid::new())
	}

	pub const fn nil() -> Self {
		Self(ulid::Ulid::nil())
	}
}

impl Default for Ulid {
	fn default() -> Self {
		Self::nil()
	}
}

impl sqlx::postgres::PgHasArrayType for Ulid {
	fn array_type_info() -> sqlx::postgres::PgTypeInfo {
		<uuid::Uuid as sqlx::postgres::PgHasArrayType>::array_type_info()
	}

	fn array_compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
		<uuid::Uuid as sqlx::postgres::PgHasArrayType>::array_compatible(ty)
	}
}

impl std::fmt::Display for Ulid {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Display::fmt(&self.0, f)
	}
}

impl std::fmt::Debug for Ulid {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.0, f)
	}
}

impl FromStr for Ulid {
	type Err = ulid::DecodeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ulid::Ulid::from_string(s).map(Self)
	}
}

impl sqlx::Decode<'_, sqlx::Postgres> for Ulid {
	fn decode(value: sqlx::postgres::PgValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
		let id = <uuid::Uuid as sqlx::Decode<'_, sqlx::Postgres>>::decode(value)?;
		Ok(Self(ulid::Ulid::from(id)))
	}
}

impl sqlx::Encode<'_, sqlx::Postgres> for Ulid {
	fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
		<uuid::Uuid as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&self.0.into(), buf)
	}
}

impl sqlx::Type<sqlx::Postgres> for Ulid {
	fn type_info() -> sqlx::postgres::PgTypeInfo {
		<uuid::Uuid as sqlx::Type<sqlx::Postgres>>::type_info()
	}
}

impl From<Ulid> for ulid::Ulid {
	fn from(id: Ulid) -> Self {
		id.0
	}
}

impl From<ulid::Ulid> for Ulid {
	fn from(id: ulid::Ulid) -> Self {
		Self(id)
	}
}

impl From<uuid::Uuid> for Ulid {
	fn from(id: uuid::Uuid) -> Self {
		Self(ulid::Ulid::from(id))
	}
}

impl From<Ulid> for uuid::Uuid {
	fn from(id: Ulid) -> Self {
		id.0.into()
	}
}

//! Access to the email verification service's records.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::database::VerificationRecord;
use crate::store::StoreResult;

#[async_trait]
pub trait EmailVerifications: Send + Sync + 'static {
	async fn get_verification_record(&self, email: &str) -> StoreResult<Option<VerificationRecord>>;

	async fn delete_verification_record(&self, email: &str) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct PgEmailVerifications {
	db: Arc<sqlx::PgPool>,
}

impl PgEmailVerifications {
	pub fn new(db: Arc<sqlx::PgPool>) -> Self {
		Self { db }
	}
}

#[async_trait]
impl EmailVerifications for PgEmailVerifications {
	async fn get_verification_record(&self, email: &str) -> StoreResult<Option<VerificationRecord>> {
		Ok(
			sqlx::query_as("SELECT email, is_verified, created_at FROM email_verifications WHERE email = $1")
				.bind(email)
				.fetch_optional(self.db.as_ref())
				.await?,
		)
	}

	async fn delete_verification_record(&self, email: &str) -> StoreResult<()> {
		sqlx::query("DELETE FROM email_verifications WHERE email = $1")
			.bind(email)
			.execute(self.db.as_ref())
			.await?;

		Ok(())
	}
}

#[derive(Clone, Default)]
pub struct MemoryEmailVerifications {
	records: Arc<Mutex<HashMap<String, VerificationRecord>>>,
	deletes: Arc<AtomicUsize>,
}

impl MemoryEmailVerifications {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn insert(&self, record: VerificationRecord) {
		self.records.lock().await.insert(record.email.clone(), record);
	}

	/// Number of records removed so far.
	pub fn delete_count(&self) -> usize {
		self.deletes.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl EmailVerifications for MemoryEmailVerifications {
	async fn get_verification_record(&self, email: &str) -> StoreResult<Option<VerificationRecord>> {
		Ok(self.records.lock().await.get(email).cloned())
	}

	async fn delete_verification_record(&self, email: &str) -> StoreResult<()> {
		if self.records.lock().await.remove(email).is_some() {
			self.deletes.fetch_add(1, Ordering::SeqCst);
		}

		Ok(())
	}
}
